//! Bounded tail capture for child process output.
//!
//! The buffer keeps only the most recent bytes while the stream is being read,
//! so memory stays bounded no matter how verbose the pipeline is. Rendering
//! decodes lossily and cuts on whole characters.

/// Worst-case UTF-8 width of one character.
const MAX_CHAR_BYTES: usize = 4;

#[derive(Debug)]
pub struct TailBuffer {
    limit_chars: usize,
    max_bytes: usize,
    bytes: Vec<u8>,
}

impl TailBuffer {
    pub fn new(limit_chars: usize) -> Self {
        let max_bytes = limit_chars.saturating_mul(MAX_CHAR_BYTES);
        Self {
            limit_chars,
            max_bytes,
            bytes: Vec::with_capacity(max_bytes.min(64 * 1024)),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.max_bytes {
            self.bytes.clear();
            self.bytes.extend_from_slice(&chunk[chunk.len() - self.max_bytes..]);
            return;
        }
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.max_bytes {
            let excess = self.bytes.len() - self.max_bytes;
            self.bytes.drain(..excess);
        }
    }

    /// The last `limit_chars` characters seen so far.
    pub fn render(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        tail_chars(&text, self.limit_chars).to_string()
    }
}

/// Returns the suffix of `text` holding at most `limit` characters.
pub fn tail_chars(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }
    match text.char_indices().rev().nth(limit - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_chars_keeps_the_suffix() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 3), "abc");
        assert_eq!(tail_chars("ab", 10), "ab");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(tail_chars("", 5), "");
    }

    #[test]
    fn tail_chars_cuts_on_character_boundaries() {
        let text = "更新超时 done ✓";
        assert_eq!(tail_chars(text, 6), "done ✓");
        assert_eq!(tail_chars(text, 10), "新超时 done ✓");
        assert_eq!(tail_chars(text, 11), text);
    }

    #[test]
    fn buffer_bounds_memory_and_keeps_latest_output() {
        let mut buffer = TailBuffer::new(10);
        for i in 0..1000 {
            buffer.push(format!("line {i}\n").as_bytes());
            assert!(buffer.bytes.len() <= 40);
        }
        assert_eq!(buffer.render(), "\nline 999\n");
        assert!(buffer.render().ends_with("line 999\n"));
        assert_eq!(buffer.render().chars().count(), 10);
    }

    #[test]
    fn oversized_chunk_is_trimmed() {
        let mut buffer = TailBuffer::new(4);
        buffer.push(&[b'x'; 100]);
        buffer.push(b"tail");
        assert_eq!(buffer.render(), "tail");
    }

    #[test]
    fn multibyte_output_never_exceeds_limit() {
        let mut buffer = TailBuffer::new(5);
        buffer.push("日本語のテキストです".as_bytes());
        let rendered = buffer.render();
        assert_eq!(rendered.chars().count(), 5);
        assert_eq!(rendered, "キストです");
    }

    #[test]
    fn zero_limit_captures_nothing() {
        let mut buffer = TailBuffer::new(0);
        buffer.push(b"anything");
        assert_eq!(buffer.render(), "");
    }
}
