//! # Candidate List Loader
//!
//! Extracts probe targets from a YAML subscription document of the form
//!
//! ```yaml
//! proxies:
//!   - { name: "HK 01", server: hk1.example.net, port: 443, type: vmess, ... }
//! ```
//!
//! Only `name`, `server` and `port` are read; every other field is ignored.
//! Missing fields fall back to `"unknown"`, `""` and `0`, which the prober then
//! records as invalid targets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yml::Value;
use thiserror::Error;

use super::target::ProbeTarget;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("failed to read candidate list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("candidate list is not valid YAML: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("candidate list contains no proxies")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct SubscriptionDocument {
    #[serde(default)]
    proxies: Vec<ProxyRecord>,
}

#[derive(Debug, Deserialize)]
struct ProxyRecord {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    server: Value,
    #[serde(default)]
    port: Value,
}

impl ProxyRecord {
    fn into_target(self) -> ProbeTarget {
        let name = match self.name {
            Value::Null => "unknown".to_string(),
            other => scalar_to_string(other),
        };
        let host = scalar_to_string(self.server);
        let port = match &self.port {
            Value::Number(n) => n.as_i64().unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
        ProbeTarget::new(name, host, port)
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Parses targets out of YAML text, keeping document order.
pub fn parse_targets(yaml: &str) -> Result<Vec<ProbeTarget>, CandidateError> {
    let document: SubscriptionDocument = serde_yml::from_str(yaml)?;
    if document.proxies.is_empty() {
        return Err(CandidateError::Empty);
    }
    Ok(document.proxies.into_iter().map(ProxyRecord::into_target).collect())
}

/// Reads and parses a candidate list file.
pub fn load_targets(path: &Path) -> Result<Vec<ProbeTarget>, CandidateError> {
    let text = fs::read_to_string(path).map_err(|source| CandidateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_targets(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_the_three_fields_in_order() {
        let yaml = r#"
port: 7890
proxies:
  - name: "HK 01"
    type: vmess
    server: hk1.example.net
    port: 443
    uuid: 00000000-0000-0000-0000-000000000000
  - name: "JP 02"
    type: trojan
    server: 203.0.113.7
    port: "8443"
    sni: jp.example.net
"#;
        let targets = parse_targets(yaml).unwrap();
        assert_eq!(
            targets,
            vec![
                ProbeTarget::new("HK 01", "hk1.example.net", 443),
                ProbeTarget::new("JP 02", "203.0.113.7", 8443),
            ]
        );
    }

    #[test]
    fn missing_fields_become_invalid_targets() {
        let yaml = "proxies:\n  - type: ss\n  - name: nameless-port\n    server: a.example\n";
        let targets = parse_targets(yaml).unwrap();
        assert_eq!(targets[0], ProbeTarget::new("unknown", "", 0));
        assert_eq!(targets[1], ProbeTarget::new("nameless-port", "a.example", 0));
        assert!(targets.iter().all(|t| t.socket_port().is_none()));
    }

    #[test]
    fn empty_or_absent_proxies_is_an_error() {
        assert!(matches!(parse_targets("proxies: []\n"), Err(CandidateError::Empty)));
        assert!(matches!(parse_targets("rules: []\n"), Err(CandidateError::Empty)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(parse_targets("proxies: [unclosed"), Err(CandidateError::Parse(_))));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proxies:\n  - {{ name: a, server: 127.0.0.1, port: 80 }}").unwrap();

        let targets = load_targets(file.path()).unwrap();
        assert_eq!(targets, vec![ProbeTarget::new("a", "127.0.0.1", 80)]);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = load_targets(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
