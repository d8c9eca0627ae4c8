use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lib_common::engine::EngineConfig;
use lib_common::orchestrator::PipelineConfig;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "HTTP control surface for the proxy refresh pipeline and node switching.")]
#[clap(long_about = None)]
pub struct Config {
    #[clap(long, env = "ENGINE_API_BASE", default_value = EngineConfig::DEFAULT_BASE_URL, help = "Base URL of the engine management API.")]
    pub engine_api_base: String,

    #[clap(long, env = "ENGINE_SECRET", hide_env_values = true, help = "Bearer secret for the engine management API.")]
    pub engine_secret: Option<String>,

    #[clap(long, env = "CONTROL_HOST", default_value = "0.0.0.0", help = "Address to listen on.")]
    pub host: IpAddr,

    #[clap(long, env = "CONTROL_PORT", default_value_t = 8900, help = "Port to listen on.")]
    pub port: u16,

    #[clap(long, env = "PIPELINE_PROGRAM", default_value = "bash", help = "Interpreter that runs the refresh script.")]
    pub pipeline_program: PathBuf,

    #[clap(long, env = "PIPELINE_SCRIPT", default_value = "scripts/update_sub.sh", help = "Refresh script passed to the interpreter.")]
    pub pipeline_script: PathBuf,

    #[clap(long, env = "PIPELINE_WORKDIR", help = "Working directory of the refresh script. Defaults to the current directory.")]
    pub pipeline_workdir: Option<PathBuf>,

    #[clap(long, env = "PIPELINE_TIMEOUT_SECS", default_value_t = PipelineConfig::DEFAULT_TIMEOUT_SECS, help = "Hard deadline of one refresh run, in seconds.")]
    pub pipeline_timeout_secs: u64,

    #[clap(long, env = "OUTPUT_TAIL_CHARS", default_value_t = PipelineConfig::DEFAULT_TAIL_CHARS, help = "Characters of stdout/stderr kept per run.")]
    pub output_tail_chars: usize,

    #[clap(long, env = "LOG_DIR", help = "Directory for log files. Logs go to stderr only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LOG_LEVEL", default_value = "info", help = "Log level used when RUST_LOG is unset.")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pipeline timeout must be greater than zero")]
    ZeroTimeout,
    #[error("output tail limit must be greater than zero")]
    ZeroTailLimit,
    #[error("engine API base must not be empty")]
    EmptyEngineBase,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.output_tail_chars == 0 {
            return Err(ConfigError::ZeroTailLimit);
        }
        if self.engine_api_base.trim().is_empty() {
            return Err(ConfigError::EmptyEngineBase);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn engine(&self) -> EngineConfig {
        let mut engine = EngineConfig::new(self.engine_api_base.trim());
        engine.secret = self.engine_secret.clone().filter(|s| !s.is_empty());
        engine
    }

    pub fn pipeline(&self) -> PipelineConfig {
        let pipeline = PipelineConfig::script(&self.pipeline_program, &self.pipeline_script)
            .with_timeout(Duration::from_secs(self.pipeline_timeout_secs))
            .with_tail_chars(self.output_tail_chars);
        match &self.pipeline_workdir {
            Some(dir) => pipeline.with_working_dir(dir),
            None => pipeline,
        }
    }
}
