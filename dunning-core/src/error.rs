use thiserror::Error;

use crate::openai::UpstreamError;

/// Startup failures. Config load errors stay `config::ConfigError` and are
/// reported by the binaries directly.
#[derive(Error, Debug)]
pub enum DunningError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Other error: {0}")]
    Other(String),
}
