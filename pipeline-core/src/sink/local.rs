use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::{error::SinkError, model::WriteTarget};

use super::Sink;

/// Writes each payload to the filesystem path named by its target,
/// creating parent directories and replacing any existing file.
///
/// Obtained through [`SinkFactory`](super::SinkFactory) only:
///
/// ```compile_fail
/// let _ = weather_pipeline_core::sink::LocalSink::default();
/// ```
///
/// ```compile_fail
/// let _ = weather_pipeline_core::sink::LocalSink;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LocalSink {
    _private: (),
}

impl LocalSink {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn write(&self, payload: &str, destination: &WriteTarget) -> Result<(), SinkError> {
        let path = Path::new(destination.as_str());
        let io_err = |source| SinkError::Io { path: destination.to_string(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, payload).await.map_err(io_err)?;

        debug!(%destination, bytes = payload.len(), "payload written");
        Ok(())
    }
}
