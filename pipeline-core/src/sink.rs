use async_trait::async_trait;
use std::{collections::HashMap, fmt::Debug};

use crate::{
    error::{PipelineError, Result, SinkError},
    model::WriteTarget,
};

pub mod blob;
pub mod local;

pub use blob::RemoteBlobSink;
pub use local::LocalSink;

/// Credentials and connection settings handed to the factory, e.g.
/// `account`, `container` and `access_key` for the remote blob sink.
pub type SinkParams = HashMap<String, String>;

/// Write destination for fetched documents.
///
/// Implementations hold no per-call state; the same sink may be used for
/// every location of a run.
#[async_trait]
pub trait Sink: Send + Sync + Debug {
    async fn write(&self, payload: &str, destination: &WriteTarget) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Local,
    RemoteBlob,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Local => "local",
            SinkKind::RemoteBlob => "remote-blob",
        }
    }

    pub const fn all() -> &'static [SinkKind] {
        &[SinkKind::Local, SinkKind::RemoteBlob]
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SinkKind {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(SinkKind::Local),
            "remote-blob" | "azure" => Ok(SinkKind::RemoteBlob),
            _ => Err(PipelineError::UnsupportedSinkType(value.to_string())),
        }
    }
}

/// The only place that knows the concrete sink variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkFactory;

impl SinkFactory {
    /// Resolve `sink_type` to a ready sink. Unknown types fail with
    /// [`PipelineError::UnsupportedSinkType`]; a known type with missing
    /// credentials fails with [`PipelineError::Configuration`].
    pub fn get(sink_type: &str, params: &SinkParams) -> Result<Box<dyn Sink>> {
        let boxed: Box<dyn Sink> = match SinkKind::try_from(sink_type)? {
            SinkKind::Local => Box::new(LocalSink::new()),
            SinkKind::RemoteBlob => Box::new(RemoteBlobSink::azure(params)?),
        };

        Ok(boxed)
    }
}
