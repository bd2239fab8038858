//! Remote object-store sink.

use async_trait::async_trait;
use object_store::{ObjectStore, PutPayload, azure::MicrosoftAzureBuilder, path::Path};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{PipelineError, Result, SinkError},
    model::WriteTarget,
};

use super::{Sink, SinkParams};

/// Writes each payload as one object whose key is the write target.
#[derive(Clone)]
pub struct RemoteBlobSink {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for RemoteBlobSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RemoteBlobSink<{}>", self.store)
    }
}

impl RemoteBlobSink {
    pub(crate) fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Azure Blob Storage sink built from `account`, `container` and
    /// `access_key` parameters.
    pub(crate) fn azure(params: &SinkParams) -> Result<Self> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(required(params, "account")?)
            .with_container_name(required(params, "container")?)
            .with_access_key(required(params, "access_key")?)
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("invalid remote-blob sink settings: {e}"))
            })?;

        Ok(Self::new(Arc::new(store)))
    }
}

fn required<'a>(params: &'a SinkParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::Configuration(format!(
                "missing sink parameter '{key}' for the remote-blob sink"
            ))
        })
}

#[async_trait]
impl Sink for RemoteBlobSink {
    async fn write(&self, payload: &str, destination: &WriteTarget) -> Result<(), SinkError> {
        let key = destination.as_str().trim_matches('/');
        let path = Path::parse(key)
            .map_err(|source| SinkError::InvalidKey { key: key.to_string(), source })?;

        self.store
            .put(&path, PutPayload::from(payload.as_bytes().to_vec()))
            .await
            .map_err(|source| SinkError::ObjectStore { key: key.to_string(), source })?;

        debug!(%path, bytes = payload.len(), "payload uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn writes_object_under_target_key() {
        let store = Arc::new(InMemory::new());
        let sink = RemoteBlobSink::new(store.clone());

        sink.write(r#"{"temp_c":21}"#, &WriteTarget::new("/history/10001/2024-01-01.json"))
            .await
            .unwrap();

        let stored = store
            .get(&Path::from("history/10001/2024-01-01.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&stored[..], br#"{"temp_c":21}"#);
    }

    #[tokio::test]
    async fn rejects_keys_with_relative_segments() {
        let sink = RemoteBlobSink::new(Arc::new(InMemory::new()));

        let err = sink.write("{}", &WriteTarget::new("out/../x.json")).await.unwrap_err();

        assert!(matches!(err, SinkError::InvalidKey { .. }));
    }

    #[test]
    fn missing_credential_is_named() {
        let params = SinkParams::from([
            ("account".to_string(), "weatherdata".to_string()),
            ("container".to_string(), "history".to_string()),
        ]);

        let err = RemoteBlobSink::azure(&params).unwrap_err();
        assert!(err.to_string().contains("access_key"));
    }
}
