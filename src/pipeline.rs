//! Output sink boundary for extracted records.
//!
//! Records a rule provider extracts are forwarded to a [`Pipeline`].
//! Emit failures are logged and counted but never block the worker loop
//! or affect the completion of the task that produced the record.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EmitError;

/// Persists or forwards extracted records.
#[async_trait]
pub trait Pipeline<R: Send>: Send + Sync {
    /// Handles one extracted record.
    async fn emit(&self, record: R) -> Result<(), EmitError>;

    /// Flushes and releases sink resources at engine teardown.
    async fn close(&self) {}

    /// Name used in logs.
    fn name(&self) -> &str {
        "pipeline"
    }
}

/// Default sink: serializes each record to JSON on stdout.
pub struct JsonWriter;

#[async_trait]
impl<R: Serialize + Send + 'static> Pipeline<R> for JsonWriter {
    async fn emit(&self, record: R) -> Result<(), EmitError> {
        let line = serde_json::to_string(&record)
            .map_err(|e| EmitError(format!("serialize record: {e}")))?;
        println!("{line}");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_writer_accepts_serializable_records() {
        let writer = JsonWriter;
        let result = Pipeline::<serde_json::Value>::emit(
            &writer,
            serde_json::json!({"title": "hello"}),
        )
        .await;
        assert!(result.is_ok());
    }
}
