use std::fmt;

use serde::{Deserialize, Serialize};

use crate::serde_util::null_as_default;

/// Structured failure reported by the remote workflow (for example inside a
/// `run.error` event or a synchronous reply).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorDetail {
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    /// Underlying cause, empty when the server reported none.
    #[serde(deserialize_with = "null_as_default")]
    pub inner: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: ErrorLocation,
}

/// Where in the remote workflow an error was raised.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorLocation {
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub workflow_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub processor_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub processor_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub processor_config_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub process_id: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_inner(mut self, inner: impl Into<String>) -> Self {
        self.inner = inner.into();
        self
    }

    pub fn with_location(mut self, location: ErrorLocation) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (at namespace={}, workflowName={}, processorName={}, processorType={})",
            self.code,
            self.message,
            self.location.namespace,
            self.location.workflow_name,
            self.location.processor_name,
            self.location.processor_type,
        )?;
        if !self.inner.is_empty() {
            write!(f, " - caused by: {}", self.inner)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorDetail {}

#[cfg(test)]
mod tests {
    use super::*;

    fn located() -> ErrorDetail {
        ErrorDetail::new("E500", "processor crashed").with_location(ErrorLocation {
            namespace: "ns1".into(),
            workflow_name: "wf".into(),
            processor_name: "llm".into(),
            processor_type: "LLM".into(),
            processor_config_name: "cfg".into(),
            process_id: "p-1".into(),
        })
    }

    #[test]
    fn display_without_inner_cause() {
        assert_eq!(
            located().to_string(),
            "E500: processor crashed (at namespace=ns1, workflowName=wf, processorName=llm, processorType=LLM)"
        );
    }

    #[test]
    fn display_appends_inner_cause() {
        let detail = located().with_inner("timeout talking to model");
        assert!(
            detail
                .to_string()
                .ends_with("processorType=LLM) - caused by: timeout talking to model")
        );
    }

    #[test]
    fn decodes_nulls_and_missing_fields() {
        let detail: ErrorDetail = serde_json::from_value(serde_json::json!({
            "message": "bad",
            "code": "E1",
            "inner": null,
            "location": {"namespace": "ns", "processId": null}
        }))
        .expect("decode");
        assert_eq!(detail.inner, "");
        assert_eq!(detail.location.namespace, "ns");
        assert_eq!(detail.location.process_id, "");
        assert_eq!(detail.location.workflow_name, "");
    }
}
