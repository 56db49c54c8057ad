use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Success,
    Error,
    Warning,
}

impl EnvelopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// Uniform outcome of every CRM and notification call. Failures are carried
/// as values; nothing in the call path panics or propagates an exception.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    fn new(status: EnvelopeStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), object_type: None, object_id: None, payload: None }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Warning, message)
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == EnvelopeStatus::Error
    }

    /// Look up a field inside the payload object, if any.
    pub fn payload_field(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|payload| payload.get(key))
    }
}
