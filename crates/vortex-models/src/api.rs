use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::report::SignalReport;

/// Engine identifier echoed in every success envelope.
pub const ENGINE_NAME: &str = "Quantum-Vortex";

/// Inbound analysis request body.
///
/// `prompt` is required but modeled as `Option` so the handler can reject
/// its absence with a descriptive 400 instead of a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub prompt: Option<String>,
    /// Optional chart screenshot as a base64 string (a data-URL prefix is
    /// tolerated and stripped before dispatch).
    pub image: Option<String>,
}

/// Success envelope: `{success: true, engine, timestamp, output}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub engine: String,
    /// Unix milliseconds at response time.
    pub timestamp: i64,
    pub output: SignalReport,
}

impl SuccessEnvelope {
    pub fn new(output: SignalReport) -> Self {
        Self {
            success: true,
            engine: ENGINE_NAME.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            output,
        }
    }
}

/// Failure envelope: `{success: false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
