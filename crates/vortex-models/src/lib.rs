pub mod api;
pub mod config;
pub mod report;

pub use api::{AnalyzeRequest, ErrorEnvelope, SuccessEnvelope, ENGINE_NAME};
pub use config::{EngineConfig, ServerConfig, VortexConfig};
pub use report::SignalReport;
