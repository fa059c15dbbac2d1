use serde::{Deserialize, Serialize};

/// Top-level configuration for the vortex service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VortexConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Configuration for the HTTP serving surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for browser/extension clients.
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
        }
    }
}

/// Configuration for the retry orchestration layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Generative model identifier sent to the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Cap on credential-rotating attempts per analysis call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-provider timeout for market context queries, in seconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_seconds: u64,
    /// Request timeout for the generative backend, in seconds.
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_seconds: u64,
    /// Symbol the market context aggregator queries for.
    #[serde(default = "default_context_symbol")]
    pub context_symbol: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_attempts: default_max_attempts(),
            provider_timeout_seconds: default_provider_timeout(),
            backend_timeout_seconds: default_backend_timeout(),
            context_symbol: default_context_symbol(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_model() -> String {
    "gemini-3.1-pro-preview".to_string()
}
fn default_max_attempts() -> u32 {
    50
}
fn default_provider_timeout() -> u64 {
    8
}
fn default_backend_timeout() -> u64 {
    60
}
fn default_context_symbol() -> String {
    "EURUSD".to_string()
}
fn default_true() -> bool {
    true
}
