pub mod backend;
pub mod classify;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod keypool;
pub mod market;
pub mod providers;

pub mod test_support;

pub use backend::{GeminiClient, GenerateRequest, GenerativeBackend};
pub use classify::classify;
pub use decoder::decode;
pub use engine::{ConsensusFlags, EngineOptions, SignalEngine};
pub use error::{BackendError, EngineError, ProviderError};
pub use keypool::{FailureKind, KeyPool, PoolStatus};
pub use market::{fetch_context, MarketProvider};
