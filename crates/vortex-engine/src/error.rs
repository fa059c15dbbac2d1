use thiserror::Error;

/// Fatal outcomes of an orchestrated analysis call.
///
/// These are the only failures that reach the caller; credential-level and
/// provider-level failures are absorbed inside the engine. Display text is
/// fixed remediation wording: upstream detail can embed credentials (a
/// transport error prints the full request URL, key query included), so it
/// stays in the `last` field for logs and never reaches the wire.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No usable API credentials are available. Add keys to the environment and restart.")]
    PoolExhausted,

    #[error("All analysis attempts failed. Please retry in a moment.")]
    RetriesExhausted { last: String },
}

/// Failure dispatching to the generative backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned an empty or unreadable response")]
    EmptyResponse,
}

/// Failure querying a single market data provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("no usable data in response")]
    NoData,
}
