//! Mock collaborators for exercising the engine without network access.
//!
//! Used by the unit tests in this crate and the scenario suite under
//! `tests/`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{GenerateRequest, GenerativeBackend};
use crate::error::{BackendError, ProviderError};
use crate::market::MarketProvider;

/// A market provider with scripted behavior.
pub struct MockProvider {
    name: String,
    line: Option<String>,
    fail: bool,
    hang: bool,
    panic: bool,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Always returns the given line.
    pub fn line(name: &str, line: &str) -> Self {
        Self {
            name: name.to_string(),
            line: Some(line.to_string()),
            fail: false,
            hang: false,
            panic: false,
            delay: None,
        }
    }

    /// Always fails with a no-data error.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            line: None,
            fail: true,
            hang: false,
            panic: false,
            delay: None,
        }
    }

    /// Never completes; only a timeout ends the query.
    pub fn hanging(name: &str) -> Self {
        Self {
            name: name.to_string(),
            line: None,
            fail: false,
            hang: true,
            panic: false,
            delay: None,
        }
    }

    /// Panics mid-fetch, killing its task.
    pub fn panicking(name: &str) -> Self {
        Self {
            name: name.to_string(),
            line: None,
            fail: false,
            hang: false,
            panic: true,
            delay: None,
        }
    }

    /// Delay the response to exercise completion-order independence.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl MarketProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _symbol: &str) -> Result<String, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.hang {
            tokio::time::sleep(Duration::from_secs(86_400)).await;
        }
        if self.panic {
            panic!("provider {} blew up", self.name);
        }
        if self.fail {
            return Err(ProviderError::NoData);
        }
        Ok(self.line.clone().unwrap_or_default())
    }
}

/// One scripted backend outcome.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Dispatch succeeds with this raw response text.
    Text(String),
    /// Dispatch fails; the message feeds the failure classifier.
    Fail(String),
}

/// One recorded dispatch.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: String,
    pub prompt: String,
}

/// A generative backend that replays a script, then a fallback outcome,
/// recording every dispatch it sees.
pub struct MockBackend {
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn with_script(script: Vec<MockOutcome>, fallback: MockOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every dispatch succeeds with the given text.
    pub fn succeeding(text: &str) -> Self {
        Self::with_script(Vec::new(), MockOutcome::Text(text.to_string()))
    }

    /// Every dispatch fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self::with_script(Vec::new(), MockOutcome::Fail(message.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn recorded_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|c| c.api_key.clone())
            .collect()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                api_key: api_key.to_string(),
                prompt: request.prompt.clone(),
            });

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Text(text) => Ok(text),
            MockOutcome::Fail(message) => Err(BackendError::Status {
                status: 500,
                body: message,
            }),
        }
    }
}

/// A complete, valid raw response body for decoder/engine tests.
pub fn sample_report_text() -> String {
    serde_json::json!({
        "signal": "CALL",
        "pair": "EURUSD",
        "broker": "Quotex",
        "session": "London",
        "countryTime": "14:32 GMT",
        "countdown": "00:45",
        "candleForecast": "Bullish engulfing",
        "mtgSuggestion": "1 step max",
        "probability": 87.5,
        "safetyScore": 9.1,
        "reasoning": "Momentum aligned",
        "zeroLossJustification": "Support confluence"
    })
    .to_string()
}
