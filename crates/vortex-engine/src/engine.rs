use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;
use vortex_models::{EngineConfig, SignalReport};

use crate::backend::{GenerateRequest, GenerativeBackend};
use crate::classify::classify;
use crate::decoder::decode;
use crate::error::EngineError;
use crate::keypool::KeyPool;
use crate::market::{fetch_context, MarketProvider};

/// Fixed instruction appended to every assembled prompt.
const STRICT_OUTPUT_INSTRUCTION: &str = "CRITICAL: Respond strictly in JSON format following the schema.\n\
     If image is provided -> extract: trend, candles, wicks, patterns, time, win zones.";

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Cap on credential-rotating attempts per call.
    pub max_attempts: u32,
    /// Symbol the market context is fetched for.
    pub context_symbol: String,
    /// Per-provider timeout for context queries.
    pub provider_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            context_symbol: "EURUSD".to_string(),
            provider_timeout: Duration::from_secs(8),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            context_symbol: config.context_symbol.clone(),
            provider_timeout: Duration::from_secs(config.provider_timeout_seconds),
        }
    }
}

/// Which auxiliary AI backends are configured. Presence of any engages
/// consensus mode in the assembled prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusFlags {
    pub openai: bool,
    pub groq: bool,
    pub deepseek: bool,
}

impl ConsensusFlags {
    pub fn from_env() -> Self {
        let present = |name: &str| std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false);
        Self {
            openai: present("OPENAI_API_KEY"),
            groq: present("GROQ_API_KEY"),
            deepseek: present("DEEPSEEK_API_KEY"),
        }
    }

    pub fn any(&self) -> bool {
        self.openai || self.groq || self.deepseek
    }

    fn notice(&self) -> String {
        if !self.any() {
            return String::new();
        }
        format!(
            "--- MULTI-MODEL CONSENSUS MODE ENGAGED ---\n\
             System will cross-check reasoning using multiple AI engines.\n\
             OpenAI: {} | Groq: {} | DeepSeek: {}\n\
             Final output must represent the highest probability outcome.\n",
            self.openai, self.groq, self.deepseek
        )
    }
}

/// The retry orchestrator: composes the credential pool, the market
/// context aggregator, the generative backend, and the response decoder
/// into one dependable analysis call.
pub struct SignalEngine {
    pool: Arc<KeyPool>,
    backend: Arc<dyn GenerativeBackend>,
    providers: Vec<Arc<dyn MarketProvider>>,
    consensus: ConsensusFlags,
    options: EngineOptions,
}

impl SignalEngine {
    pub fn new(
        pool: Arc<KeyPool>,
        backend: Arc<dyn GenerativeBackend>,
        providers: Vec<Arc<dyn MarketProvider>>,
        consensus: ConsensusFlags,
        options: EngineOptions,
    ) -> Self {
        Self {
            pool,
            backend,
            providers,
            consensus,
            options,
        }
    }

    /// Run one orchestrated analysis call.
    ///
    /// The market context is computed once and folded into every
    /// attempt's request. Each attempt acquires a credential, dispatches,
    /// and decodes; dispatch failures are classified back into the pool,
    /// decode failures retry without penalizing the credential. The loop
    /// ends in a report or one of the two fatal states.
    pub async fn analyze(
        &self,
        prompt: &str,
        image: Option<&str>,
    ) -> Result<SignalReport, EngineError> {
        let request_id = Uuid::new_v4();
        info!(%request_id, has_image = image.is_some(), "Starting analysis");

        let market_context = fetch_context(
            &self.providers,
            &self.options.context_symbol,
            self.options.provider_timeout,
        )
        .await;

        let request = GenerateRequest {
            prompt: assemble_prompt(prompt, &market_context, &self.consensus.notice()),
            image_base64: image.map(str::to_string),
        };

        let mut last_failure: Option<String> = None;

        for attempt in 1..=self.options.max_attempts {
            let Some(api_key) = self.pool.next() else {
                // Exhaustion before any dispatch means no usable
                // credentials; mid-retry it means the attempts burned
                // through everything available.
                return Err(match last_failure {
                    None => {
                        warn!(%request_id, "Out of API keys before any dispatch");
                        EngineError::PoolExhausted
                    }
                    Some(last) => {
                        warn!(%request_id, attempt, last_failure = %last, "Out of API keys mid-retry");
                        EngineError::RetriesExhausted { last }
                    }
                });
            };

            match self.backend.generate(&api_key, &request).await {
                Ok(raw) => match decode(&raw) {
                    Some(report) => {
                        info!(%request_id, attempt, signal = %report.signal, "Analysis complete");
                        return Ok(report);
                    }
                    None => {
                        // The credential was fine; only the body was bad.
                        warn!(%request_id, attempt, "Response decode failed, retrying");
                        last_failure = Some("malformed response body".to_string());
                    }
                },
                Err(e) => {
                    let message = e.to_string();
                    let kind = classify(&message);
                    warn!(%request_id, attempt, kind = ?kind, "Dispatch failed");
                    self.pool.report_failure(&api_key, kind);
                    last_failure = Some(message);
                }
            }
        }

        let last = last_failure.unwrap_or_else(|| "no attempts made".to_string());
        warn!(
            %request_id,
            attempts = self.options.max_attempts,
            last_failure = %last,
            "Retry budget exhausted"
        );
        Err(EngineError::RetriesExhausted { last })
    }
}

fn assemble_prompt(prompt: &str, market_context: &str, consensus_notice: &str) -> String {
    format!("{prompt}\n\n{market_context}\n{consensus_notice}\n{STRICT_OUTPUT_INSTRUCTION}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_prompt_orders_sections() {
        let prompt = assemble_prompt("user prompt", "MARKET CONTEXT", "CONSENSUS");
        let user = prompt.find("user prompt").unwrap();
        let market = prompt.find("MARKET CONTEXT").unwrap();
        let consensus = prompt.find("CONSENSUS").unwrap();
        let strict = prompt.find("CRITICAL: Respond strictly").unwrap();
        assert!(user < market && market < consensus && consensus < strict);
    }

    #[test]
    fn consensus_notice_only_when_any_backend_configured() {
        assert_eq!(ConsensusFlags::default().notice(), "");

        let flags = ConsensusFlags {
            openai: true,
            groq: false,
            deepseek: true,
        };
        let notice = flags.notice();
        assert!(notice.contains("MULTI-MODEL CONSENSUS MODE ENGAGED"));
        assert!(notice.contains("OpenAI: true | Groq: false | DeepSeek: true"));
    }

    #[test]
    fn options_from_config() {
        let config = EngineConfig {
            max_attempts: 7,
            context_symbol: "GBPJPY".to_string(),
            provider_timeout_seconds: 3,
            ..EngineConfig::default()
        };
        let options = EngineOptions::from_config(&config);
        assert_eq!(options.max_attempts, 7);
        assert_eq!(options.context_symbol, "GBPJPY");
        assert_eq!(options.provider_timeout, Duration::from_secs(3));
    }
}
