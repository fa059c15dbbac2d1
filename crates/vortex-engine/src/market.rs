use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProviderError;

/// Emitted instead of provider lines when no provider is configured.
pub const FALLBACK_NOTICE: &str =
    "No external market APIs detected. Running in pure vision-analysis mode.";

/// One optional external market data source.
///
/// Implementations are stateless with respect to shared memory; each
/// `fetch` is a single bounded network query returning one formatted
/// context line.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch and format this provider's data for the symbol.
    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError>;

    /// Placeholder line when the query fails, times out, or has no data.
    fn no_data_line(&self) -> String {
        format!("{}: No data", self.name())
    }
}

/// Query every configured provider concurrently and fuse the results
/// into one context blob.
///
/// Settle-all semantics: each query is individually bounded by
/// `per_provider_timeout`, a slow or failing provider degrades to its
/// no-data line without touching the others, and the output preserves
/// registration order regardless of completion order. Never fails.
pub async fn fetch_context(
    providers: &[Arc<dyn MarketProvider>],
    symbol: &str,
    per_provider_timeout: Duration,
) -> String {
    let mut context = format!(
        "===========================\n \
         REAL-TIME MARKET CONTEXT FUSION\n \
         Pair: {symbol}\n\
         ============================\n"
    );

    let mut handles = Vec::with_capacity(providers.len());
    for provider in providers {
        let fallback = provider.no_data_line();
        let provider = Arc::clone(provider);
        let symbol = symbol.to_string();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(per_provider_timeout, provider.fetch(&symbol)).await {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "Provider query failed");
                    provider.no_data_line()
                }
                // The timeout cancels only this provider's in-flight query.
                Err(_) => {
                    warn!(provider = provider.name(), "Provider query timed out");
                    provider.no_data_line()
                }
            }
        });
        handles.push((fallback, handle));
    }

    // Awaiting in spawn order keeps the blob in registration order; a
    // panicked task still contributes its absence marker.
    for (fallback, handle) in handles {
        let line = match handle.await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Provider task panicked");
                fallback
            }
        };
        context.push_str(&line);
        context.push('\n');
    }

    if providers.is_empty() {
        context.push_str(FALLBACK_NOTICE);
        context.push('\n');
    }

    context.push_str("============================================\n");
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockProvider;

    fn as_providers(mocks: Vec<MockProvider>) -> Vec<Arc<dyn MarketProvider>> {
        mocks
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn MarketProvider>)
            .collect()
    }

    #[tokio::test]
    async fn zero_providers_yields_fallback_notice() {
        let context = fetch_context(&[], "EURUSD", Duration::from_secs(8)).await;
        assert!(context.contains(FALLBACK_NOTICE));
        assert!(context.contains("Pair: EURUSD"));
        assert!(!context.contains("No data"));
    }

    #[tokio::test]
    async fn successful_providers_appear_in_registration_order() {
        let providers = as_providers(vec![
            MockProvider::line("Alpha", "Alpha -> 1.0"),
            MockProvider::line("Beta", "Beta -> 2.0"),
            MockProvider::line("Gamma", "Gamma -> 3.0"),
        ]);

        let context = fetch_context(&providers, "EURUSD", Duration::from_secs(8)).await;
        let alpha = context.find("Alpha -> 1.0").unwrap();
        let beta = context.find("Beta -> 2.0").unwrap();
        let gamma = context.find("Gamma -> 3.0").unwrap();
        assert!(alpha < beta && beta < gamma);
        assert!(!context.contains(FALLBACK_NOTICE));
    }

    #[tokio::test]
    async fn failing_provider_degrades_to_no_data_line() {
        let providers = as_providers(vec![
            MockProvider::line("Alpha", "Alpha -> 1.0"),
            MockProvider::failing("Beta"),
        ]);

        let context = fetch_context(&providers, "EURUSD", Duration::from_secs(8)).await;
        assert!(context.contains("Alpha -> 1.0"));
        assert!(context.contains("Beta: No data"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_without_delaying_siblings() {
        let providers = as_providers(vec![
            MockProvider::line("Fast", "Fast -> 1.0"),
            MockProvider::hanging("Slow"),
        ]);

        let context = fetch_context(&providers, "EURUSD", Duration::from_secs(8)).await;
        assert!(context.contains("Fast -> 1.0"));
        assert!(context.contains("Slow: No data"));
    }

    #[tokio::test]
    async fn panicking_provider_still_leaves_its_absence_marker() {
        let providers = as_providers(vec![
            MockProvider::line("Alpha", "Alpha -> 1.0"),
            MockProvider::panicking("Beta"),
            MockProvider::line("Gamma", "Gamma -> 3.0"),
        ]);

        let context = fetch_context(&providers, "EURUSD", Duration::from_secs(8)).await;
        let alpha = context.find("Alpha -> 1.0").unwrap();
        let beta = context.find("Beta: No data").unwrap();
        let gamma = context.find("Gamma -> 3.0").unwrap();
        assert!(alpha < beta && beta < gamma);
    }

    #[tokio::test]
    async fn completion_order_does_not_affect_output_order() {
        // First-registered provider finishes last.
        let providers = as_providers(vec![
            MockProvider::line("First", "First -> 1.0").with_delay(Duration::from_millis(50)),
            MockProvider::line("Second", "Second -> 2.0"),
        ]);

        let context = fetch_context(&providers, "EURUSD", Duration::from_secs(8)).await;
        let first = context.find("First -> 1.0").unwrap();
        let second = context.find("Second -> 2.0").unwrap();
        assert!(first < second);
    }
}
