use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::error::ProviderError;
use crate::market::MarketProvider;

/// Build the providers whose access secrets are present in the
/// environment, in fixed registration order.
pub fn providers_from_env() -> Vec<Arc<dyn MarketProvider>> {
    let client = Client::new();
    let mut providers: Vec<Arc<dyn MarketProvider>> = Vec::new();

    if let Some(key) = env_secret("FINNHUB_API_KEY") {
        providers.push(Arc::new(Finnhub::new(client.clone(), key)));
    }
    if let Some(key) = env_secret("TWELVEDATA_API_KEY") {
        providers.push(Arc::new(TwelveData::new(client.clone(), key)));
    }
    if let Some(key) = env_secret("ALPHAVANTAGE_API_KEY") {
        providers.push(Arc::new(AlphaVantage::new(client.clone(), key)));
    }
    if let Some(key) = env_secret("NEWSAPI_API_KEY") {
        providers.push(Arc::new(NewsApi::new(client.clone(), key)));
    }
    if let Some(key) = env_secret("TAAPI_API_KEY") {
        providers.push(Arc::new(Taapi::new(client, key)));
    }

    info!(count = providers.len(), "Configured market data providers");
    providers
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Strip pair separators: "EUR/USD" and "EUR-USD" become "EURUSD".
fn clean_symbol(symbol: &str) -> String {
    symbol.replace(['/', '-'], "")
}

/// Split a six-letter pair into its base and quote currencies.
fn currency_legs(symbol: &str) -> Result<(String, String), ProviderError> {
    let clean = clean_symbol(symbol);
    match (clean.get(..3), clean.get(3..6)) {
        (Some(base), Some(quote)) => Ok((base.to_string(), quote.to_string())),
        _ => Err(ProviderError::NoData),
    }
}

/// Render a JSON scalar the way it would appear in a report line.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<Value, ProviderError> {
    let response = client
        .get(url)
        .query(query)
        .header("Cache-Control", "no-store")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status().as_u16()));
    }
    Ok(response.json().await?)
}

/// Finnhub quote endpoint: last price plus session high/low.
pub struct Finnhub {
    client: Client,
    key: String,
}

impl Finnhub {
    pub fn new(client: Client, key: String) -> Self {
        Self { client, key }
    }

    fn line_from_json(data: &Value) -> Option<String> {
        let price = scalar_to_string(&data["c"])?;
        let high = scalar_to_string(&data["h"])?;
        let low = scalar_to_string(&data["l"])?;
        Some(format!("Finnhub -> Price: {price} | High: {high} | Low: {low}"))
    }
}

#[async_trait]
impl MarketProvider for Finnhub {
    fn name(&self) -> &str {
        "Finnhub"
    }

    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError> {
        let clean = clean_symbol(symbol);
        let data = get_json(
            &self.client,
            "https://finnhub.io/api/v1/quote",
            &[("symbol", clean.as_str()), ("token", &self.key)],
        )
        .await?;
        Self::line_from_json(&data).ok_or(ProviderError::NoData)
    }
}

/// TwelveData real-time price endpoint.
pub struct TwelveData {
    client: Client,
    key: String,
}

impl TwelveData {
    pub fn new(client: Client, key: String) -> Self {
        Self { client, key }
    }

    fn line_from_json(data: &Value) -> Option<String> {
        let price = scalar_to_string(&data["price"])?;
        Some(format!("TwelveData -> Price: {price}"))
    }
}

#[async_trait]
impl MarketProvider for TwelveData {
    fn name(&self) -> &str {
        "TwelveData"
    }

    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError> {
        let data = get_json(
            &self.client,
            "https://api.twelvedata.com/price",
            &[("symbol", symbol), ("apikey", &self.key)],
        )
        .await?;
        Self::line_from_json(&data).ok_or(ProviderError::NoData)
    }
}

/// Alpha Vantage realtime currency exchange rate.
pub struct AlphaVantage {
    client: Client,
    key: String,
}

impl AlphaVantage {
    pub fn new(client: Client, key: String) -> Self {
        Self { client, key }
    }

    fn line_from_json(data: &Value) -> Option<String> {
        let rate = data.get("Realtime Currency Exchange Rate")?;
        let exchange = scalar_to_string(&rate["5. Exchange Rate"])?;
        let bid = scalar_to_string(&rate["8. Bid Price"])?;
        let ask = scalar_to_string(&rate["9. Ask Price"])?;
        Some(format!(
            "AlphaVantage -> Rate: {exchange} | Bid: {bid} | Ask: {ask}"
        ))
    }
}

#[async_trait]
impl MarketProvider for AlphaVantage {
    fn name(&self) -> &str {
        "AlphaVantage"
    }

    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError> {
        let (base, quote) = currency_legs(symbol)?;
        let data = get_json(
            &self.client,
            "https://www.alphavantage.co/query",
            &[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", base.as_str()),
                ("to_currency", quote.as_str()),
                ("apikey", &self.key),
            ],
        )
        .await?;
        Self::line_from_json(&data).ok_or(ProviderError::NoData)
    }
}

/// NewsAPI headlines mentioning either currency leg.
pub struct NewsApi {
    client: Client,
    key: String,
}

impl NewsApi {
    pub fn new(client: Client, key: String) -> Self {
        Self { client, key }
    }

    fn line_from_json(data: &Value) -> Option<String> {
        let articles = data["articles"].as_array()?;
        let titles: Vec<String> = articles
            .iter()
            .take(3)
            .filter_map(|a| a["title"].as_str())
            .map(|t| format!("- {t}"))
            .collect();

        if titles.is_empty() {
            return None;
        }
        Some(format!("NewsAPI Latest Headlines:\n{}", titles.join("\n")))
    }
}

#[async_trait]
impl MarketProvider for NewsApi {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    fn no_data_line(&self) -> String {
        "NewsAPI: No recent articles".to_string()
    }

    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError> {
        let (base, quote) = currency_legs(symbol)?;
        let query = format!("{base} OR {quote}");
        let data = get_json(
            &self.client,
            "https://newsapi.org/v2/everything",
            &[
                ("q", query.as_str()),
                ("sortBy", "publishedAt"),
                ("apiKey", &self.key),
            ],
        )
        .await?;
        Self::line_from_json(&data).ok_or(ProviderError::NoData)
    }
}

/// TAAPI one-minute RSI.
pub struct Taapi {
    client: Client,
    key: String,
}

impl Taapi {
    pub fn new(client: Client, key: String) -> Self {
        Self { client, key }
    }

    fn line_from_json(data: &Value) -> Option<String> {
        let value = scalar_to_string(&data["value"])?;
        Some(format!("TAAPI -> RSI(1m): {value}"))
    }
}

#[async_trait]
impl MarketProvider for Taapi {
    fn name(&self) -> &str {
        "TAAPI"
    }

    async fn fetch(&self, symbol: &str) -> Result<String, ProviderError> {
        let clean = clean_symbol(symbol);
        let data = get_json(
            &self.client,
            "https://api.taapi.io/rsi",
            &[
                ("secret", self.key.as_str()),
                ("exchange", "binance"),
                ("symbol", clean.as_str()),
                ("interval", "1m"),
            ],
        )
        .await?;
        Self::line_from_json(&data).ok_or(ProviderError::NoData)
    }
}
