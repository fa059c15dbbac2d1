use serde::{Deserialize, Serialize};

/// Field names the generative backend is required to populate.
///
/// The same list drives the response schema sent with every dispatch and
/// the strict parse on the way back in.
pub const REQUIRED_FIELDS: [&str; 12] = [
    "signal",
    "pair",
    "broker",
    "session",
    "countryTime",
    "countdown",
    "candleForecast",
    "mtgSuggestion",
    "probability",
    "safetyScore",
    "reasoning",
    "zeroLossJustification",
];

/// The structured analysis produced by one successful backend call.
///
/// Every field is required; a response missing any of them does not parse
/// and is treated as a retryable decode failure upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub signal: String,
    pub pair: String,
    pub broker: String,
    pub session: String,
    pub country_time: String,
    pub countdown: String,
    pub candle_forecast: String,
    pub mtg_suggestion: String,
    pub probability: f64,
    pub safety_score: f64,
    pub reasoning: String,
    pub zero_loss_justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
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
            "reasoning": "Momentum aligned with RSI rebound",
            "zeroLossJustification": "Entry at support confluence"
        })
    }

    #[test]
    fn report_parses_from_complete_json() {
        let report: SignalReport = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(report.signal, "CALL");
        assert_eq!(report.country_time, "14:32 GMT");
        assert_eq!(report.probability, 87.5);
    }

    #[test]
    fn report_rejects_missing_required_field() {
        let mut value = sample_json();
        value.as_object_mut().unwrap().remove("safetyScore");
        assert!(serde_json::from_value::<SignalReport>(value).is_err());
    }

    #[test]
    fn report_serializes_camel_case() {
        let report: SignalReport = serde_json::from_value(sample_json()).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        let object = value.as_object().unwrap();
        for field in REQUIRED_FIELDS {
            assert!(object.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn report_tolerates_extra_fields() {
        let mut value = sample_json();
        value
            .as_object_mut()
            .unwrap()
            .insert("modelVersion".to_string(), serde_json::json!("preview"));
        assert!(serde_json::from_value::<SignalReport>(value).is_ok());
    }
}
