use vortex_models::SignalReport;

/// Decode an untrusted backend response into a `SignalReport`.
///
/// Strips fenced-code wrappers (```json ... ```), trims, then parses
/// strictly. Any malformed input yields `None` so the caller can retry;
/// this function never panics or returns an error.
pub fn decode(raw: &str) -> Option<SignalReport> {
    let cleaned = strip_fences(raw);
    serde_json::from_str(cleaned.trim()).ok()
}

/// Remove every ```json (any case) and ``` marker from the text, the way
/// generative backends like to wrap structured output.
fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 3..];
        let skip = match after.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => 7,
            _ => 3,
        };
        rest = &rest[pos + skip..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
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
    }"#;

    #[test]
    fn decode_clean_json() {
        let report = decode(VALID).unwrap();
        assert_eq!(report.signal, "CALL");
        assert_eq!(report.probability, 87.5);
    }

    #[test]
    fn fenced_and_unfenced_decode_identically() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(decode(&fenced), decode(VALID));

        let fenced_upper = format!("```JSON\n{VALID}\n```");
        assert_eq!(decode(&fenced_upper), decode(VALID));

        let bare_fence = format!("```\n{VALID}\n```");
        assert_eq!(decode(&bare_fence), decode(VALID));
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        let padded = format!("\n\n  {VALID}  \n");
        assert!(decode(&padded).is_some());
    }

    #[test]
    fn truncated_input_yields_none() {
        let truncated = &VALID[..VALID.len() / 2];
        assert!(decode(truncated).is_none());
    }

    #[test]
    fn non_json_yields_none() {
        assert!(decode("I could not produce a signal this time.").is_none());
        assert!(decode("").is_none());
        assert!(decode("{}").is_none());
    }

    #[test]
    fn missing_required_field_yields_none() {
        let missing = VALID.replace(r#""signal": "CALL","#, "");
        assert!(decode(&missing).is_none());
    }

    #[test]
    fn strip_fences_removes_all_markers() {
        assert_eq!(strip_fences("```json\n{}\n```"), "\n{}\n");
        assert_eq!(strip_fences("no fences here"), "no fences here");
        assert_eq!(strip_fences("``` ```json x"), "  x");
    }
}
