//! Parsing of model output into predictions and report fields.
//!
//! Enum fields fall back to their defaults, numbers are clipped, and the
//! sentiment direction is normalised against the score's sign. Only output
//! with no parseable JSON object is an error.

use crate::domain::error::DomainError;
use crate::domain::values::levels::{ImpactLevel, UrgencyLevel};
use crate::domain::values::sentiment::{direction_for_score, SentimentDirection};
use serde_json::{Map, Value};

pub const IMPACT_ANALYSIS_KEYS: [&str; 4] = [
    "business_impact",
    "market_sentiment",
    "industry_impact",
    "investment_perspective",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrediction {
    pub sentiment_direction: SentimentDirection,
    pub sentiment_score: f64,
    pub impact_level: ImpactLevel,
    pub relevance_score: f64,
    pub urgency_level: UrgencyLevel,
    pub impact_analysis: Value,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReport {
    pub overall_summary: String,
    pub short_term_scenario: Option<String>,
    pub medium_term_scenario: Option<String>,
    pub long_term_scenario: Option<String>,
    pub risk_factors: Vec<String>,
    pub opportunity_factors: Vec<String>,
    pub recommendation: Option<String>,
    pub base_price: Option<f64>,
    pub short_term_target: Option<f64>,
    pub short_term_support: Option<f64>,
    pub medium_term_target: Option<f64>,
    pub medium_term_support: Option<f64>,
    pub long_term_target: Option<f64>,
}

/// The JSON object inside a ```json fence, any fence, or the first balanced `{...}` span.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            let inner = rest[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }
    first_object_span(text)
}

fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(text: &str) -> Result<Map<String, Value>, DomainError> {
    let raw = extract_json(text)
        .ok_or_else(|| DomainError::ModelParse("no JSON object in model output".into()))?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DomainError::ModelParse("model output is not a JSON object".into())),
        Err(e) => Err(DomainError::ModelParse(e.to_string())),
    }
}

fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('원').replace(',', "").parse().ok(),
        _ => None,
    }
    .filter(|x: &f64| x.is_finite())
}

fn string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Null => None,
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items.iter().filter_map(|i| string(Some(i))).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn parse_enum<T: std::str::FromStr + Default>(v: Option<&Value>) -> T {
    v.and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

pub fn parse_prediction(text: &str) -> Result<ParsedPrediction, DomainError> {
    let obj = parse_object(text)?;

    let score = number(obj.get("sentiment_score")).unwrap_or(0.0);
    let (sentiment_direction, sentiment_score) = direction_for_score(score);

    let analysis = obj.get("impact_analysis").and_then(|v| v.as_object());
    let mut impact_analysis = Map::new();
    for key in IMPACT_ANALYSIS_KEYS {
        let value = analysis
            .and_then(|a| string(a.get(key)))
            .unwrap_or_default();
        impact_analysis.insert(key.to_string(), Value::String(value));
    }

    Ok(ParsedPrediction {
        sentiment_direction,
        sentiment_score,
        impact_level: parse_enum(obj.get("impact_level")),
        relevance_score: number(obj.get("relevance_score"))
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        urgency_level: parse_enum(obj.get("urgency_level")),
        impact_analysis: Value::Object(impact_analysis),
        reasoning: string(obj.get("reasoning")).unwrap_or_default(),
    })
}

pub fn parse_report(text: &str) -> Result<ParsedReport, DomainError> {
    let obj = parse_object(text)?;
    let targets = obj.get("price_targets").and_then(|v| v.as_object());
    let price = |key: &str| number(targets.and_then(|t| t.get(key))).filter(|p| *p > 0.0);

    Ok(ParsedReport {
        overall_summary: string(obj.get("overall_summary")).unwrap_or_default(),
        short_term_scenario: string(obj.get("short_term_scenario")),
        medium_term_scenario: string(obj.get("medium_term_scenario")),
        long_term_scenario: string(obj.get("long_term_scenario")),
        risk_factors: string_list(obj.get("risk_factors")),
        opportunity_factors: string_list(obj.get("opportunity_factors")),
        recommendation: string(obj.get("recommendation")),
        base_price: price("base_price"),
        short_term_target: price("short_term_target"),
        short_term_support: price("short_term_support"),
        medium_term_target: price("medium_term_target"),
        medium_term_support: price("medium_term_support"),
        long_term_target: price("long_term_target"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let out = "분석 결과입니다.\n```json\n{\"sentiment_direction\": \"positive\", \"sentiment_score\": 0.7, \
                   \"impact_level\": \"high\", \"relevance_score\": 0.9, \"urgency_level\": \"urgent\", \
                   \"impact_analysis\": {\"business_impact\": \"매출 증가\"}, \"reasoning\": \"HBM 수요\"}\n```";
        let p = parse_prediction(out).unwrap();
        assert_eq!(p.sentiment_direction, SentimentDirection::Positive);
        assert_eq!(p.sentiment_score, 0.7);
        assert_eq!(p.impact_level, ImpactLevel::High);
        assert_eq!(p.urgency_level, UrgencyLevel::Urgent);
        assert_eq!(p.impact_analysis["business_impact"], "매출 증가");
        assert_eq!(p.impact_analysis["industry_impact"], "");
        assert_eq!(p.reasoning, "HBM 수요");
    }

    #[test]
    fn test_bare_object_with_noise_and_braces_in_strings() {
        let out = "Sure! {\"sentiment_direction\": \"negative\", \"sentiment_score\": \"-0.4\", \
                   \"reasoning\": \"가이던스 {하향}\"} trailing";
        let p = parse_prediction(out).unwrap();
        assert_eq!(p.sentiment_direction, SentimentDirection::Negative);
        assert_eq!(p.sentiment_score, -0.4);
        assert_eq!(p.reasoning, "가이던스 {하향}");
    }

    #[test]
    fn test_defaults_clipping_and_sign_agreement() {
        let out = r#"{"sentiment_direction": "bogus", "sentiment_score": 3.5,
                      "impact_level": "enormous", "relevance_score": -2, "urgency_level": 7}"#;
        let p = parse_prediction(out).unwrap();
        // Score wins over the (unparseable) direction.
        assert_eq!(p.sentiment_direction, SentimentDirection::Positive);
        assert_eq!(p.sentiment_score, 1.0);
        assert_eq!(p.impact_level, ImpactLevel::Medium);
        assert_eq!(p.urgency_level, UrgencyLevel::Notable);
        assert_eq!(p.relevance_score, 0.0);

        let p = parse_prediction(r#"{"sentiment_direction": "positive", "sentiment_score": 0.01}"#).unwrap();
        assert_eq!(p.sentiment_direction, SentimentDirection::Neutral);
        assert_eq!(p.sentiment_score, 0.0);
    }

    #[test]
    fn test_invalid_json_is_model_parse_error() {
        assert!(matches!(parse_prediction("no json here"), Err(DomainError::ModelParse(_))));
        assert!(matches!(parse_prediction("{\"a\": }"), Err(DomainError::ModelParse(_))));
    }

    #[test]
    fn test_parse_report_levels() {
        let out = r#"```json
{"overall_summary": "견조한 실적", "risk_factors": ["환율", "수요 둔화"],
 "recommendation": "보유",
 "price_targets": {"base_price": "71,000원", "short_term_target": 74000, "short_term_support": 69000,
                   "medium_term_target": 0}}
```"#;
        let r = parse_report(out).unwrap();
        assert_eq!(r.overall_summary, "견조한 실적");
        assert_eq!(r.risk_factors.len(), 2);
        assert_eq!(r.base_price, Some(71000.0));
        assert_eq!(r.short_term_target, Some(74000.0));
        assert_eq!(r.short_term_support, Some(69000.0));
        assert_eq!(r.medium_term_target, None);
        assert_eq!(r.short_term_scenario, None);
    }
}
