//! Backend-assisted classification: prompt and response parsing

use serde::Deserialize;
use serde_json::Value;

use super::{QueryMode, RoutingInput};
use crate::route::Route;

/// Confidence assigned when the classifier output could not be used
pub(crate) const PARSE_FAILURE_CONFIDENCE: f64 = 0.5;

/// Confidence assumed when the classifier names a route but omits confidence
const MISSING_CONFIDENCE: f64 = 0.7;

pub(crate) const CLASSIFIER_MAX_TOKENS: u32 = 256;

pub(crate) const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are a query router. Classify the user's query into exactly one processing route:

- fast: greetings, definitions, single-fact lookups. Signals: short, one clear answer.
- standard: ordinary questions needing a clear, moderately detailed answer. The default.
- deep: multi-step reasoning, comparisons, trade-off analysis, design or debugging. \
Signals: compare, analyze, evaluate, trade-offs, step by step.
- creative: stories, poems, brainstorming, marketing copy. Signals: write, imagine, story, poem.
- research: questions that need sourced, evidence-based synthesis. \
Signals: research, sources, studies, literature, citations.

Respond with a single JSON object and nothing else:
{\"route\": \"fast|standard|deep|creative|research\", \"confidence\": 0.0-1.0, \
\"reasoning\": \"one sentence\", \"complexity_signals\": [\"signal\", ...]}";

/// User turn sent to the classifier: the query plus structured context
pub(crate) fn build_prompt(input: &RoutingInput<'_>) -> String {
    let mode = match input.mode {
        QueryMode::Standard => "standard",
        QueryMode::Research => "research",
    };
    format!(
        "Query: {}\n\nContext:\n- mode: {}\n- prior conversation turns: {}\n- retrieved documents attached: {}",
        input.query,
        mode,
        input.history_len,
        if input.has_context { "yes" } else { "no" }
    )
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    route: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    complexity_signals: Value,
}

/// A usable classification
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Classification {
    pub route: Route,
    pub confidence: f64,
    pub reasoning: String,
    pub signals: Vec<String>,
}

/// Parse classifier output. `Err` carries a reason the output was unusable.
pub(crate) fn parse_classification(text: &str) -> Result<Classification, String> {
    let block = extract_json_block(text).ok_or_else(|| "no JSON object in classifier output".to_string())?;
    let raw: RawDecision =
        serde_json::from_str(block).map_err(|e| format!("invalid classifier JSON: {e}"))?;
    let route = Route::parse(&raw.route)
        .ok_or_else(|| format!("classifier returned unknown route '{}'", raw.route))?;

    let confidence = raw.confidence.unwrap_or(MISSING_CONFIDENCE);
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        PARSE_FAILURE_CONFIDENCE
    };

    let signals = match raw.complexity_signals {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    };

    Ok(Classification {
        route,
        confidence,
        reasoning: raw
            .reasoning
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Classifier selected {route}")),
        signals,
    })
}

/// First balanced `{...}` block in `text`, ignoring braces inside strings
pub(crate) fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
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
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json_block(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_from_fenced_prose() {
        let text = "Sure!\n```json\n{\"route\": \"deep\", \"x\": {\"y\": 1}}\n```\nThen {\"other\": 2}";
        assert_eq!(
            extract_json_block(text),
            Some("{\"route\": \"deep\", \"x\": {\"y\": 1}}")
        );
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let text = r#"{"reasoning": "uses } and { and \" quotes", "route": "fast"}"#;
        assert_eq!(extract_json_block(text), Some(text));
    }

    #[test]
    fn test_extract_unbalanced_or_missing() {
        assert_eq!(extract_json_block("no json here"), None);
        assert_eq!(extract_json_block("{\"route\": \"fast\""), None);
    }

    #[test]
    fn test_parse_full_decision() {
        let parsed = parse_classification(
            r#"{"route": "Deep", "confidence": 0.82, "reasoning": "Needs comparison", "complexity_signals": ["compare", 3, "trade-offs"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.route, Route::Deep);
        assert_eq!(parsed.confidence, 0.82);
        assert_eq!(parsed.reasoning, "Needs comparison");
        assert_eq!(parsed.signals, vec!["compare", "trade-offs"]);
    }

    #[test]
    fn test_parse_clamps_confidence() {
        let high = parse_classification(r#"{"route": "fast", "confidence": 7}"#).unwrap();
        assert_eq!(high.confidence, 1.0);
        let low = parse_classification(r#"{"route": "fast", "confidence": -0.3}"#).unwrap();
        assert_eq!(low.confidence, 0.0);
        let missing = parse_classification(r#"{"route": "fast"}"#).unwrap();
        assert_eq!(missing.confidence, MISSING_CONFIDENCE);
        assert!(missing.reasoning.contains("fast"));
    }

    #[test]
    fn test_parse_rejects_unknown_route() {
        let err = parse_classification(r#"{"route": "turbo", "confidence": 0.9}"#).unwrap_err();
        assert!(err.contains("turbo"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_classification("I think it is deep").is_err());
        assert!(parse_classification(r#"{"confidence": 0.9}"#).is_err());
        assert!(parse_classification(r#"{"route": 5}"#).is_err());
    }

    #[test]
    fn test_prompt_includes_context() {
        let prompt = build_prompt(&RoutingInput {
            query: "find studies on sleep",
            mode: QueryMode::Research,
            history_len: 2,
            has_context: true,
        });
        assert!(prompt.contains("find studies on sleep"));
        assert!(prompt.contains("mode: research"));
        assert!(prompt.contains("prior conversation turns: 2"));
        assert!(prompt.contains("retrieved documents attached: yes"));
    }
}
