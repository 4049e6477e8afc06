//! Keyword signals and simple-question patterns

use regex::Regex;
use tracing::warn;

use crate::config::RouterConfig;

struct Keyword {
    word: String,
    regex: Regex,
}

/// Compiled keyword sets and simple-question patterns
pub struct SignalMatcher {
    complexity: Vec<Keyword>,
    research: Vec<Keyword>,
    creative: Vec<Keyword>,
    simple: Vec<Regex>,
}

fn compile_keywords(words: &[String]) -> Vec<Keyword> {
    words
        .iter()
        .filter(|w| !w.trim().is_empty())
        .filter_map(|word| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(word.trim()));
            match Regex::new(&pattern) {
                Ok(regex) => Some(Keyword {
                    word: word.trim().to_lowercase(),
                    regex,
                }),
                Err(e) => {
                    warn!("Failed to compile keyword '{}': {}", word, e);
                    None
                }
            }
        })
        .collect()
}

fn matches(keywords: &[Keyword], text: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| k.regex.is_match(text))
        .map(|k| k.word.clone())
        .collect()
}

impl SignalMatcher {
    pub fn from_config(config: &RouterConfig) -> Self {
        let simple = config
            .simple_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("(?i){pattern}")) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Failed to compile simple pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect();

        Self {
            complexity: compile_keywords(&config.complexity_keywords),
            research: compile_keywords(&config.research_keywords),
            creative: compile_keywords(&config.creative_keywords),
            simple,
        }
    }

    pub fn complexity(&self, text: &str) -> Vec<String> {
        matches(&self.complexity, text)
    }

    pub fn research(&self, text: &str) -> Vec<String> {
        matches(&self.research, text)
    }

    pub fn creative(&self, text: &str) -> Vec<String> {
        matches(&self.creative, text)
    }

    /// Whether the query looks like a simple factual or social question
    pub fn is_simple(&self, text: &str) -> bool {
        let text = text.trim();
        self.simple.iter().any(|r| r.is_match(text))
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
