//! Configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Credentials never live here; see [`crate::providers::Credentials`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutewiseConfig {
    pub providers: ProvidersConfig,
    pub router: RouterConfig,
    pub executor: ExecutorConfig,
}

/// Which backends to use and in what fallback order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub order: Vec<String>,
    pub overrides: HashMap<String, ProviderOverride>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: ["anthropic", "openai", "google", "groq"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            overrides: HashMap::new(),
        }
    }
}

/// Per-backend model and endpoint overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub primary_model: Option<String>,
    pub secondary_model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Pattern-gated bypass applies below this word count
    pub short_query_words: usize,
    /// Below this word count bypass applies without a pattern match
    pub very_short_query_words: usize,
    pub bypass_confidence: f64,
    /// Backend used for classification; `None` disables the classifier tier
    pub classifier_provider: Option<String>,
    pub complexity_keywords: Vec<String>,
    pub research_keywords: Vec<String>,
    pub creative_keywords: Vec<String>,
    /// Case-insensitive regexes for questions simple enough to bypass
    pub simple_patterns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            short_query_words: 10,
            very_short_query_words: 4,
            bypass_confidence: 0.95,
            classifier_provider: None,
            complexity_keywords: strings(&[
                "compare",
                "contrast",
                "analyze",
                "analyse",
                "evaluate",
                "trade-off",
                "trade-offs",
                "tradeoff",
                "tradeoffs",
                "pros and cons",
                "step by step",
                "in depth",
                "in-depth",
                "explain why",
                "implications",
                "architecture",
                "design",
                "optimize",
                "debug",
                "prove",
                "derive",
            ]),
            research_keywords: strings(&[
                "research",
                "sources",
                "cite",
                "citation",
                "citations",
                "references",
                "literature",
                "studies",
                "study",
                "evidence",
                "paper",
                "papers",
                "survey",
                "according to",
            ]),
            creative_keywords: strings(&[
                "story",
                "poem",
                "poetry",
                "write a song",
                "lyrics",
                "fiction",
                "creative",
                "imagine",
                "brainstorm",
                "slogan",
                "haiku",
                "screenplay",
            ]),
            simple_patterns: strings(&[
                r"^(what|who|when|where)\s+(is|are|was|were)\b",
                r"^(define|definition of)\b",
                r"^what\s+does\s+.+\s+mean\b",
                r"^how\s+do\s+(you|i)\s+(say|spell|pronounce)\b",
                r"^(hi|hello|hey|thanks|thank you)\b",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// USD per million input tokens for models missing from the registry
    pub default_input_price_per_mtok: f64,
    /// USD per million output tokens for models missing from the registry
    pub default_output_price_per_mtok: f64,
    /// Confidence reported when no routing decision accompanies a request
    pub default_confidence: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_input_price_per_mtok: 1.0,
            default_output_price_per_mtok: 3.0,
            default_confidence: 0.8,
        }
    }
}

impl RoutewiseConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse routewise configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
