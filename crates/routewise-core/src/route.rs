//! The fixed set of processing routes

use serde::{Deserialize, Serialize};

/// A processing tier. Every routing decision lands on exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Fast,
    Standard,
    Deep,
    Creative,
    Research,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Fast,
        Route::Standard,
        Route::Deep,
        Route::Creative,
        Route::Research,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Fast => "fast",
            Route::Standard => "standard",
            Route::Deep => "deep",
            Route::Creative => "creative",
            Route::Research => "research",
        }
    }

    /// Parse a route name, case-insensitively. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Some(Route::Fast),
            "standard" => Some(Route::Standard),
            "deep" => Some(Route::Deep),
            "creative" => Some(Route::Creative),
            "research" => Some(Route::Research),
            _ => None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Route::Fast => 0,
            Route::Standard => 1,
            Route::Deep => 2,
            Route::Creative => 3,
            Route::Research => 4,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::parse(s).ok_or_else(|| format!("unknown route '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Route::parse("DEEP"), Some(Route::Deep));
        assert_eq!(Route::parse(" creative "), Some(Route::Creative));
        assert_eq!(Route::parse("turbo"), None);
        assert_eq!(Route::parse(""), None);
    }

    #[test]
    fn test_display_matches_serde() {
        for route in Route::ALL {
            let json = serde_json::to_string(&route).unwrap();
            assert_eq!(json, format!("\"{route}\""));
        }
    }

    #[test]
    fn test_indices_are_distinct() {
        let mut seen = [false; 5];
        for route in Route::ALL {
            assert!(!seen[route.index()]);
            seen[route.index()] = true;
        }
    }

    #[test]
    fn test_from_str_error() {
        let err = "slow".parse::<Route>().unwrap_err();
        assert!(err.contains("slow"));
    }
}
