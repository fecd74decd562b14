//! Provider identity — which upstream API family produced a measurement.

use crate::error::InvalidProvider;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The provider families AgentCost knows how to instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API.
    OpenAi,
    /// Google Gemini generateContent API.
    Google,
}

impl ProviderKind {
    /// Every supported provider, in canonical order.
    pub const ALL: [ProviderKind; 3] = [Self::Anthropic, Self::OpenAi, Self::Google];

    /// The wire name used in events and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = InvalidProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            // Gemini is Google's only priced family
            "google" | "gemini" => Ok(Self::Google),
            _ => Err(InvalidProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let parsed: ProviderKind = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(parsed, ProviderKind::Google);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Anthropic".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!("gemini".parse::<ProviderKind>(), Ok(ProviderKind::Google));
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
