//! Playback-related type definitions
//!
//! Supporting types for player state and track enrichment lifecycle.

use serde::{Deserialize, Serialize};

/// Player state enumeration
///
/// Exactly one instance lives in the player; only the job controller writes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerState {
    /// Nothing loading or playing
    #[default]
    Idle,
    /// Current track is being enriched (script, cover, speech)
    Loading,
    /// Current track's source is sounding
    Playing,
    /// Output sink suspended
    Paused,
    /// Enrichment or playback start failed for the current job
    Error,
}

impl PlayerState {
    /// Whether play/pause toggling has any effect from this state
    pub fn is_toggleable(&self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "IDLE"),
            PlayerState::Loading => write!(f, "LOADING"),
            PlayerState::Playing => write!(f, "PLAYING"),
            PlayerState::Paused => write!(f, "PAUSED"),
            PlayerState::Error => write!(f, "ERROR"),
        }
    }
}

/// Enrichment stage enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum EnrichmentStage {
    /// Script text and cover image (requested in parallel)
    Content,
    /// Speech synthesis and PCM decode
    Speech,
}

impl std::fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentStage::Content => write!(f, "Content"),
            EnrichmentStage::Speech => write!(f, "Speech"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(PlayerState::default(), PlayerState::Idle);
    }

    #[test]
    fn test_toggleable_states() {
        assert!(PlayerState::Playing.is_toggleable());
        assert!(PlayerState::Paused.is_toggleable());
        assert!(!PlayerState::Loading.is_toggleable());
        assert!(!PlayerState::Error.is_toggleable());
        assert!(!PlayerState::Idle.is_toggleable());
    }

    #[test]
    fn test_state_serializes_uppercase() {
        let json = serde_json::to_string(&PlayerState::Loading).unwrap();
        assert_eq!(json, "\"LOADING\"");

        let parsed: PlayerState = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(parsed, PlayerState::Paused);
    }
}
