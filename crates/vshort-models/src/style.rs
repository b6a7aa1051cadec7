//! Editing style and background music selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Editing style filter variant applied during composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditingStyle {
    /// Blurred background with the full frame inset in the foreground
    Minimal,
    /// Direct crop to the vertical frame
    #[default]
    Dynamic,
    /// Oversized crop with contrast and sharpening
    Dramatic,
}

impl EditingStyle {
    pub const ALL: &'static [EditingStyle] = &[
        EditingStyle::Minimal,
        EditingStyle::Dynamic,
        EditingStyle::Dramatic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditingStyle::Minimal => "minimal",
            EditingStyle::Dynamic => "dynamic",
            EditingStyle::Dramatic => "dramatic",
        }
    }
}

impl fmt::Display for EditingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EditingStyle {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minimal" => Ok(EditingStyle::Minimal),
            "dynamic" => Ok(EditingStyle::Dynamic),
            "dramatic" => Ok(EditingStyle::Dramatic),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown editing style: {0}")]
pub struct StyleParseError(String);

/// Background music selector.
///
/// A named track resolves to `<music dir>/<name>.mp3` at composition time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum BackgroundMusic {
    #[default]
    None,
    Track(String),
}

impl BackgroundMusic {
    pub fn track_name(&self) -> Option<&str> {
        match self {
            BackgroundMusic::None => None,
            BackgroundMusic::Track(name) => Some(name.as_str()),
        }
    }
}

impl FromStr for BackgroundMusic {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            Ok(BackgroundMusic::None)
        } else {
            Ok(BackgroundMusic::Track(trimmed.to_string()))
        }
    }
}

impl fmt::Display for BackgroundMusic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundMusic::None => write!(f, "none"),
            BackgroundMusic::Track(name) => write!(f, "{}", name),
        }
    }
}
