//! Feed capability configuration
//!
//! The reorder window decides which arrival permutations can be repaired,
//! so its capacity must be stated explicitly for every feed. There is no
//! default: a capability file without `reorder_window` is rejected.
//!
//! ```toml
//! [feed]
//! name = "okx-books"
//! reorder_window = 8
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::SyncError;
use crate::loader::read_required;

/// Configuration errors. Fatal, not "needs data".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("capability file is not valid TOML: {0}")]
    Parse(String),

    #[error("capability file has no [feed] table")]
    MissingFeedTable,

    #[error("feed.reorder_window is required and has no default")]
    MissingReorderWindow,

    #[error("feed.reorder_window must be at least 1")]
    ZeroReorderWindow,
}

#[derive(Debug, Deserialize)]
struct CapabilityFile {
    feed: Option<FeedSection>,
}

#[derive(Debug, Deserialize)]
struct FeedSection {
    name: Option<String>,
    reorder_window: Option<usize>,
}

/// Capabilities of one market-data feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCapabilities {
    /// Informational feed name, used in logs.
    pub name: Option<String>,
    /// Reorder window capacity `W`.
    pub reorder_window: NonZeroUsize,
}

impl FeedCapabilities {
    /// Capabilities with an explicit window and no file behind them.
    pub fn with_reorder_window(reorder_window: usize) -> Result<Self, ConfigError> {
        let reorder_window =
            NonZeroUsize::new(reorder_window).ok_or(ConfigError::ZeroReorderWindow)?;
        Ok(Self {
            name: None,
            reorder_window,
        })
    }

    /// Parse a capability document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: CapabilityFile =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let feed = file.feed.ok_or(ConfigError::MissingFeedTable)?;
        let window = feed
            .reorder_window
            .ok_or(ConfigError::MissingReorderWindow)?;

        let mut caps = Self::with_reorder_window(window)?;
        caps.name = feed.name;
        Ok(caps)
    }

    /// Load a capability file. A missing file is "needs data".
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = read_required(path, "capability file")?;
        let caps = Self::from_toml_str(&text)?;

        info!(
            path = %path.display(),
            feed = caps.name.as_deref().unwrap_or("-"),
            reorder_window = caps.reorder_window.get(),
            "Feed capabilities loaded"
        );
        Ok(caps)
    }

    /// Replace the window, e.g. from a command-line override.
    pub fn override_reorder_window(mut self, reorder_window: usize) -> Result<Self, ConfigError> {
        self.reorder_window =
            NonZeroUsize::new(reorder_window).ok_or(ConfigError::ZeroReorderWindow)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let caps = FeedCapabilities::from_toml_str(
            "[feed]\nname = \"okx-books\"\nreorder_window = 8\n",
        )
        .unwrap();
        assert_eq!(caps.name.as_deref(), Some("okx-books"));
        assert_eq!(caps.reorder_window.get(), 8);
    }

    #[test]
    fn test_window_is_required() {
        assert_eq!(
            FeedCapabilities::from_toml_str("[feed]\nname = \"x\"\n"),
            Err(ConfigError::MissingReorderWindow)
        );
        assert_eq!(
            FeedCapabilities::from_toml_str("title = \"x\"\n"),
            Err(ConfigError::MissingFeedTable)
        );
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            FeedCapabilities::from_toml_str("[feed]\nreorder_window = 0\n"),
            Err(ConfigError::ZeroReorderWindow)
        );
        assert_eq!(
            FeedCapabilities::with_reorder_window(0),
            Err(ConfigError::ZeroReorderWindow)
        );
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            FeedCapabilities::from_toml_str("[feed\nreorder_window = 8"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            FeedCapabilities::from_toml_str("[feed]\nreorder_window = -3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_override() {
        let caps = FeedCapabilities::with_reorder_window(4)
            .unwrap()
            .override_reorder_window(16)
            .unwrap();
        assert_eq!(caps.reorder_window.get(), 16);
        assert!(FeedCapabilities::with_reorder_window(4)
            .unwrap()
            .override_reorder_window(0)
            .is_err());
    }
}
