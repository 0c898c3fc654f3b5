use crate::core::error::AgoraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_FEED_PAGE_SIZE: u32 = 20;
pub const DEFAULT_COMMENT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_POSTS_PER_HOUR: u32 = 5;

/// Board tuning knobs, read from `.agora/config.toml` when present.
/// Missing file or missing keys fall back to defaults; a file that exists
/// but does not parse is a hard config error rather than a silent default.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BoardConfig {
    pub feed_page_size: u32,
    pub comment_page_size: u32,
    pub posts_per_hour: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            feed_page_size: DEFAULT_FEED_PAGE_SIZE,
            comment_page_size: DEFAULT_COMMENT_PAGE_SIZE,
            posts_per_hour: DEFAULT_POSTS_PER_HOUR,
        }
    }
}

impl BoardConfig {
    pub fn load(root: &Path) -> Result<Self, AgoraError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(AgoraError::IoError)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| AgoraError::ConfigError(format!("{}: {e}", path.display())))?;
        if config.feed_page_size == 0 || config.feed_page_size > MAX_PAGE_SIZE {
            return Err(AgoraError::ConfigError(format!(
                "feed_page_size must be in 1..={MAX_PAGE_SIZE}"
            )));
        }
        if config.comment_page_size == 0 || config.comment_page_size > MAX_PAGE_SIZE {
            return Err(AgoraError::ConfigError(format!(
                "comment_page_size must be in 1..={MAX_PAGE_SIZE}"
            )));
        }
        Ok(config)
    }
}
