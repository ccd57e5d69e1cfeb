//! Programmatic server configuration
//!
//! There is no CLI or environment layer; the embedding application builds
//! a [`ServerConfig`] and hands it to the router.

use chrono::FixedOffset;
use kupfer_search::SearchConfig;

use crate::api::content_negotiation::ContentFormat;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Timezone applied to date search values without an offset.
    pub timezone: FixedOffset,
    /// Hard upper bound for `_count`.
    pub max_count: usize,
    /// Page size when the client sends no `_count`.
    pub default_count: usize,
    /// Response format when the client expresses no preference.
    pub default_format: ContentFormat,
    /// Fail on unknown search parameters instead of dropping them.
    pub strict_search: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timezone: FixedOffset::east_opt(0).expect("UTC"),
            max_count: 500,
            default_count: 100,
            default_format: ContentFormat::Json,
            strict_search: false,
        }
    }
}

impl ServerConfig {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            timezone: self.timezone,
            max_count: self.max_count,
            default_count: self.default_count,
            strict: self.strict_search,
        }
    }
}
