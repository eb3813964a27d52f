// Migration configuration - single source of truth for tunables

use serde::{Deserialize, Serialize};

/// Fixed page increments used by the legacy board's pagination.
pub struct Paging;

impl Paging {
    /// Posts rendered per topic page.
    pub const POSTS_PER_PAGE: usize = 30;
    /// Topic entries rendered per forum listing page.
    pub const TOPICS_PER_PAGE: usize = 35;
}

/// Everything a run needs, built from CLI flags or a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Base URL of the legacy board (trailing slash included).
    pub from: String,
    /// Base URL of the destination installation.
    pub to: String,
    /// Old ids of the top-level forums to crawl.
    pub forum_ids: Vec<u32>,
    /// Destination table-name prefix.
    pub prefix: String,
    /// Seed for placeholder passwords and per-post salts.
    pub seed: u64,
    pub start_user_id: u32,
    pub start_topic_id: u32,
    pub start_post_id: u32,
    pub start_forum_id: u32,
    /// Parent id assigned to the crawled top-level forums.
    pub root_forum_id: u32,
    pub max_users: Option<u32>,
    pub max_posts: Option<u32>,
    pub max_topics: Option<u32>,
    pub max_forums: Option<u32>,
    /// Fetch each post's quote page to recover the original markup.
    pub quote_mode: bool,
    /// Claim every known tag in each bitfield instead of the observed set.
    pub force_bitfield: bool,
    /// Synthesize collision-avoiding usernames on the destination.
    pub temp_usernames: bool,
    /// Pacing delay between outbound requests.
    pub request_delay_ms: u64,
    /// Maximum rows per post insert statement.
    pub post_chunk_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            forum_ids: Vec::new(),
            prefix: "phpbb_".to_string(),
            seed: 0,
            start_user_id: 1,
            start_topic_id: 1,
            start_post_id: 1,
            start_forum_id: 1,
            root_forum_id: 0,
            max_users: None,
            max_posts: None,
            max_topics: None,
            max_forums: None,
            quote_mode: false,
            force_bitfield: false,
            temp_usernames: false,
            request_delay_ms: 500,
            post_chunk_size: 50,
        }
    }
}

impl MigrationConfig {
    pub fn limits(&self) -> crate::error::Limits {
        crate::error::Limits {
            max_users: self.max_users,
            max_posts: self.max_posts,
            max_topics: self.max_topics,
            max_forums: self.max_forums,
        }
    }
}
