//! Named row records for the destination schema.
//!
//! Field order in each struct matches the destination table's column order;
//! the SQL serializer relies on this when it renders positional value lists.

use serde::{Deserialize, Serialize};

/// One row of the users table plus the user_group default that accompanies
/// every migrated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: u32,
    pub username: String,
    pub username_clean: String,
    pub user_password: String,
    pub group_id: u32,
    pub user_permissions: String,
    pub user_sig: String,
    pub user_sig_bbcode_uid: String,
    pub user_sig_bbcode_bitfield: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forum {
    pub forum_id: u32,
    pub parent_id: u32,
    pub left_id: u32,
    pub right_id: u32,
    pub forum_name: String,
    /// 0 = category container, 1 = postable forum.
    pub forum_type: u32,
    pub forum_parents: String,
    pub forum_desc: String,
    pub forum_rules: String,
    pub forum_flags: u32,
    pub forum_last_post_id: u32,
    pub forum_last_poster_id: u32,
    pub forum_last_poster_name: String,
    pub forum_last_post_subject: String,
    pub forum_last_post_time: u64,
    pub forum_posts_approved: u32,
    pub forum_topics_approved: u32,
}

impl Forum {
    pub fn new(
        forum_id: u32,
        parent_id: u32,
        left_id: u32,
        right_id: u32,
        forum_name: String,
        is_category: bool,
    ) -> Self {
        Self {
            forum_id,
            parent_id,
            left_id,
            right_id,
            forum_name,
            forum_type: if is_category { 0 } else { 1 },
            forum_parents: String::new(),
            forum_desc: String::new(),
            forum_rules: String::new(),
            forum_flags: 48,
            forum_last_post_id: 0,
            forum_last_poster_id: 0,
            forum_last_poster_name: String::new(),
            forum_last_post_subject: String::new(),
            forum_last_post_time: 0,
            forum_posts_approved: 0,
            forum_topics_approved: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: u32,
    /// 1 when the topic is stickied.
    pub topic_type: u32,
    pub forum_id: u32,
    pub topic_title: String,
    /// 1 when the topic is locked.
    pub topic_status: u32,
    pub topic_visibility: u32,
    pub topic_time: u64,
    pub topic_first_post_id: u32,
    pub topic_first_poster_name: String,
    pub topic_poster: u32,
    pub topic_last_post_id: u32,
    pub topic_last_poster_id: u32,
    pub topic_last_poster_name: String,
    pub topic_last_post_subject: String,
    pub topic_last_post_time: u64,
    pub topic_posts_approved: u32,
}

impl Topic {
    pub fn new(topic_id: u32, forum_id: u32, title: String, sticky: bool, locked: bool) -> Self {
        Self {
            topic_id,
            topic_type: sticky as u32,
            forum_id,
            topic_title: title,
            topic_status: locked as u32,
            topic_visibility: 1,
            topic_time: 0,
            topic_first_post_id: 0,
            topic_first_poster_name: String::new(),
            topic_poster: 0,
            topic_last_post_id: 0,
            topic_last_poster_id: 0,
            topic_last_poster_name: String::new(),
            topic_last_post_subject: String::new(),
            topic_last_post_time: 0,
            topic_posts_approved: 0,
        }
    }
}

/// Immutable once appended; ids are assigned monotonically across the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: u32,
    pub topic_id: u32,
    pub forum_id: u32,
    pub poster_id: u32,
    pub post_visibility: u32,
    pub post_time: u64,
    pub post_username: String,
    pub post_edit_time: u64,
    pub post_edit_count: u32,
    pub post_edit_user: String,
    pub post_subject: String,
    pub post_text: String,
    pub bbcode_uid: String,
    pub bbcode_bitfield: String,
    pub post_edit_reason: String,
}

/// The complete output of a run, serializable as a JSON row-set dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowSets {
    pub users: Vec<User>,
    pub forums: Vec<Forum>,
    pub topics: Vec<Topic>,
    pub posts: Vec<Post>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forum_type_reflects_category_flag() {
        let cat = Forum::new(1, 0, 1, 2, "cat".into(), true);
        let forum = Forum::new(2, 1, 1, 2, "general".into(), false);
        assert_eq!(cat.forum_type, 0);
        assert_eq!(forum.forum_type, 1);
    }

    #[test]
    fn topic_flags_map_to_type_and_status() {
        let t = Topic::new(1, 2, "t".into(), true, false);
        assert_eq!(t.topic_type, 1);
        assert_eq!(t.topic_status, 0);
        assert_eq!(t.topic_visibility, 1);
    }

    #[test]
    fn row_sets_serialize_in_declared_field_order() {
        let sets = RowSets::default();
        let json = serde_json::to_string(&sets).unwrap();
        assert_eq!(json, r#"{"users":[],"forums":[],"topics":[],"posts":[]}"#);
    }
}
