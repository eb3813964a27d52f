//! Bulk-insert statement generation.
//!
//! The positional value lists rendered here are the only place the named
//! records are flattened back into column order. Escaping policy: numeric
//! columns unquoted, text columns single-quoted with embedded quotes doubled.

use sha2::{Digest, Sha256};

use crate::models::{Forum, Post, RowSets, Topic, User};

/// Default grants applied to every created forum: (group_id, auth_role_id)
/// pairs matching a stock installation's group set.
const DEFAULT_PERMISSIONS: &[(u32, u32)] = &[
    (1, 17),
    (2, 21),
    (3, 21),
    (4, 14),
    (4, 11),
    (5, 14),
    (5, 10),
    (6, 19),
];

const USER_COLUMNS: &str = "user_id, username, username_clean, user_password, group_id, \
     user_permissions, user_sig, user_sig_bbcode_uid, user_sig_bbcode_bitfield";

const FORUM_COLUMNS: &str = "forum_id, parent_id, left_id, right_id, forum_name, forum_type, \
     forum_parents, forum_desc, forum_rules, forum_flags, forum_last_post_id, \
     forum_last_poster_id, forum_last_poster_name, forum_last_post_subject, \
     forum_last_post_time, forum_posts_approved, forum_topics_approved";

const TOPIC_COLUMNS: &str = "topic_id, topic_type, forum_id, topic_title, topic_status, \
     topic_visibility, topic_time, topic_first_post_id, topic_first_poster_name, topic_poster, \
     topic_last_post_id, topic_last_poster_id, topic_last_poster_name, topic_last_post_subject, \
     topic_last_post_time, topic_posts_approved";

const POST_COLUMNS: &str = "post_id, topic_id, forum_id, poster_id, post_visibility, post_time, \
     post_username, post_edit_time, post_edit_count, post_edit_user, post_subject, post_text, \
     bbcode_uid, bbcode_bitfield, post_edit_reason";

/// One rendered SQL literal.
enum Value {
    Num(u64),
    Text(String),
}

impl Value {
    fn render(&self) -> String {
        match self {
            Value::Num(n) => n.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

fn num(n: u32) -> Value {
    Value::Num(n as u64)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub struct SqlWriter<'a> {
    rows: &'a RowSets,
    prefix: &'a str,
    seed: u64,
    post_chunk_size: usize,
}

impl<'a> SqlWriter<'a> {
    pub fn new(rows: &'a RowSets, prefix: &'a str, seed: u64, post_chunk_size: usize) -> Self {
        Self {
            rows,
            prefix,
            seed,
            post_chunk_size: post_chunk_size.max(1),
        }
    }

    /// Users plus their default group memberships. The password column is a
    /// seeded digest of the clean name, a placeholder that forces a reset
    /// flow rather than carrying real credentials.
    pub fn users_sql(&self) -> String {
        if self.rows.users.is_empty() {
            return String::new();
        }
        let users = self
            .rows
            .users
            .iter()
            .map(|u| render_row(user_values(u, self.seed)))
            .collect::<Vec<_>>()
            .join(",\n");
        let groups = self
            .rows
            .users
            .iter()
            .map(|u| render_row(vec![num(u.group_id), num(u.user_id), num(0)]))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "INSERT INTO {p}users ({cols}) VALUES\n{users};\n\
             INSERT INTO {p}user_group (group_id, user_id, user_pending) VALUES\n{groups};\n",
            p = self.prefix,
            cols = USER_COLUMNS,
        )
    }

    pub fn forums_sql(&self) -> String {
        single_insert(
            &format!("{}forums", self.prefix),
            FORUM_COLUMNS,
            self.rows.forums.iter().map(forum_values),
        )
    }

    pub fn topics_sql(&self) -> String {
        single_insert(
            &format!("{}topics", self.prefix),
            TOPIC_COLUMNS,
            self.rows.topics.iter().map(topic_values),
        )
    }

    /// Posts carry transcoded bodies and can be arbitrarily large, so their
    /// inserts are chunked to bound statement size.
    pub fn posts_sql(&self) -> String {
        self.rows
            .posts
            .chunks(self.post_chunk_size)
            .map(|chunk| {
                single_insert(
                    &format!("{}posts", self.prefix),
                    POST_COLUMNS,
                    chunk.iter().map(post_values),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Cross-product of the default grant table with every created forum.
    pub fn permissions_sql(&self) -> String {
        if self.rows.forums.is_empty() {
            return String::new();
        }
        let grants = self.rows.forums.iter().flat_map(|f| {
            DEFAULT_PERMISSIONS.iter().map(move |&(group, role)| {
                vec![num(group), num(f.forum_id), num(0), num(role), num(0)]
            })
        });
        single_insert(
            &format!("{}acl_groups", self.prefix),
            "group_id, forum_id, auth_option_id, auth_role_id, auth_setting",
            grants,
        )
    }

    /// `username,password` lines so the operator can hand out the generated
    /// placeholders.
    pub fn user_passwords(&self) -> String {
        self.rows
            .users
            .iter()
            .map(|u| format!("{},{}", u.username, u.user_password))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every statement in dependency order.
    pub fn structure_sql(&self) -> String {
        [
            self.forums_sql(),
            self.topics_sql(),
            self.posts_sql(),
            self.permissions_sql(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

fn render_row(values: Vec<Value>) -> String {
    format!(
        "({})",
        values
            .iter()
            .map(Value::render)
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn single_insert<I>(table: &str, columns: &str, rows: I) -> String
where
    I: Iterator<Item = Vec<Value>>,
{
    let rendered = rows.map(render_row).collect::<Vec<_>>();
    if rendered.is_empty() {
        return String::new();
    }
    format!(
        "INSERT INTO {} ({}) VALUES\n{};\n",
        table,
        columns,
        rendered.join(",\n")
    )
}

fn placeholder_digest(clean_name: &str, seed: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(clean_name.as_bytes());
    hasher.update(seed.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn user_values(u: &User, seed: u64) -> Vec<Value> {
    vec![
        num(u.user_id),
        text(&u.username),
        text(&u.username_clean),
        text(&placeholder_digest(&u.username_clean, seed)),
        num(u.group_id),
        text(&u.user_permissions),
        text(&u.user_sig),
        text(&u.user_sig_bbcode_uid),
        text(&u.user_sig_bbcode_bitfield),
    ]
}

fn forum_values(f: &Forum) -> Vec<Value> {
    vec![
        num(f.forum_id),
        num(f.parent_id),
        num(f.left_id),
        num(f.right_id),
        text(&f.forum_name),
        num(f.forum_type),
        text(&f.forum_parents),
        text(&f.forum_desc),
        text(&f.forum_rules),
        num(f.forum_flags),
        num(f.forum_last_post_id),
        num(f.forum_last_poster_id),
        text(&f.forum_last_poster_name),
        text(&f.forum_last_post_subject),
        Value::Num(f.forum_last_post_time),
        num(f.forum_posts_approved),
        num(f.forum_topics_approved),
    ]
}

fn topic_values(t: &Topic) -> Vec<Value> {
    vec![
        num(t.topic_id),
        num(t.topic_type),
        num(t.forum_id),
        text(&t.topic_title),
        num(t.topic_status),
        num(t.topic_visibility),
        Value::Num(t.topic_time),
        num(t.topic_first_post_id),
        text(&t.topic_first_poster_name),
        num(t.topic_poster),
        num(t.topic_last_post_id),
        num(t.topic_last_poster_id),
        text(&t.topic_last_poster_name),
        text(&t.topic_last_post_subject),
        Value::Num(t.topic_last_post_time),
        num(t.topic_posts_approved),
    ]
}

fn post_values(p: &Post) -> Vec<Value> {
    vec![
        num(p.post_id),
        num(p.topic_id),
        num(p.forum_id),
        num(p.poster_id),
        num(p.post_visibility),
        Value::Num(p.post_time),
        text(&p.post_username),
        Value::Num(p.post_edit_time),
        num(p.post_edit_count),
        text(&p.post_edit_user),
        text(&p.post_subject),
        text(&p.post_text),
        text(&p.bbcode_uid),
        text(&p.bbcode_bitfield),
        text(&p.post_edit_reason),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Forum, Post, Topic, User};

    fn sample_rows() -> RowSets {
        let mut rows = RowSets::default();
        rows.users.push(User {
            user_id: 1,
            username: "O'Brien".into(),
            username_clean: "o'brien".into(),
            user_password: "12345678".into(),
            group_id: 2,
            user_permissions: String::new(),
            user_sig: "[i:aa]sig[/i:aa]".into(),
            user_sig_bbcode_uid: "aa".into(),
            user_sig_bbcode_bitfield: "IA==".into(),
        });
        rows.forums.push(Forum::new(1, 0, 1, 2, "General".into(), true));
        rows.topics.push(Topic::new(1, 1, "Hi".into(), false, false));
        for post_id in 1..=5 {
            rows.posts.push(Post {
                post_id,
                topic_id: 1,
                forum_id: 1,
                poster_id: 1,
                post_visibility: 1,
                post_time: 1000 + post_id as u64,
                post_username: "O'Brien".into(),
                post_edit_time: 0,
                post_edit_count: 0,
                post_edit_user: String::new(),
                post_subject: "Hi".into(),
                post_text: "body".into(),
                bbcode_uid: "aa".into(),
                bbcode_bitfield: String::new(),
                post_edit_reason: String::new(),
            });
        }
        rows
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let rows = sample_rows();
        let sql = SqlWriter::new(&rows, "phpbb_", 7, 50).users_sql();
        assert!(sql.contains("'O''Brien'"));
        assert!(sql.contains("'o''brien'"));
    }

    #[test]
    fn numeric_fields_are_unquoted() {
        let rows = sample_rows();
        let sql = SqlWriter::new(&rows, "phpbb_", 7, 50).forums_sql();
        assert!(sql.starts_with("INSERT INTO phpbb_forums ("));
        assert!(sql.contains("(1, 0, 1, 2, 'General', 0,"));
    }

    #[test]
    fn password_column_is_a_seeded_digest() {
        let rows = sample_rows();
        let a = SqlWriter::new(&rows, "phpbb_", 7, 50).users_sql();
        let b = SqlWriter::new(&rows, "phpbb_", 7, 50).users_sql();
        let c = SqlWriter::new(&rows, "phpbb_", 8, 50).users_sql();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // the raw placeholder never reaches the SQL
        assert!(!a.contains("12345678"));
    }

    #[test]
    fn user_group_rows_accompany_users() {
        let rows = sample_rows();
        let sql = SqlWriter::new(&rows, "phpbb_", 7, 50).users_sql();
        assert!(sql.contains("INSERT INTO phpbb_user_group (group_id, user_id, user_pending)"));
        assert!(sql.contains("(2, 1, 0)"));
    }

    #[test]
    fn posts_are_chunked_by_configured_size() {
        let rows = sample_rows();
        let sql = SqlWriter::new(&rows, "phpbb_", 7, 2).posts_sql();
        let statements = sql.matches("INSERT INTO phpbb_posts").count();
        assert_eq!(statements, 3); // 2 + 2 + 1
    }

    #[test]
    fn permissions_cross_product_covers_every_forum() {
        let mut rows = sample_rows();
        rows.forums.push(Forum::new(2, 1, 1, 2, "Child".into(), false));
        let sql = SqlWriter::new(&rows, "phpbb_", 7, 50).permissions_sql();
        // every grant row starts on its own line
        let grant_rows = sql.matches("\n(").count();
        assert_eq!(grant_rows, 2 * DEFAULT_PERMISSIONS.len());
        assert!(sql.contains("(1, 2, 0, 17, 0)"));
    }

    #[test]
    fn passwords_export_pairs_names_with_placeholders() {
        let rows = sample_rows();
        let out = SqlWriter::new(&rows, "phpbb_", 7, 50).user_passwords();
        assert_eq!(out, "O'Brien,12345678");
    }

    #[test]
    fn empty_row_sets_produce_no_statements() {
        let rows = RowSets::default();
        let writer = SqlWriter::new(&rows, "phpbb_", 7, 50);
        assert_eq!(writer.users_sql(), "");
        assert_eq!(writer.structure_sql(), "");
    }

    #[test]
    fn custom_prefix_is_applied() {
        let rows = sample_rows();
        let sql = SqlWriter::new(&rows, "board_", 7, 50).topics_sql();
        assert!(sql.starts_with("INSERT INTO board_topics"));
    }
}
