//! Migration orchestrator: drives the crawl, assigns identifiers, and folds
//! post data up into topic and forum aggregates.
//!
//! The forum tree is walked with an explicit work-list instead of recursion:
//! each entry carries the old forum reference plus the destination parent and
//! nested-set bounds, so deep hierarchies cannot grow the call stack and the
//! left/right bookkeeping is an ordinary, testable computation.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures_util::future::join_all;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::bbcode::BbcodeParser;
use crate::client::PageFetcher;
use crate::config::{MigrationConfig, Paging};
use crate::error::{Entity, Limits, MigrationError};
use crate::models::{Forum, Post, RowSets, Topic};
use crate::post_parser::PostParser;
use crate::users::UserRegistry;

/// One unit of forum work: where it lives on the legacy board and where it
/// lands in the destination tree.
#[derive(Debug, Clone)]
struct ForumJob {
    old_id: u32,
    parent_id: u32,
    left_id: u32,
    right_id: u32,
    is_category: bool,
}

/// A topic entry scraped from a forum listing page.
#[derive(Debug, Clone)]
struct TopicEntry {
    old_id: u32,
    title: String,
    sticky: bool,
    locked: bool,
}

/// Everything extracted from one listing page.
struct ForumListing {
    name: String,
    topics: Vec<TopicEntry>,
    /// (old forum id, is_category), first page only.
    subforums: Vec<(u32, bool)>,
}

pub struct Migrator {
    config: MigrationConfig,
    client: Arc<dyn PageFetcher>,
    parser: PostParser,
    users: UserRegistry,
    limits: Limits,
    forums: Vec<Forum>,
    topics: Vec<Topic>,
    posts: Vec<Post>,
    /// Old forum ids already crawled; guards against cyclic subforum links.
    crawled_forums: HashSet<u32>,
}

impl Migrator {
    pub fn new(config: MigrationConfig, client: Arc<dyn PageFetcher>) -> Self {
        let limits = config.limits();
        let parser = PostParser::new(BbcodeParser::with_codes(
            Default::default(),
            config.force_bitfield,
            config.seed,
        ));
        let users = UserRegistry::new(
            config.start_user_id,
            config.seed,
            config.temp_usernames,
            limits,
        );
        Self {
            config,
            client,
            parser,
            users,
            limits,
            forums: Vec::new(),
            topics: Vec::new(),
            posts: Vec::new(),
            crawled_forums: HashSet::new(),
        }
    }

    /// Crawl every configured top-level forum and return the collected row
    /// sets. A max-reached condition is an expected stopping point: it is
    /// caught here, and only here, preserving all work done so far. Any other
    /// error aborts the run.
    pub async fn run(mut self) -> Result<RowSets, MigrationError> {
        let mut queue: VecDeque<ForumJob> = self
            .config
            .forum_ids
            .iter()
            .enumerate()
            .map(|(i, &old_id)| ForumJob {
                old_id,
                parent_id: self.config.root_forum_id,
                left_id: self.config.start_forum_id + i as u32,
                right_id: self.config.start_forum_id + i as u32 + 1,
                is_category: true,
            })
            .collect();

        while let Some(job) = queue.pop_front() {
            if !self.crawled_forums.insert(job.old_id) {
                debug!(old_id = job.old_id, "forum already crawled, skipping");
                continue;
            }
            if let Err(e) = self.crawl_forum(job, &mut queue).await {
                if e.is_max_reached() {
                    info!(%e, "migration ceiling reached, stopping crawl");
                    break;
                }
                return Err(e);
            }
        }

        info!(
            users = self.users.len(),
            forums = self.forums.len(),
            topics = self.topics.len(),
            posts = self.posts.len(),
            "crawl finished"
        );
        Ok(self.into_rows())
    }

    fn into_rows(self) -> RowSets {
        RowSets {
            users: self.users.into_rows(),
            forums: self.forums,
            topics: self.topics,
            posts: self.posts,
        }
    }

    /// Process one forum node: create its row, walk its paginated topic
    /// listing, enqueue its subforums, then finalize aggregates from the
    /// topics created underneath it.
    async fn crawl_forum(
        &mut self,
        job: ForumJob,
        queue: &mut VecDeque<ForumJob>,
    ) -> Result<(), MigrationError> {
        let new_id = self.config.start_forum_id + self.forums.len() as u32;
        let forum_idx = self.forums.len();
        let topic_start = self.topics.len();

        let mut start = 0;
        let page = self.client.get(&self.forum_url(job.old_id, start)).await?;
        let listing = parse_forum_listing(&page.content)?;
        info!(forum = %listing.name, old_id = job.old_id, new_id, "crawling forum");

        self.forums.push(Forum::new(
            new_id,
            job.parent_id,
            job.left_id,
            job.right_id,
            listing.name.clone(),
            job.is_category,
        ));

        let mut seen_topics: HashSet<u32> = HashSet::new();
        let mut entries = listing.topics;
        loop {
            let page_count = entries.len();
            let fresh: Vec<TopicEntry> = entries
                .into_iter()
                .filter(|e| seen_topics.insert(e.old_id))
                .collect();
            // A repeated topic id means the pagination wrapped; stop fetching
            // pages for this forum after handling what is genuinely new.
            let wrapped = fresh.len() < page_count;

            if !fresh.is_empty() {
                // Fire all first-page fetches for this listing page, await
                // them together, then fold the results in serially.
                let fetches: Vec<_> = fresh
                    .iter()
                    .map(|entry| {
                        let url = self.topic_url(job.old_id, entry.old_id, 0);
                        let client = Arc::clone(&self.client);
                        async move { client.get(&url).await }
                    })
                    .collect();
                let pages = join_all(fetches).await;
                for (entry, page) in fresh.into_iter().zip(pages) {
                    let page = page?;
                    self.create_topic(job.old_id, new_id, entry, page.content)
                        .await?;
                }
            }

            if wrapped {
                debug!(old_id = job.old_id, "forum listing wrapped, ending pagination");
                break;
            }
            if page_count < Paging::TOPICS_PER_PAGE {
                break;
            }
            start += Paging::TOPICS_PER_PAGE;
            let page = self.client.get(&self.forum_url(job.old_id, start)).await?;
            entries = parse_forum_listing(&page.content)?.topics;
        }

        for (i, &(old_id, is_category)) in listing.subforums.iter().enumerate() {
            queue.push_back(ForumJob {
                old_id,
                parent_id: new_id,
                left_id: job.left_id + i as u32,
                right_id: job.left_id + i as u32 + 1,
                is_category,
            });
        }

        self.finalize_forum(forum_idx, topic_start);
        self.limits
            .check(Entity::Forum, self.forums.len() as u32, new_id)?;
        Ok(())
    }

    /// Create one topic and all of its posts. Aggregates are computed on
    /// every terminal path, including early exits via the post ceiling.
    async fn create_topic(
        &mut self,
        old_fid: u32,
        new_fid: u32,
        entry: TopicEntry,
        first_page: String,
    ) -> Result<(), MigrationError> {
        let topic_id = self.config.start_topic_id + self.topics.len() as u32;
        let topic_idx = self.topics.len();
        let post_start = self.posts.len();
        debug!(topic_id, title = %entry.title, "creating topic");
        self.topics.push(Topic::new(
            topic_id,
            new_fid,
            entry.title,
            entry.sticky,
            entry.locked,
        ));

        let outcome = self
            .fill_topic(old_fid, entry.old_id, topic_id, new_fid, first_page)
            .await;
        self.finalize_topic(topic_idx, post_start);
        outcome?;

        self.limits
            .check(Entity::Topic, self.topics.len() as u32, topic_id)?;
        Ok(())
    }

    /// Walk the topic's paginated post listing, appending a post per fresh
    /// raw body. The duplicate-page condition ends this loop and never
    /// escapes it.
    async fn fill_topic(
        &mut self,
        old_fid: u32,
        old_tid: u32,
        topic_id: u32,
        new_fid: u32,
        first_page: String,
    ) -> Result<(), MigrationError> {
        let mut seen_bodies: HashSet<String> = HashSet::new();
        let mut start = 0;
        let mut content = first_page;
        loop {
            let (page_count, fresh) = match fresh_post_bodies(&content, &mut seen_bodies) {
                Ok(scan) => scan,
                Err(MigrationError::DuplicatePage) => {
                    debug!(old_tid, "topic listing wrapped, ending pagination");
                    break;
                }
                Err(e) => return Err(e),
            };
            if page_count == 0 {
                break;
            }
            for body in fresh {
                self.create_post(topic_id, new_fid, old_fid, &body).await?;
            }
            if page_count < Paging::POSTS_PER_PAGE {
                break;
            }
            start += Paging::POSTS_PER_PAGE;
            content = self
                .client
                .get(&self.topic_url(old_fid, old_tid, start))
                .await?
                .content;
        }
        Ok(())
    }

    /// Transcode one raw post body into a row. Posts are immutable once
    /// appended and their ids increase strictly in creation order.
    async fn create_post(
        &mut self,
        topic_id: u32,
        forum_id: u32,
        old_fid: u32,
        body_html: &str,
    ) -> Result<(), MigrationError> {
        let mut parsed = self.parser.parse_string(body_html)?;

        if self.config.quote_mode {
            let url = format!(
                "{}posting.php?mode=quote&f={}&p={}",
                self.config.from, old_fid, parsed.info.id
            );
            let quote_page = self.client.get(&url).await?;
            // A missing post renders the information marker; keep the
            // rendered-body transcoding in that case.
            if let Some(body) = self.parser.parse_quote_page(&quote_page.content) {
                parsed.body = body;
            }
        }

        let poster_id = self
            .users
            .resolve_or_create(&parsed.info.user, self.parser.bbcode_mut())?;

        let post_id = self.config.start_post_id + self.posts.len() as u32;
        self.posts.push(Post {
            post_id,
            topic_id,
            forum_id,
            poster_id,
            post_visibility: 1,
            post_time: parsed.info.timestamp,
            post_username: parsed.info.user,
            post_edit_time: parsed.edits.timestamp,
            post_edit_count: parsed.edits.times,
            post_edit_user: parsed.edits.user,
            post_subject: parsed.info.subject,
            post_text: parsed.body.parsed.uidbody,
            bbcode_uid: parsed.body.parsed.uid,
            bbcode_bitfield: parsed.body.parsed.bitfield,
            post_edit_reason: parsed.edits.reason,
        });
        self.limits
            .check(Entity::Post, self.posts.len() as u32, post_id)?;
        Ok(())
    }

    /// Roll the topic's own posts up: earliest post is "first", the greatest
    /// post_time is "last". An empty topic falls back to the last known post
    /// of the run rather than failing the reduction.
    fn finalize_topic(&mut self, topic_idx: usize, post_start: usize) {
        let own_posts = &self.posts[post_start..];
        let (first, last) = match (
            own_posts.iter().min_by_key(|p| p.post_time),
            own_posts.iter().max_by_key(|p| p.post_time),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ => match self.posts.last() {
                Some(fallback) => (fallback, fallback),
                None => return,
            },
        };
        let topic = &mut self.topics[topic_idx];
        topic.topic_time = first.post_time;
        topic.topic_first_post_id = first.post_id;
        topic.topic_first_poster_name = first.post_username.clone();
        topic.topic_poster = first.poster_id;
        topic.topic_last_post_id = last.post_id;
        topic.topic_last_poster_id = last.poster_id;
        topic.topic_last_poster_name = last.post_username.clone();
        topic.topic_last_post_subject = last.post_subject.clone();
        topic.topic_last_post_time = last.post_time;
        topic.topic_posts_approved = own_posts.len() as u32;
    }

    /// Roll this forum's topics up: the topic with the most recent last post
    /// wins the last-post fields, counts are sums. A forum with no topics
    /// (a bare category) borrows the last known post.
    fn finalize_forum(&mut self, forum_idx: usize, topic_start: usize) {
        let own_topics = &self.topics[topic_start..];
        let forum = &mut self.forums[forum_idx];
        forum.forum_topics_approved = own_topics.len() as u32;
        forum.forum_posts_approved = own_topics.iter().map(|t| t.topic_posts_approved).sum();
        match own_topics.iter().max_by_key(|t| t.topic_last_post_time) {
            Some(best) => {
                forum.forum_last_post_id = best.topic_last_post_id;
                forum.forum_last_poster_id = best.topic_last_poster_id;
                forum.forum_last_poster_name = best.topic_last_poster_name.clone();
                forum.forum_last_post_subject = best.topic_last_post_subject.clone();
                forum.forum_last_post_time = best.topic_last_post_time;
            }
            None => {
                if let Some(last) = self.posts.last() {
                    forum.forum_last_post_id = last.post_id;
                    forum.forum_last_poster_id = last.poster_id;
                    forum.forum_last_poster_name = last.post_username.clone();
                    forum.forum_last_post_subject = last.post_subject.clone();
                    forum.forum_last_post_time = last.post_time;
                }
            }
        }
    }

    fn forum_url(&self, old_id: u32, start: usize) -> String {
        format!(
            "{}viewforum.php?f={}&start={}",
            self.config.from, old_id, start
        )
    }

    fn topic_url(&self, old_fid: u32, old_tid: u32, start: usize) -> String {
        format!(
            "{}viewtopic.php?f={}&t={}&start={}",
            self.config.from, old_fid, old_tid, start
        )
    }

    /// Extract the trailing `=`-delimited numeric token from a query-shaped
    /// reference. Pure; the upstream page guarantees well-formed hrefs.
    pub fn get_id(href: &str) -> Result<u32, MigrationError> {
        if !href.contains('=') {
            return Err(MigrationError::MalformedPage(format!(
                "reference without id: {}",
                href
            )));
        }
        href.rsplit('=')
            .next()
            .and_then(|token| token.trim().parse().ok())
            .ok_or_else(|| {
                MigrationError::MalformedPage(format!("reference without id: {}", href))
            })
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector")
}

/// Pull the forum name, topic entries, and subforum references out of one
/// listing page.
fn parse_forum_listing(html: &str) -> Result<ForumListing, MigrationError> {
    let doc = Html::parse_document(html);

    let name = doc
        .select(&selector("h2"))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut topics = Vec::new();
    for block in doc.select(&selector("div.forumbg")) {
        if has_class(&block, "annoucement") {
            continue;
        }
        for item in block.select(&selector("li")) {
            let title_el = match item.select(&selector("a.topictitle")).next() {
                Some(el) => el,
                None => continue,
            };
            let href = title_el.value().attr("href").unwrap_or_default();
            let old_id = Migrator::get_id(href)?;
            let locked = item
                .select(&selector("dl.icon"))
                .next()
                .and_then(|dl| dl.value().attr("style"))
                .map(|style| style.contains("_locked.gif"))
                .unwrap_or(false);
            topics.push(TopicEntry {
                old_id,
                title: title_el.text().collect::<String>().trim().to_string(),
                sticky: has_class(&item, "sticky"),
                locked,
            });
        }
    }

    let mut subforums = Vec::new();
    for block in doc.select(&selector("div.forabg")) {
        let category_link = block
            .select(&selector("dt a"))
            .next()
            .and_then(|el| el.value().attr("href"));
        match category_link {
            Some(href) => subforums.push((Migrator::get_id(href)?, true)),
            None => {
                for link in block.select(&selector("a.forumtitle")) {
                    let href = link.value().attr("href").unwrap_or_default();
                    subforums.push((Migrator::get_id(href)?, false));
                }
            }
        }
    }

    Ok(ForumListing {
        name,
        topics,
        subforums,
    })
}

fn has_class(el: &scraper::ElementRef<'_>, class: &str) -> bool {
    el.value()
        .attr("class")
        .map(|attr| attr.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// Outer HTML of every post on the page that has not been seen for this
/// topic yet, plus the page's total post count. A non-empty page yielding
/// nothing new is the duplicate-page condition: pagination has wrapped onto
/// already-captured content.
fn fresh_post_bodies(
    page: &str,
    seen: &mut HashSet<String>,
) -> Result<(usize, Vec<String>), MigrationError> {
    let doc = Html::parse_document(page);
    let mut fresh = Vec::new();
    let mut total = 0;
    for el in doc.select(&selector("div.post")) {
        total += 1;
        let body = el.html();
        if seen.insert(body.clone()) {
            fresh.push(body);
        }
    }
    if total > 0 && fresh.is_empty() {
        return Err(MigrationError::DuplicatePage);
    }
    Ok((total, fresh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FetchError, FetchResult};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves canned pages by exact URL; unknown URLs yield an empty page so
    /// exhausted listings terminate naturally.
    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
            Ok(FetchResult {
                content: self.pages.get(url).cloned().unwrap_or_default(),
                status_code: 200,
            })
        }
    }

    fn post_html(id: u32, user: &str, time: &str, subject: &str, body: &str) -> String {
        format!(
            r##"<div id="p{id}" class="post">
  <h3><a href="#p{id}">{subject}</a></h3>
  <p class="author">Post by {user} » {time}</p>
  <div class="content">{body}</div>
</div>"##
        )
    }

    fn topic_page(posts: &[String]) -> String {
        format!("<html><body>{}</body></html>", posts.join("\n"))
    }

    fn forum_page(name: &str, topics: &[(u32, &str)], subforums: &str) -> String {
        let items = topics
            .iter()
            .map(|(id, title)| {
                format!(
                    r##"<li class="row"><dl class="icon"><dt><a class="topictitle" href="./viewtopic.php?f=1&t={id}">{title}</a></dt></dl></li>"##
                )
            })
            .collect::<String>();
        format!(
            "<html><body><h2>{name}</h2>{subforums}<div class=\"forumbg\"><ul>{items}</ul></div></body></html>"
        )
    }

    fn config(forum_ids: Vec<u32>) -> MigrationConfig {
        MigrationConfig {
            from: "https://old.example/".to_string(),
            forum_ids,
            ..MigrationConfig::default()
        }
    }

    fn migrator(pages: HashMap<String, String>, config: MigrationConfig) -> Migrator {
        Migrator::new(config, Arc::new(StubFetcher { pages }))
    }

    fn simple_board() -> HashMap<String, String> {
        let mut pages = HashMap::new();
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=0".to_string(),
            forum_page("General", &[(10, "First topic"), (11, "Second topic")], ""),
        );
        pages.insert(
            "https://old.example/viewtopic.php?f=1&t=10&start=0".to_string(),
            topic_page(&[
                post_html(100, "alice", "Mon Apr 13, 2020 3:10 am", "First topic", "<b>hello</b>"),
                post_html(101, "bob", "Mon Apr 13, 2020 3:30 am", "Re: First topic", "latest"),
                post_html(102, "Alice", "Mon Apr 13, 2020 3:20 am", "Re: First topic", "middle"),
            ]),
        );
        pages.insert(
            "https://old.example/viewtopic.php?f=1&t=11&start=0".to_string(),
            topic_page(&[post_html(
                103,
                "carol",
                "Tue Apr 14, 2020 9:00 am",
                "Second topic",
                "newest post on the forum",
            )]),
        );
        pages
    }

    #[tokio::test]
    async fn aggregates_follow_min_and_max_post_time() {
        let rows = migrator(simple_board(), config(vec![1])).run().await.unwrap();
        let topic = &rows.topics[0];
        // posts at 3:10, 3:30, 3:20 -> first is 3:10, last is 3:30
        assert_eq!(topic.topic_first_poster_name, "alice");
        assert_eq!(topic.topic_last_poster_name, "bob");
        assert_eq!(topic.topic_time, rows.posts[0].post_time);
        assert!(topic.topic_last_post_time > topic.topic_time);
        assert_eq!(topic.topic_posts_approved, 3);
    }

    #[tokio::test]
    async fn forum_rollup_takes_most_recent_topic() {
        let rows = migrator(simple_board(), config(vec![1])).run().await.unwrap();
        let forum = &rows.forums[0];
        // carol's topic has the later last post
        assert_eq!(forum.forum_last_poster_name, "carol");
        assert_eq!(forum.forum_posts_approved, 4);
        assert_eq!(forum.forum_topics_approved, 2);
        assert_eq!(forum.forum_last_post_time, rows.posts.last().unwrap().post_time);
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_gapless() {
        let rows = migrator(simple_board(), config(vec![1])).run().await.unwrap();
        let post_ids: Vec<u32> = rows.posts.iter().map(|p| p.post_id).collect();
        assert_eq!(post_ids, vec![1, 2, 3, 4]);
        let topic_ids: Vec<u32> = rows.topics.iter().map(|t| t.topic_id).collect();
        assert_eq!(topic_ids, vec![1, 2]);
        // alice appears twice with different casing but owns one id
        assert_eq!(rows.users.len(), 3);
        let alice_posts: Vec<u32> = rows
            .posts
            .iter()
            .filter(|p| p.post_username.eq_ignore_ascii_case("alice"))
            .map(|p| p.poster_id)
            .collect();
        assert_eq!(alice_posts, vec![1, 1]);
    }

    #[tokio::test]
    async fn repeated_listing_page_terminates_the_forum() {
        let mut pages = HashMap::new();
        // 35 entries on page one forces a second fetch; page two repeats the
        // same ids, which must end the forum cleanly without duplicates.
        let entries: Vec<(u32, String)> =
            (0..35).map(|i| (100 + i, format!("Topic {}", i))).collect();
        let entries_ref: Vec<(u32, &str)> =
            entries.iter().map(|(i, t)| (*i, t.as_str())).collect();
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=0".to_string(),
            forum_page("Busy", &entries_ref, ""),
        );
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=35".to_string(),
            forum_page("Busy", &entries_ref, ""),
        );
        for (id, _) in &entries {
            pages.insert(
                format!("https://old.example/viewtopic.php?f=1&t={}&start=0", id),
                topic_page(&[post_html(
                    *id * 10,
                    "poster",
                    "Mon Apr 13, 2020 3:03 am",
                    "s",
                    "b",
                )]),
            );
        }
        let rows = migrator(pages, config(vec![1])).run().await.unwrap();
        assert_eq!(rows.topics.len(), 35);
        assert_eq!(rows.posts.len(), 35);
    }

    #[tokio::test]
    async fn repeated_post_page_terminates_the_topic() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=0".to_string(),
            forum_page("General", &[(10, "Long topic")], ""),
        );
        // A full page of 30 posts triggers a second fetch that repeats them.
        let posts: Vec<String> = (0..30)
            .map(|i| {
                post_html(
                    100 + i,
                    "poster",
                    "Mon Apr 13, 2020 3:03 am",
                    "s",
                    "body",
                )
            })
            .collect();
        pages.insert(
            "https://old.example/viewtopic.php?f=1&t=10&start=0".to_string(),
            topic_page(&posts),
        );
        pages.insert(
            "https://old.example/viewtopic.php?f=1&t=10&start=30".to_string(),
            topic_page(&posts),
        );
        let rows = migrator(pages, config(vec![1])).run().await.unwrap();
        assert_eq!(rows.posts.len(), 30);
    }

    #[tokio::test]
    async fn post_ceiling_stops_cleanly_with_exact_count() {
        let mut cfg = config(vec![1]);
        cfg.max_posts = Some(3);
        let rows = migrator(simple_board(), cfg).run().await.unwrap();
        assert_eq!(rows.posts.len(), 3);
        // The tripping topic still aggregated its posts
        assert_eq!(rows.topics[0].topic_posts_approved, 3);
    }

    #[tokio::test]
    async fn subforums_are_discovered_with_nested_set_bounds() {
        let mut pages = simple_board();
        let subforums = r##"<div class="forabg"><ul>
            <li><a class="forumtitle" href="./viewforum.php?f=2">Child A</a></li>
            <li><a class="forumtitle" href="./viewforum.php?f=3">Child B</a></li>
        </ul></div>"##;
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=0".to_string(),
            forum_page("General", &[(10, "First topic"), (11, "Second topic")], subforums),
        );
        pages.insert(
            "https://old.example/viewforum.php?f=2&start=0".to_string(),
            forum_page("Child A", &[], ""),
        );
        pages.insert(
            "https://old.example/viewforum.php?f=3&start=0".to_string(),
            forum_page("Child B", &[], ""),
        );
        let rows = migrator(pages, config(vec![1])).run().await.unwrap();
        assert_eq!(rows.forums.len(), 3);
        let parent = &rows.forums[0];
        let a = &rows.forums[1];
        let b = &rows.forums[2];
        assert_eq!(a.parent_id, parent.forum_id);
        assert_eq!(b.parent_id, parent.forum_id);
        assert_eq!((a.left_id, a.right_id), (parent.left_id, parent.left_id + 1));
        assert_eq!((b.left_id, b.right_id), (parent.left_id + 1, parent.left_id + 2));
        assert_eq!(a.forum_type, 1);
        // An empty subforum borrows the run's last known post for its rollup
        assert_eq!(a.forum_posts_approved, 0);
        assert_eq!(a.forum_last_post_id, rows.posts.last().unwrap().post_id);
    }

    #[tokio::test]
    async fn quote_mode_prefers_original_markup_with_fallback() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://old.example/viewforum.php?f=1&start=0".to_string(),
            forum_page("General", &[(10, "T")], ""),
        );
        pages.insert(
            "https://old.example/viewtopic.php?f=1&t=10&start=0".to_string(),
            topic_page(&[
                post_html(100, "alice", "Mon Apr 13, 2020 3:10 am", "T", "<i>rendered</i>"),
                post_html(101, "bob", "Mon Apr 13, 2020 3:20 am", "Re: T", "<b>rendered two</b>"),
            ]),
        );
        // Post 100 has a quote page with original markup; post 101's quote
        // page reports the post as gone.
        pages.insert(
            "https://old.example/posting.php?mode=quote&f=1&p=100".to_string(),
            "<form><textarea>[quote=alice]original [u]markup[/u][/quote]</textarea></form>"
                .to_string(),
        );
        pages.insert(
            "https://old.example/posting.php?mode=quote&f=1&p=101".to_string(),
            "<h2>Information</h2>".to_string(),
        );
        let mut cfg = config(vec![1]);
        cfg.quote_mode = true;
        let rows = migrator(pages, cfg).run().await.unwrap();
        assert!(rows.posts[0].post_text.contains("[u:"));
        assert!(rows.posts[0].post_text.contains("original"));
        // Fallback path transcodes the rendered body instead
        assert!(rows.posts[1].post_text.contains("[b:"));
        assert!(!rows.posts[1].bbcode_bitfield.is_empty());
    }

    #[test]
    fn get_id_extracts_trailing_token() {
        assert_eq!(Migrator::get_id("./viewtopic.php?f=5&t=123").unwrap(), 123);
        assert_eq!(Migrator::get_id("./viewforum.php?f=7").unwrap(), 7);
        assert!(Migrator::get_id("no-id-here").is_err());
        assert!(Migrator::get_id("f=abc").is_err());
    }
}
