//! Extraction of post data from rendered board pages.
//!
//! A post listing page renders each post inside `div.post`; the author line,
//! edit notice, and body live in well-known child elements. The quote page
//! (`posting.php?mode=quote`) exposes the author's original markup inside a
//! textarea, wrapped in one outer quote tag.

use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use tracing::warn;

use crate::bbcode::{BbcodeParser, ParsedBbcode};
use crate::error::MigrationError;

/// Marker the board renders when a quoted post no longer exists.
const INFORMATION_MARKER: &str = "<h2>Information</h2>";

/// Accepted renderings of the board's date strings.
const DATE_FORMATS: &[&str] = &[
    "%a %b %d, %Y %I:%M %p",
    "%B %d, %Y, %H:%M",
    "%d %b %Y, %H:%M",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PostInfo {
    /// The post's id on the legacy board.
    pub id: u32,
    pub user: String,
    pub timestamp: u64,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostEdits {
    pub user: String,
    pub times: u32,
    pub timestamp: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostBody {
    /// Inner HTML of the rendered body, kept for diagnostics.
    pub htmlbody: String,
    pub parsed: ParsedBbcode,
}

/// Everything extractable from one rendered post fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPost {
    pub info: PostInfo,
    pub edits: PostEdits,
    pub body: PostBody,
}

pub struct PostParser {
    bbcode: BbcodeParser,
}

impl PostParser {
    pub fn new(bbcode: BbcodeParser) -> Self {
        Self { bbcode }
    }

    /// The underlying transcoder, shared with signature generation so every
    /// body in the run draws salts from one seeded stream.
    pub fn bbcode_mut(&mut self) -> &mut BbcodeParser {
        &mut self.bbcode
    }

    /// Parse one rendered post fragment (the inner HTML of a `div.post`
    /// element, or a page containing one).
    pub fn parse_string(&mut self, post_html: &str) -> Result<ParsedPost, MigrationError> {
        let doc = Html::parse_fragment(post_html);
        let post_sel = selector("div.post");
        let root = match doc.select(&post_sel).next() {
            Some(el) => el,
            // Callers hand us the inner HTML of div.post as often as the
            // wrapped element itself; retry against the fragment root.
            None => doc.root_element(),
        };

        let info = self.parse_info(&doc, root)?;
        let edits = self.parse_edits(root);
        let body = self.parse_body(root)?;
        Ok(ParsedPost { info, edits, body })
    }

    /// Extract and transcode the original markup from a quote page. Returns
    /// `None` when the page carries the information marker, i.e. the post is
    /// gone and the caller must fall back to the rendered body.
    pub fn parse_quote_page(&mut self, page: &str) -> Option<PostBody> {
        if page.contains(INFORMATION_MARKER) {
            return None;
        }
        let doc = Html::parse_document(page);
        let textarea = selector("textarea");
        let raw = doc
            .select(&textarea)
            .next()
            .map(|el| el.text().collect::<String>())?;
        let body = unwrap_quote(&raw);
        Some(PostBody {
            htmlbody: body.to_string(),
            parsed: self.bbcode.parse_bbcode(body),
        })
    }

    fn parse_info(
        &self,
        doc: &Html,
        root: scraper::ElementRef<'_>,
    ) -> Result<PostInfo, MigrationError> {
        let id = root
            .value()
            .attr("id")
            .and_then(|raw| raw.trim_start_matches('p').parse::<u32>().ok())
            .or_else(|| {
                let sel = selector("div.post");
                doc.select(&sel)
                    .next()
                    .and_then(|el| el.value().attr("id"))
                    .and_then(|raw| raw.trim_start_matches('p').parse::<u32>().ok())
            })
            .ok_or_else(|| MigrationError::MalformedPage("post id attribute".into()))?;

        let author_sel = selector(".author");
        let author_line = root
            .select(&author_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .ok_or_else(|| MigrationError::MalformedPage("post author line".into()))?;

        // "Post by username » Mon Apr 13, 2020 3:03 am"
        let (by, date) = author_line
            .split_once('»')
            .ok_or_else(|| MigrationError::MalformedPage("author separator".into()))?;
        let user = by
            .trim()
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .to_string();
        let timestamp = parse_date(date.trim());

        let subject_sel = selector(&format!(r##"a[href="#p{}"]"##, id));
        let subject = root
            .select(&subject_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        Ok(PostInfo {
            id,
            user,
            timestamp,
            subject,
        })
    }

    /// The edit notice reads "Last edited by name on <date>, edited N times
    /// in total. Reason: ...". All fields default to zero/empty when absent.
    fn parse_edits(&self, root: scraper::ElementRef<'_>) -> PostEdits {
        let notice_sel = selector("div.notice");
        let notice = match root.select(&notice_sel).next() {
            Some(el) => el,
            None => {
                return PostEdits {
                    user: String::new(),
                    times: 0,
                    timestamp: 0,
                    reason: String::new(),
                }
            }
        };
        let text = notice.text().collect::<String>();

        let link_sel = selector("a");
        let user = notice
            .select(&link_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        let timestamp = text
            .split_once(" on ")
            .and_then(|(_, rest)| rest.split(", edited").next())
            .map(|date| parse_date(date.trim()))
            .unwrap_or(0);

        let times = text
            .split_once(", edited ")
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        let reason = text
            .split_once('.')
            .map(|(_, rest)| {
                rest.trim()
                    .split_once(char::is_whitespace)
                    .map(|(_, r)| r.trim().to_string())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        PostEdits {
            user,
            times,
            timestamp,
            reason,
        }
    }

    fn parse_body(&mut self, root: scraper::ElementRef<'_>) -> Result<PostBody, MigrationError> {
        let content_sel = selector("div.content");
        let htmlbody = root
            .select(&content_sel)
            .next()
            .map(|el| el.inner_html())
            .ok_or_else(|| MigrationError::MalformedPage("post content".into()))?;
        let parsed = self.bbcode.parse(&htmlbody);
        Ok(PostBody { htmlbody, parsed })
    }
}

/// Drop the wrapping quote tag the quote page adds around the original
/// markup: everything through the first `]`, and the final closing tag.
fn unwrap_quote(textarea: &str) -> &str {
    let inner = match textarea.split_once(']') {
        Some((_, rest)) => rest,
        None => textarea,
    };
    match inner.rfind("[/quote]") {
        Some(pos) => inner[..pos].trim_matches('\n'),
        None => inner.trim_matches('\n'),
    }
}

fn parse_date(text: &str) -> u64 {
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return dt.and_utc().timestamp().max(0) as u64;
        }
    }
    warn!(date = text, "unparseable post date, storing epoch");
    0
}

fn selector(css: &str) -> Selector {
    // Selectors here are either literals or built from a parsed numeric id
    Selector::parse(css).unwrap_or_else(|_| panic!("invalid selector: {}", css))
}
