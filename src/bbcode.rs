//! Content transcoder: rendered HTML (or raw bracketed markup) into the
//! salted storage form plus a feature bitfield.
//!
//! The destination board stores bodies with every recognized tag suffixed by
//! a per-post salt (`[b:1a2b3c4d]...[/b:1a2b3c4d]`) and a bitfield naming
//! which tag types occur, so its renderer can skip rules that cannot apply.

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bitfield;
use crate::html2bb::html_to_bbcode;

/// Highest code in the default tag table.
pub const MAX_TAG_CODE: u32 = 17;

const UID_LEN: usize = 8;
const UID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Tag name -> bbcode id, matching the destination's stock bbcode table plus
/// the extended tags boards commonly add.
fn default_tags() -> HashMap<String, u32> {
    [
        ("quote", 0),
        ("b", 1),
        ("i", 2),
        ("url", 3),
        ("img", 4),
        ("size", 5),
        ("color", 6),
        ("u", 7),
        ("code", 8),
        ("list", 9),
        ("email", 10),
        ("flash", 11),
        ("attachment", 12),
        ("s", 13),
        ("center", 14),
        ("spoiler", 15),
        ("font", 16),
        ("youtube", 17),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// One transcoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBbcode {
    /// Per-post salt appended to every recognized tag.
    pub uid: String,
    /// Salted markup, the form the destination stores.
    pub uidbody: String,
    /// Unsalted intermediate markup.
    pub bbcbody: String,
    /// Encoded set of opening-tag codes observed in the body.
    pub bitfield: String,
}

pub struct BbcodeParser {
    codes: HashMap<String, u32>,
    force_all: bool,
    rng: StdRng,
}

impl BbcodeParser {
    pub fn new(seed: u64) -> Self {
        Self::with_codes(HashMap::new(), false, seed)
    }

    /// `extra` entries extend or override the stock table, mirroring a
    /// board-specific bbcode configuration. `force_all` ignores the observed
    /// codes and claims every known tag in the bitfield.
    pub fn with_codes(extra: HashMap<String, u32>, force_all: bool, seed: u64) -> Self {
        let mut codes = default_tags();
        codes.extend(extra);
        Self {
            codes,
            force_all,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Transcode a rendered HTML fragment.
    pub fn parse(&mut self, html_body: &str) -> ParsedBbcode {
        let bbcbody = html_to_bbcode(html_body);
        self.finish(bbcbody)
    }

    /// Transcode markup that is already in bracketed form (the quote-page
    /// path hands us the author's original source).
    pub fn parse_bbcode(&mut self, raw: &str) -> ParsedBbcode {
        self.finish(raw.to_string())
    }

    fn finish(&mut self, bbcbody: String) -> ParsedBbcode {
        let uid = self.gen_uid();
        let (uidbody, observed) = self.add_tag_uids(&bbcbody, &uid);
        let bitfield = if self.force_all {
            let max = self.codes.values().copied().max().unwrap_or(MAX_TAG_CODE);
            bitfield::encode_all(max)
        } else {
            bitfield::encode(&observed)
        };
        ParsedBbcode {
            uid,
            uidbody,
            bbcbody,
            bitfield,
        }
    }

    fn gen_uid(&mut self) -> String {
        (0..UID_LEN)
            .map(|_| UID_CHARSET[self.rng.gen_range(0..UID_CHARSET.len())] as char)
            .collect()
    }

    /// Walk the `]`-delimited fragments; any fragment ending in a recognized
    /// opening or closing tag token gets the salt appended. Opening tokens
    /// record their code. Both `[tag` and `[tag=value` count as openings of
    /// `tag` — the match is on the name before the `=`, never the full token.
    fn add_tag_uids(&self, body: &str, uid: &str) -> (String, Vec<u32>) {
        let mut observed = BTreeSet::new();
        let salted = body
            .split(']')
            .map(|fragment| {
                let token = match fragment.rsplit('[').next() {
                    Some(t) if fragment.contains('[') => t,
                    _ => return fragment.to_string(),
                };
                match self.match_token(token) {
                    Some((code, true)) => {
                        observed.insert(code);
                        format!("{}:{}", fragment, uid)
                    }
                    Some((_, false)) => format!("{}:{}", fragment, uid),
                    None => fragment.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("]");
        (salted, observed.into_iter().collect())
    }

    /// Returns the tag code and whether the token opens (true) or closes
    /// (false) the tag.
    fn match_token(&self, token: &str) -> Option<(u32, bool)> {
        if let Some(name) = token.strip_prefix('/') {
            return self.codes.get(name).map(|&c| (c, false));
        }
        if let Some(&code) = self.codes.get(token) {
            return Some((code, true));
        }
        let name = token.split_once('=').map(|(n, _)| n)?;
        self.codes.get(name).map(|&c| (c, true))
    }
}
