//! Identity registry: maps as-scraped author names to stable user rows.
//!
//! Authorship on the legacy board is only a display string, so the same
//! person appears with varying case and spacing. The registry folds those
//! variants onto one clean key and assigns each key a user id exactly once.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::bbcode::BbcodeParser;
use crate::error::{Entity, Limits, MigrationError};
use crate::models::User;

/// Signature attached to every migrated account; runs through the same
/// transcoding pipeline as post bodies.
const SIGNATURE_HTML: &str = "<i>Account migrated from the previous board.</i>";

/// Default group for migrated accounts (registered users).
const DEFAULT_GROUP_ID: u32 = 2;

pub struct UserRegistry {
    by_clean: HashMap<String, usize>,
    users: Vec<User>,
    start_user_id: u32,
    temp_usernames: bool,
    limits: Limits,
    rng: StdRng,
}

impl UserRegistry {
    pub fn new(start_user_id: u32, seed: u64, temp_usernames: bool, limits: Limits) -> Self {
        Self {
            by_clean: HashMap::new(),
            users: Vec::new(),
            start_user_id,
            temp_usernames,
            limits,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Normalized dedup key: trimmed, case-folded, inner whitespace collapsed.
    pub fn clean_username(raw: &str) -> String {
        raw.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Return the user id for `raw`, creating the row on first sighting.
    /// Registration is append-only; an existing record is never touched.
    /// Trips the user ceiling on the registration that meets it.
    pub fn resolve_or_create(
        &mut self,
        raw: &str,
        bbcode: &mut BbcodeParser,
    ) -> Result<u32, MigrationError> {
        let clean = Self::clean_username(raw);
        if let Some(&idx) = self.by_clean.get(&clean) {
            return Ok(self.users[idx].user_id);
        }

        let user_id = self.start_user_id + self.users.len() as u32;
        let username = if self.temp_usernames {
            format!("mig{}_{}", user_id, raw.trim())
        } else {
            raw.trim().to_string()
        };
        let sig = bbcode.parse(SIGNATURE_HTML);
        let user = User {
            user_id,
            username_clean: Self::clean_username(&username),
            username,
            user_password: self.placeholder_password(),
            group_id: DEFAULT_GROUP_ID,
            user_permissions: String::new(),
            user_sig: sig.uidbody,
            user_sig_bbcode_uid: sig.uid,
            user_sig_bbcode_bitfield: sig.bitfield,
        };
        debug!(user_id, username = %user.username, "registered user");
        self.by_clean.insert(clean, self.users.len());
        self.users.push(user);

        self.limits
            .check(Entity::User, self.users.len() as u32, user_id)?;
        Ok(user_id)
    }

    /// Placeholder only; replaced by a digest at the SQL boundary and never a
    /// usable credential.
    fn placeholder_password(&mut self) -> String {
        format!("{:08}", self.rng.gen_range(0..100_000_000u32))
    }

    pub fn get(&self, user_id: u32) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users in registration order.
    pub fn into_rows(self) -> Vec<User> {
        self.users
    }

    pub fn rows(&self) -> &[User] {
        &self.users
    }
}
