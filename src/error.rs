use thiserror::Error;

use crate::client::FetchError;

/// Entity kinds that carry a creation ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Post,
    Topic,
    Forum,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::User => write!(f, "user"),
            Entity::Post => write!(f, "post"),
            Entity::Topic => write!(f, "topic"),
            Entity::Forum => write!(f, "forum"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Soft stop: a per-entity ceiling was reached. The row that tripped the
    /// ceiling has already been created and is preserved. Caught only at the
    /// outermost crawl scope.
    #[error("maximum {entity} count reached at id {id}")]
    MaxReached { entity: Entity, id: u32 },

    /// Internal to pagination loops: the listing wrapped to already-seen
    /// content. Must never escape the owning loop.
    #[error("paginated listing returned no new content")]
    DuplicatePage,

    /// An expected structural element is missing from a fetched page; the
    /// upstream layout no longer matches and the run cannot continue.
    #[error("malformed page: {0}")]
    MalformedPage(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Soft conditions halt the enclosing scope gracefully; anything else
    /// aborts the run.
    pub fn is_max_reached(&self) -> bool {
        matches!(self, MigrationError::MaxReached { .. })
    }
}

/// Per-entity creation ceilings. `None` means the ceiling never trips.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub max_users: Option<u32>,
    pub max_posts: Option<u32>,
    pub max_topics: Option<u32>,
    pub max_forums: Option<u32>,
}

impl Limits {
    fn ceiling(&self, entity: Entity) -> Option<u32> {
        match entity {
            Entity::User => self.max_users,
            Entity::Post => self.max_posts,
            Entity::Topic => self.max_topics,
            Entity::Forum => self.max_forums,
        }
    }

    /// Called after every creation with the new running count. Trips exactly
    /// when the count meets the ceiling, carrying the id of the row that was
    /// just created.
    pub fn check(&self, entity: Entity, count: u32, id: u32) -> Result<(), MigrationError> {
        match self.ceiling(entity) {
            Some(max) if count >= max => Err(MigrationError::MaxReached { entity, id }),
            _ => Ok(()),
        }
    }
}
