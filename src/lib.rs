pub mod bbcode;
pub mod bitfield;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod html2bb;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod post_parser;
pub mod sql;
pub mod users;

// Re-export main types for library usage
pub use bbcode::{BbcodeParser, ParsedBbcode};
pub use client::{FetchError, FetchResult, ForumClient, PageFetcher};
pub use config::MigrationConfig;
pub use error::{Entity, Limits, MigrationError};
pub use migrator::Migrator;
pub use models::{Forum, Post, RowSets, Topic, User};
pub use post_parser::PostParser;
pub use sql::SqlWriter;
pub use users::UserRegistry;
