use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use forum_migrate::cli::{Cli, Commands};
use forum_migrate::client::ForumClient;
use forum_migrate::config::MigrationConfig;
use forum_migrate::error::MigrationError;
use forum_migrate::logging::init_logging;
use forum_migrate::migrator::Migrator;
use forum_migrate::models::RowSets;
use forum_migrate::sql::SqlWriter;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// A zero seed means "pick one": derive it from the clock so repeated runs
/// do not share placeholder passwords.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

fn write_outputs(
    out_dir: &str,
    rows: &RowSets,
    prefix: &str,
    seed: u64,
    post_chunk_size: usize,
) -> Result<(), MainError> {
    let dir = Path::new(out_dir);
    std::fs::create_dir_all(dir)?;

    let writer = SqlWriter::new(rows, prefix, seed, post_chunk_size);
    std::fs::write(dir.join("rows.json"), serde_json::to_string_pretty(rows)?)?;
    std::fs::write(dir.join("users.sql"), writer.users_sql())?;
    std::fs::write(dir.join("structure.sql"), writer.structure_sql())?;
    std::fs::write(dir.join("passwords.csv"), writer.user_passwords())?;

    info!(
        users = rows.users.len(),
        forums = rows.forums.len(),
        topics = rows.topics.len(),
        posts = rows.posts.len(),
        out_dir,
        "wrote migration outputs"
    );
    Ok(())
}

async fn run_migrate_command(
    config: MigrationConfig,
    out_dir: String,
    username: Option<String>,
    password: Option<String>,
    user_agent: String,
    timeout: u64,
) -> Result<(), MainError> {
    let client = ForumClient::new(&user_agent, timeout, config.request_delay_ms);

    if let (Some(user), Some(pass)) = (username.as_deref(), password.as_deref()) {
        client
            .login(&config.from, user, pass)
            .await
            .map_err(MigrationError::from)?;
    }

    let prefix = config.prefix.clone();
    let seed = config.seed;
    let post_chunk_size = config.post_chunk_size;

    let migrator = Migrator::new(config, Arc::new(client));
    let rows = migrator.run().await?;

    write_outputs(&out_dir, &rows, &prefix, seed, post_chunk_size)
}

fn run_sql_command(
    rows_path: String,
    out_dir: String,
    prefix: String,
    seed: u64,
    post_chunk_size: usize,
) -> Result<(), MainError> {
    let raw = std::fs::read_to_string(&rows_path)?;
    let rows: RowSets = serde_json::from_str(&raw)?;
    write_outputs(&out_dir, &rows, &prefix, seed, post_chunk_size)
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Migrate {
            from,
            to,
            forum_ids,
            out_dir,
            username,
            password,
            prefix,
            seed,
            start_user_id,
            start_topic_id,
            start_post_id,
            start_forum_id,
            root_forum_id,
            max_users,
            max_posts,
            max_topics,
            max_forums,
            quote_mode,
            force_bitfield,
            temp_usernames,
            request_delay_ms,
            post_chunk_size,
            user_agent,
            timeout,
        } => {
            init_logging(Some(Path::new(&out_dir).join("logs")))
                .map_err(|e| MainError::Logging(e.to_string()))?;

            let config = MigrationConfig {
                from,
                to,
                forum_ids,
                prefix,
                seed: resolve_seed(seed),
                start_user_id,
                start_topic_id,
                start_post_id,
                start_forum_id,
                root_forum_id,
                max_users,
                max_posts,
                max_topics,
                max_forums,
                quote_mode,
                force_bitfield,
                temp_usernames,
                request_delay_ms,
                post_chunk_size,
            };
            info!(from = %config.from, forums = ?config.forum_ids, "starting migration");

            run_migrate_command(config, out_dir, username, password, user_agent, timeout).await?;
        }

        Commands::Sql {
            rows,
            out_dir,
            prefix,
            seed,
            post_chunk_size,
        } => {
            init_logging(None::<&Path>).map_err(|e| MainError::Logging(e.to_string()))?;
            run_sql_command(rows, out_dir, prefix, seed, post_chunk_size)?;
        }
    }

    Ok(())
}
