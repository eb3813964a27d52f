use clap::{Parser, Subcommand};

/// CLI entry point so operators can drive a migration from the command line.
#[derive(Parser, Debug)]
#[command(name = "forum-migrate")]
#[command(about = "Crawls a legacy phpBB board into rows and bulk-insert SQL for a new installation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the legacy board and write rows + SQL into the output directory.
    Migrate {
        #[arg(long, help = "Base URL of the legacy board, with trailing slash")]
        from: String,

        #[arg(
            long,
            default_value = "",
            help = "Base URL of the destination installation"
        )]
        to: String,

        #[arg(
            long,
            value_delimiter = ',',
            required = true,
            help = "Comma-separated old ids of the top-level forums to crawl"
        )]
        forum_ids: Vec<u32>,

        #[arg(
            short,
            long,
            default_value = "./out",
            help = "Directory for generated SQL and row dumps"
        )]
        out_dir: String,

        #[arg(long, help = "Board username for an authenticated crawl")]
        username: Option<String>,

        #[arg(long, help = "Board password for an authenticated crawl")]
        password: Option<String>,

        #[arg(long, default_value = "phpbb_", help = "Destination table-name prefix")]
        prefix: String,

        #[arg(
            long,
            default_value_t = 0,
            help = "Seed for password placeholders and body salts (0 = derive from the clock)"
        )]
        seed: u64,

        #[arg(long, default_value_t = 1, help = "First user id to assign")]
        start_user_id: u32,

        #[arg(long, default_value_t = 1, help = "First topic id to assign")]
        start_topic_id: u32,

        #[arg(long, default_value_t = 1, help = "First post id to assign")]
        start_post_id: u32,

        #[arg(long, default_value_t = 1, help = "First forum id to assign")]
        start_forum_id: u32,

        #[arg(
            long,
            default_value_t = 0,
            help = "Parent id given to the crawled top-level forums"
        )]
        root_forum_id: u32,

        #[arg(long, help = "Stop after this many users")]
        max_users: Option<u32>,

        #[arg(long, help = "Stop after this many posts")]
        max_posts: Option<u32>,

        #[arg(long, help = "Stop after this many topics")]
        max_topics: Option<u32>,

        #[arg(long, help = "Stop after this many forums")]
        max_forums: Option<u32>,

        #[arg(
            long,
            help = "Fetch each post's quote page to recover the original markup"
        )]
        quote_mode: bool,

        #[arg(
            long,
            help = "Set every known tag bit in each bitfield instead of the observed set"
        )]
        force_bitfield: bool,

        #[arg(long, help = "Synthesize collision-avoiding usernames")]
        temp_usernames: bool,

        #[arg(
            long,
            default_value_t = 500,
            help = "Pacing delay between requests in milliseconds"
        )]
        request_delay_ms: u64,

        #[arg(
            long,
            default_value_t = 50,
            help = "Maximum rows per post insert statement"
        )]
        post_chunk_size: usize,

        #[arg(
            short,
            long,
            default_value = "forum-migrate/0.3",
            help = "User agent string for requests"
        )]
        user_agent: String,

        #[arg(short, long, default_value_t = 30, help = "Request timeout in seconds")]
        timeout: u64,
    },

    /// Regenerate SQL from a previously written rows.json dump.
    Sql {
        #[arg(short, long, help = "Path to a rows.json produced by migrate")]
        rows: String,

        #[arg(short, long, default_value = "./out", help = "Directory for generated SQL")]
        out_dir: String,

        #[arg(long, default_value = "phpbb_", help = "Destination table-name prefix")]
        prefix: String,

        #[arg(long, default_value_t = 0, help = "Seed used for password placeholders")]
        seed: u64,

        #[arg(
            long,
            default_value_t = 50,
            help = "Maximum rows per post insert statement"
        )]
        post_chunk_size: usize,
    },
}

impl Cli {
    /// Parse CLI arguments so the rest of the program can rely on structured
    /// options. On error, clap prints help and exits.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
