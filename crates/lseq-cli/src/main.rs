mod config;
mod outline_cmds;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lseq_core::User;
use lseq_db::config::DbConfig;
use lseq_db::pool;

use config::LseqConfig;
use outline_cmds::ShowOptions;

#[derive(Parser)]
#[command(name = "lseq", about = "Relational projection of course outlines")]
struct Cli {
    /// Database URL (overrides LSEQ_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an lseq config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the database
    DbInit,
    /// Replace a course's stored outline with a JSON snapshot
    Replace {
        /// Path to a course outline JSON file
        file: PathBuf,
    },
    /// Print a stored course outline as JSON
    Show {
        /// Course key, e.g. course-v1:edX+DemoX+2020
        course_key: String,
        /// Compute the outline for this user id
        #[arg(long)]
        user_id: Option<i64>,
        /// Username of the user
        #[arg(long, default_value = "anonymous")]
        username: String,
        /// Treat the user as course staff
        #[arg(long, requires = "user_id")]
        staff: bool,
        /// JSON file of per-item start/due dates for the schedule processor
        #[arg(long, requires = "user_id")]
        dates: Option<PathBuf>,
        /// Apply the hide set instead of printing it
        #[arg(long, requires = "user_id")]
        filtered: bool,
    },
    /// List stored courses
    List,
    /// Handle a course-published event using snapshots from a directory
    Publish {
        /// Course key carried by the event
        course_key: String,
        /// Directory holding `<course key>.json` snapshots (':' written as '_')
        #[arg(long)]
        source_dir: PathBuf,
    },
}

/// Execute the `lseq init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `lseq db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `lseq db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = LseqConfig::resolve(cli_db_url);

    println!("Initializing lseq database...");

    let db_pool = pool::bootstrap(&resolved.db_config).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("lseq db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Replace { file } => {
            let resolved = LseqConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = outline_cmds::run_replace(&db_pool, &file).await;
            db_pool.close().await;
            result?;
        }
        Commands::Show {
            course_key,
            user_id,
            username,
            staff,
            dates,
            filtered,
        } => {
            let user = user_id.map(|id| {
                let user = User::new(id, username);
                if staff { user.staff() } else { user }
            });
            let resolved = LseqConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = outline_cmds::run_show(
                &db_pool,
                ShowOptions {
                    course_key,
                    user,
                    dates,
                    filtered,
                },
            )
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::List => {
            let resolved = LseqConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = outline_cmds::run_list(&db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Publish {
            course_key,
            source_dir,
        } => {
            let resolved = LseqConfig::resolve(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = outline_cmds::run_publish(&db_pool, &course_key, source_dir).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
