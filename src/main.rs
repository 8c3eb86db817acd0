use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;

use feedstore::config::Config;
use feedstore::db;
use feedstore::Repository;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    // Check for --db flag (store path override)
    let db_path = match args.iter().position(|arg| arg == "--db") {
        Some(index) => args
            .get(index + 1)
            .cloned()
            .context("--db requires a path")?,
        None => config.db_path.clone(),
    };

    // Check for --feeds flag (list migrated feeds)
    let list_feeds = args.iter().any(|arg| arg == "--feeds");

    let path = PathBuf::from(&db_path);
    let version = match db::migrate_path(&path) {
        Ok(version) => version,
        Err(err) if err.is_migration_failure() => {
            eprintln!("The feed database at {db_path} could not be migrated: {err}");
            eprintln!("Move the file aside to let a fresh database be created on the next run.");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err).context(format!("failed to open {db_path}")),
    };
    println!("{db_path} is at schema version {version}");

    if list_feeds {
        let repository = Repository::new(&db_path).await?;
        for (feed, unread) in repository.load_feeds_with_unread_count().await? {
            println!("{:>4} unread  {}  <{}>", unread, feed.display_title(), feed.url);
        }
    }

    Ok(ExitCode::SUCCESS)
}
