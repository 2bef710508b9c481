use tracing::{error, info};

use bbs_forum::board::{BoardRegistry, PostRepository};
use bbs_forum::{Actor, Config, Database, Role};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = bbs_forum::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        bbs_forum::logging::init_console_only(&config.logging.level, config.logging.ansi);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("bbs-forum - bulletin board engine");

    let db = match Database::open_with_pool_size(
        &config.database.path,
        config.database.max_connections,
    )
    .await
    {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = log_overview(&db, &config.database.path).await {
        error!("Failed to list boards: {e}");
        std::process::exit(1);
    }

    db.close().await;
}

/// Log every board with its active and stored post counts.
async fn log_overview(db: &Database, path: &str) -> bbs_forum::Result<()> {
    let operator = Actor::player(0, Role::SysOp);
    let boards = BoardRegistry::new(db).summaries(&operator).await?;
    info!("Database ready at {} ({} boards)", path, boards.len());

    let posts = PostRepository::new(db.pool());
    for summary in boards {
        let stored = posts.count_by_board(summary.board.id).await?;
        let hidden = usize::try_from(stored)
            .unwrap_or(0)
            .saturating_sub(summary.total_count);
        let retention = if summary.board.has_retention() {
            format!(", {hidden} hidden by retention")
        } else {
            String::new()
        };
        info!(
            "  {} - {} posts{}",
            summary.board.name, summary.total_count, retention
        );
    }
    Ok(())
}
