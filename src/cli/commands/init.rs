//! Database initialization command.

use console::style;

use sumika::config::Settings;
use sumika::repository::migrations;

/// Initialize the data directory and run pending migrations.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;

    let db_url = settings.database_url();
    println!("{} Initializing database at {}", style("→").cyan(), db_url);

    migrations::run_migrations(&db_url).await?;

    println!("{} Database ready.", style("✓").green());
    Ok(())
}
