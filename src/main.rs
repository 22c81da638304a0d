use anyhow::Result;
use tracing::info;

/// Operational shell: load configuration, bring the store up to the current
/// schema, and verify connectivity. Front ends embed the library directly.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = orderdesk::config::load_config()?;
    orderdesk::config::init_tracing(&cfg.log_level, cfg.log_json);

    let pool = orderdesk::db::establish_connection_from_app_config(&cfg).await?;
    orderdesk::db::run_migrations(&pool).await?;
    orderdesk::db::check_connection(&pool).await?;

    info!(environment = %cfg.environment, "orderdesk store is ready");

    orderdesk::db::close_pool(pool).await?;
    Ok(())
}
