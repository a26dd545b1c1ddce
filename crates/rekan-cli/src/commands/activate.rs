//! The `rekan activate` command.

use std::path::PathBuf;

use anyhow::Result;

use rekan_core::gatekeeper::Gatekeeper;
use rekan_core::model::Level;
use rekan_store::config::{create_store, load_config_from};

pub async fn execute(license: String, level: Level, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let stores = create_store(&config.store)?;
    let gatekeeper = Gatekeeper::from_stores(&stores);

    let quota = gatekeeper.activate(&license, level).await?;
    println!(
        "License {} active for {}: {} of {} seats remaining",
        quota.code,
        level.label(),
        quota.remaining(),
        quota.total_quota
    );
    Ok(())
}
