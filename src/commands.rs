//! CLI command implementations

use std::path::PathBuf;

use quill_build::BuildCacheDriver;
use quill_loader::LoadOptions;

pub async fn fetch(root: PathBuf, path: String, use_stale: bool) -> anyhow::Result<()> {
    let driver = BuildCacheDriver::new(&root)?;
    let artifact = driver
        .resolve_artifact_path(&path, LoadOptions { use_stale })
        .await?;
    println!("{artifact}");
    Ok(())
}

pub fn hash(root: PathBuf, path: String, module: bool) -> anyhow::Result<()> {
    let driver = BuildCacheDriver::new(&root)?;
    let digest = if module {
        driver.module_hash(&path)
    } else {
        driver.source_hash(&path)
    };
    println!("{digest}");
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    let driver = BuildCacheDriver::new(&root)?;
    driver.clear_cache()?;

    tracing::info!("Cache cleared");
    Ok(())
}
