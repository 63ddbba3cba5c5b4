//! Run export
//!
//! Copies one run's rundex records and asset subtree into a
//! self-contained destination directory, preserving the on-disk layout
//! so downstream tools keep working against the copy.

use rebuildr_config::Config;
use rebuildr_errors::{Error, Result, StorageError};
use rebuildr_rundex::{FetchRebuildOpts, LocalRundex, RundexReader, RundexWriter};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Recursive directory copy.
async fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let mut stack = vec![(src.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| Error::io_with_path(&e, &to))?;
        let mut entries = fs::read_dir(&from)
            .await
            .map_err(|e| Error::io_with_path(&e, &from))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &from))?
        {
            let from_path = entry.path();
            let to_path = to.join(entry.file_name());
            if from_path.is_dir() {
                stack.push((from_path, to_path));
            } else {
                fs::copy(&from_path, &to_path)
                    .await
                    .map_err(|e| Error::io_with_path(&e, &from_path))?;
            }
        }
    }
    Ok(())
}

/// Export one run to `destination`.
///
/// # Errors
///
/// `NotFound` when the run is unknown; I/O errors otherwise.
pub async fn export_run(config: &Config, run_id: &str, destination: &Path) -> Result<()> {
    let run_record: PathBuf = config
        .paths
        .rundex_root
        .join("rundex")
        .join("runs")
        .join(format!("{run_id}.json"));
    if !run_record.exists() {
        return Err(StorageError::NotFound {
            path: run_record.display().to_string(),
        }
        .into());
    }

    // The run record itself.
    let dest_runs = destination.join("rundex").join("runs");
    fs::create_dir_all(&dest_runs)
        .await
        .map_err(|e| Error::io_with_path(&e, &dest_runs))?;
    fs::copy(&run_record, dest_runs.join(format!("{run_id}.json")))
        .await
        .map_err(|e| Error::io_with_path(&e, &run_record))?;

    // Rebuild records for that run, rewritten through the destination
    // rundex so the per-target layout is regenerated.
    let source = LocalRundex::new(&config.paths.rundex_root);
    let dest = LocalRundex::new(destination);
    let rebuilds = source
        .rebuilds(&FetchRebuildOpts {
            run_ids: vec![run_id.to_string()],
            ..FetchRebuildOpts::default()
        })
        .await?;
    for rebuild in &rebuilds {
        dest.write_rebuild(rebuild).await?;
    }

    // The run's asset subtree.
    let asset_src = config.paths.asset_root.join("assets").join(run_id);
    if asset_src.exists() {
        copy_tree(&asset_src, &destination.join("assets").join(run_id)).await?;
    }
    Ok(())
}
