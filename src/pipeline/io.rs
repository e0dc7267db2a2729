//! File I/O around the pipeline: loading inputs and writing packages.

use super::{ConversionArtifact, ConversionJob};
use crate::services::{packlist_json, songlist_json};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tokio::fs;

/// Load an input archive as a job.
///
/// The file size is checked against `max_bytes` from metadata first; an
/// oversized file is not read and the returned job fails at the size gate.
pub async fn load_job(path: &Utf8Path, max_bytes: u64) -> Result<ConversionJob> {
    let label = path.file_name().unwrap_or(path.as_str()).to_string();
    let size = fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat input: {}", path))?
        .len();

    if size > max_bytes {
        tracing::warn!("{} is {} bytes, skipping read", path, size);
        return Ok(ConversionJob::from_declared_size(label, size));
    }

    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read input: {}", path))?;
    Ok(ConversionJob::new(label, bytes))
}

/// Write a finished package into `output_dir`.
///
/// # Arguments
/// * `output_dir` - Created if missing
/// * `artifact` - The package to write
/// * `emit_descriptors` - Also write `<stem>.packlist.json` and `<stem>.songlist.json`
///
/// # Returns
/// Path of the written package
pub async fn write_artifact(
    output_dir: &Utf8Path,
    artifact: &ConversionArtifact,
    emit_descriptors: bool,
) -> Result<Utf8PathBuf> {
    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    let path = output_dir.join(&artifact.file_name);
    fs::write(&path, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write package: {}", path))?;
    tracing::info!("Wrote {}", path);

    if emit_descriptors {
        let stem = path.file_stem().unwrap_or(artifact.file_name.as_str());
        let packlist = packlist_json(&artifact.descriptor)?;
        let songlist = songlist_json(&artifact.descriptor)?;

        for (suffix, text) in [("packlist", packlist), ("songlist", songlist)] {
            let target = output_dir.join(format!("{}.{}.json", stem, suffix));
            fs::write(&target, text)
                .await
                .with_context(|| format!("Failed to write {}", target))?;
            tracing::debug!("Wrote {}", target);
        }
    }

    Ok(path)
}
