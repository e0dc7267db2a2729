use super::error::ConversionError;
use indexmap::IndexMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Archive members keyed by normalized path, in archive order.
pub type ArchiveEntries = IndexMap<String, Vec<u8>>;

/// Folders dropped wholesale (created by archivers, not by chart authors).
const JUNK_FOLDERS: &[&str] = &["__MACOSX"];

/// Metadata files dropped wherever they appear.
const JUNK_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Decodes an input archive into memory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReader {
    skip_marker: Option<char>,
}

impl ArchiveReader {
    pub fn new(skip_marker: Option<char>) -> Self {
        Self { skip_marker }
    }

    /// Read every non-directory, non-junk entry.
    ///
    /// Paths are normalized to `/` separators with no leading `./` or `/`.
    /// When two entries normalize to the same path the first one is kept.
    pub fn read(&self, bytes: &[u8]) -> Result<ArchiveEntries, ConversionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = ArchiveEntries::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let path = normalize_entry_path(entry.name());
            if path.is_empty() || path.ends_with('/') {
                continue;
            }
            if self.is_ignored(&path) {
                tracing::debug!("Ignoring archive entry: {}", path);
                continue;
            }
            if entries.contains_key(&path) {
                tracing::warn!("Duplicate archive entry, keeping first: {}", path);
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| ConversionError::ArchiveDecode(format!("{}: {}", path, e)))?;

            tracing::debug!("Read entry: {} ({:.1}KB)", path, data.len() as f64 / 1024.0);
            entries.insert(path, data);
        }

        tracing::info!("Archive decoded, {} entries kept", entries.len());
        Ok(entries)
    }

    /// Check if a normalized path falls under an ignored convention
    pub fn is_ignored(&self, path: &str) -> bool {
        let mut segments = path.split('/').peekable();

        while let Some(segment) = segments.next() {
            let is_file_name = segments.peek().is_none();

            if JUNK_FOLDERS.contains(&segment) {
                return true;
            }
            if is_file_name && (JUNK_FILES.contains(&segment) || segment.starts_with("._")) {
                return true;
            }
            if let Some(marker) = self.skip_marker {
                if segment.starts_with(marker) {
                    return true;
                }
            }
        }

        false
    }
}

/// Normalize an archive entry name to a relative `/`-separated path.
pub fn normalize_entry_path(name: &str) -> String {
    let unified = name.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}
