//! Finds the fixed-role assets of a chart package regardless of layout.
//!
//! Archives arrive flat (`base.jpg` at the root) or nested one or more folders
//! deep (`MySong/base.jpg`), sometimes with stray copies in other folders. The
//! locator settles on one file per role and computes the common base path the
//! rest of the lookup is relative to.

use super::archive_reader::ArchiveEntries;
use super::error::ConversionError;
use crate::models::{AssetNames, BackgroundSettings};
use camino::Utf8Path;

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl RawEntry {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        Utf8Path::new(&self.path).file_name().unwrap_or(&self.path)
    }
}

/// The resolved assets of one input archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    /// Shared leading folder of the mandatory assets, `""` or ending in `/`.
    pub base_path: String,
    pub cover: RawEntry,
    pub audio: RawEntry,
    /// None when neither the primary nor any fallback config exists.
    pub config: Option<RawEntry>,
    pub background: Option<RawEntry>,
    /// Candidate chart files in archive order, not yet validated.
    pub charts: Vec<RawEntry>,
}

/// Paths chosen for the mandatory roles in one search pass.
#[derive(Debug, Default)]
struct MandatoryPaths {
    cover: Option<String>,
    audio: Option<String>,
    config: Option<String>,
}

impl MandatoryPaths {
    fn is_complete(&self) -> bool {
        self.cover.is_some() && self.audio.is_some() && self.config.is_some()
    }

    fn resolved(&self) -> Vec<&str> {
        [&self.cover, &self.audio, &self.config]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Resolves an [`AssetSet`] from decoded archive entries.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    names: AssetNames,
    background: BackgroundSettings,
    config_optional: bool,
}

impl AssetLocator {
    /// Create a locator.
    ///
    /// # Arguments
    /// * `names` - Filenames for each fixed role
    /// * `background` - Background heuristic settings
    /// * `config_optional` - If false, a missing config is reported as a missing asset
    pub fn new(names: AssetNames, background: BackgroundSettings, config_optional: bool) -> Self {
        Self {
            names,
            background,
            config_optional,
        }
    }

    /// Resolve the asset set, consuming the entries.
    ///
    /// A root-only pass runs first; if it does not find cover, audio and a
    /// config, every folder is searched and the shallowest match wins.
    pub fn locate(&self, mut entries: ArchiveEntries) -> Result<AssetSet, ConversionError> {
        let root_pass = self.find_mandatory(&entries, true);
        let found = if root_pass.is_complete() {
            root_pass
        } else {
            tracing::debug!("Mandatory assets not all at archive root, searching subfolders");
            self.find_mandatory(&entries, false)
        };

        let mut missing = Vec::new();
        if found.cover.is_none() {
            missing.push(self.names.cover.clone());
        }
        if found.audio.is_none() {
            missing.push(self.names.audio.clone());
        }
        if found.config.is_none() && !self.config_optional {
            missing.push(self.names.primary_config.clone());
        }
        for name in &missing {
            tracing::warn!("Missing required file: {}", name);
        }

        let (Some(cover_path), Some(audio_path)) = (found.cover.clone(), found.audio.clone())
        else {
            return Err(ConversionError::MissingAssets(missing));
        };
        if !missing.is_empty() {
            return Err(ConversionError::MissingAssets(missing));
        }

        let base_path = common_base_path(&found.resolved());
        tracing::info!(
            "Located assets: cover={}, audio={}, config={}, base path='{}'",
            cover_path,
            audio_path,
            found.config.as_deref().unwrap_or("<none>"),
            base_path
        );

        let chart_paths = self.find_charts(&entries, &base_path);
        let background_path = self.find_background(&entries, &base_path, &cover_path);
        match &background_path {
            Some(path) => tracing::info!("Found background image: {}", path),
            None => tracing::debug!("No background image matched the naming heuristic"),
        }

        let mut take = |path: &str| {
            let bytes = entries.shift_remove(path).unwrap_or_default();
            RawEntry::new(path, bytes)
        };

        Ok(AssetSet {
            cover: take(cover_path.as_str()),
            audio: take(audio_path.as_str()),
            config: found.config.as_deref().map(&mut take),
            background: background_path.as_deref().map(&mut take),
            charts: chart_paths.iter().map(|p| take(p.as_str())).collect(),
            base_path,
        })
    }

    fn find_mandatory(&self, entries: &ArchiveEntries, root_only: bool) -> MandatoryPaths {
        let config = self
            .names
            .config_candidates()
            .find_map(|name| shallowest_match(entries, name, root_only));

        MandatoryPaths {
            cover: shallowest_match(entries, &self.names.cover, root_only),
            audio: shallowest_match(entries, &self.names.audio, root_only),
            config,
        }
    }

    /// Chart files directly under the base path; anywhere if there are none.
    fn find_charts(&self, entries: &ArchiveEntries, base_path: &str) -> Vec<String> {
        let extension = self.names.chart_extension.to_ascii_lowercase();
        let is_chart = |path: &str| path.to_ascii_lowercase().ends_with(&extension);

        let in_base: Vec<String> = entries
            .keys()
            .filter(|p| is_chart(p.as_str()) && is_direct_child(p, base_path))
            .cloned()
            .collect();
        if !in_base.is_empty() {
            return in_base;
        }

        let anywhere: Vec<String> = entries
            .keys()
            .filter(|p| is_chart(p.as_str()))
            .cloned()
            .collect();
        if !anywhere.is_empty() {
            tracing::warn!(
                "No chart files under '{}', using {} found elsewhere",
                base_path,
                anywhere.len()
            );
        }
        anywhere
    }

    /// Background image by naming heuristic: the filename contains the marker
    /// and ends with the accepted extension.
    fn find_background(
        &self,
        entries: &ArchiveEntries,
        base_path: &str,
        cover_path: &str,
    ) -> Option<String> {
        let marker = self.background.marker.to_ascii_lowercase();
        let extension = self.background.extension.to_ascii_lowercase();

        let candidates: Vec<&String> = entries
            .keys()
            .filter(|p| p.as_str() != cover_path)
            .filter(|p| {
                let name = file_name(p).to_ascii_lowercase();
                name.contains(&marker) && name.ends_with(&extension)
            })
            .collect();

        candidates
            .iter()
            .find(|p| is_direct_child(p, base_path))
            .or_else(|| candidates.first())
            .map(|p| (*p).clone())
    }
}

fn file_name(path: &str) -> &str {
    Utf8Path::new(path).file_name().unwrap_or(path)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

fn is_direct_child(path: &str, base_path: &str) -> bool {
    path.strip_prefix(base_path)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// Shallowest entry named exactly `name`; ties go to archive order.
fn shallowest_match(entries: &ArchiveEntries, name: &str, root_only: bool) -> Option<String> {
    entries
        .keys()
        .filter(|p| file_name(p) == name)
        .filter(|p| !root_only || depth(p) == 0)
        .min_by_key(|p| depth(p))
        .cloned()
}

/// Longest shared leading sequence of folder segments across `paths`.
///
/// Returns `""` when the assets share no folder, otherwise the folders joined
/// by `/` with a trailing `/`.
pub fn common_base_path(paths: &[&str]) -> String {
    let mut folders = paths.iter().map(|p| {
        Utf8Path::new(p)
            .parent()
            .map(|parent| parent.iter().collect::<Vec<_>>())
            .unwrap_or_default()
    });

    let Some(mut common) = folders.next() else {
        return String::new();
    };
    for segments in folders {
        let shared = common
            .iter()
            .zip(&segments)
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        String::new()
    } else {
        format!("{}/", common.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn locator() -> AssetLocator {
        AssetLocator::new(AssetNames::default(), BackgroundSettings::default(), true)
    }

    fn entries(paths: &[&str]) -> ArchiveEntries {
        paths
            .iter()
            .map(|p| (p.to_string(), p.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_common_base_path_nested() {
        assert_eq!(
            common_base_path(&["x/y/base.jpg", "x/y/base.ogg", "x/y/slst.txt"]),
            "x/y/"
        );
    }

    #[test]
    fn test_common_base_path_root() {
        assert_eq!(common_base_path(&["base.jpg", "base.ogg", "slst.txt"]), "");
        assert_eq!(common_base_path(&[]), "");
    }

    #[test]
    fn test_common_base_path_partial_overlap() {
        assert_eq!(
            common_base_path(&["x/y/base.jpg", "x/z/base.ogg", "x/y/slst.txt"]),
            "x/"
        );
        assert_eq!(common_base_path(&["a/base.jpg", "b/base.ogg"]), "");
    }

    #[test]
    fn test_locate_flat_archive() {
        let assets = locator()
            .locate(entries(&["base.jpg", "base.ogg", "slst.txt", "2.aff", "3.aff"]))
            .unwrap();

        assert_eq!(assets.base_path, "");
        assert_eq!(assets.cover.path, "base.jpg");
        assert_eq!(assets.cover.bytes, b"base.jpg");
        assert_eq!(assets.config.unwrap().path, "slst.txt");
        let charts: Vec<&str> = assets.charts.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(charts, vec!["2.aff", "3.aff"]);
    }

    #[test]
    fn test_locate_nested_prefers_shallowest() {
        let assets = locator()
            .locate(entries(&[
                "pkg/song/old/base.jpg",
                "pkg/song/base.jpg",
                "pkg/song/base.ogg",
                "pkg/song/slst.txt",
                "pkg/song/0.aff",
                "pkg/song/old/1.aff",
            ]))
            .unwrap();

        assert_eq!(assets.base_path, "pkg/song/");
        assert_eq!(assets.cover.path, "pkg/song/base.jpg");
        assert_eq!(assets.charts.len(), 1);
        assert_eq!(assets.charts[0].path, "pkg/song/0.aff");
    }

    #[test]
    fn test_root_pass_wins_over_subfolders() {
        let assets = locator()
            .locate(entries(&[
                "extra/base.jpg",
                "base.jpg",
                "base.ogg",
                "slst.txt",
            ]))
            .unwrap();
        assert_eq!(assets.cover.path, "base.jpg");
        assert_eq!(assets.base_path, "");
    }

    #[test]
    fn test_fallback_config_used_when_primary_absent() {
        let assets = locator()
            .locate(entries(&["base.jpg", "base.ogg", "songlist", "0.aff"]))
            .unwrap();
        assert_eq!(assets.config.unwrap().file_name(), "songlist");
    }

    #[test]
    fn test_missing_config_is_not_an_error_when_optional() {
        let assets = locator()
            .locate(entries(&["base.jpg", "base.ogg", "0.aff"]))
            .unwrap();
        assert!(assets.config.is_none());
    }

    #[test]
    fn test_missing_config_reported_when_required() {
        let strict = AssetLocator::new(AssetNames::default(), BackgroundSettings::default(), false);
        let err = strict
            .locate(entries(&["base.jpg", "base.ogg"]))
            .unwrap_err();
        assert_eq!(err, ConversionError::MissingAssets(vec!["slst.txt".to_string()]));
    }

    #[test]
    fn test_missing_mandatory_assets_listed() {
        let err = locator().locate(entries(&["slst.txt", "0.aff"])).unwrap_err();
        assert_eq!(
            err,
            ConversionError::MissingAssets(vec!["base.jpg".to_string(), "base.ogg".to_string()])
        );
    }

    #[test]
    fn test_background_heuristic() {
        let assets = locator()
            .locate(entries(&[
                "song/base.jpg",
                "song/base.ogg",
                "song/slst.txt",
                "song/mysong_bg.jpg",
                "song/bg_notes.txt",
            ]))
            .unwrap();
        assert_eq!(assets.background.unwrap().path, "song/mysong_bg.jpg");
    }

    #[test]
    fn test_no_background_match() {
        let assets = locator()
            .locate(entries(&["base.jpg", "base.ogg", "slst.txt", "bg.png"]))
            .unwrap();
        assert!(assets.background.is_none());
    }

    #[test]
    fn test_charts_found_elsewhere_when_base_has_none() {
        let assets = locator()
            .locate(entries(&["base.jpg", "base.ogg", "slst.txt", "charts/2.aff"]))
            .unwrap();
        assert_eq!(assets.charts.len(), 1);
        assert_eq!(assets.charts[0].file_name(), "2.aff");
    }

    proptest! {
        #[test]
        fn prop_base_path_prefixes_every_asset(
            prefix in proptest::collection::vec("[a-z]{1,4}", 0..4),
            names in proptest::collection::vec("[a-z]{1,6}\\.[a-z]{3}", 1..4),
        ) {
            let folder: String = prefix.iter().map(|s| format!("{}/", s)).collect();
            let paths: Vec<String> = names.iter().map(|n| format!("{}{}", folder, n)).collect();
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();

            let base = common_base_path(&refs);
            prop_assert_eq!(&base, &folder);
            for path in &paths {
                prop_assert!(path.starts_with(&base));
            }
        }
    }
}
