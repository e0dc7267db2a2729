//! Synthesizes the records describing one song package.

use super::catalog::CatalogEntry;
use super::error::ConversionError;
use crate::models::{
    ChartBlock, ManifestEntry, ManifestKind, PackEntry, PackList, PackSettings,
    PackageDescriptor, ProjectDescriptor, Skin, SkinSide, SongList, SongMetadata, SongRecord,
};
use indexmap::IndexMap;

/// Filenames inside the output song directory.
pub const OUTPUT_COVER: &str = "base.jpg";
pub const OUTPUT_AUDIO: &str = "base.ogg";
pub const OUTPUT_CHART_EXTENSION: &str = ".aff";
pub const PROJECT_FILE: &str = "project.arcproj";
pub const INDEX_FILE: &str = "index.yml";

/// Settings file of a pack directory
pub fn pack_settings_file(pack_id: &str) -> String {
    format!("{}.yml", pack_id)
}

/// Pack cover image inside the pack directory
pub fn pack_image_file(pack_id: &str) -> String {
    format!("1080_select_{}.png", pack_id)
}

/// Builds a [`PackageDescriptor`] for a song and its difficulty catalog.
#[derive(Debug, Clone)]
pub struct DescriptorSynthesizer {
    user_id: String,
}

impl DescriptorSynthesizer {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    fn qualified(&self, id: &str) -> String {
        format!("{}.{}", self.user_id, id)
    }

    /// Synthesize all records.
    ///
    /// # Arguments
    /// * `metadata` - Resolved song
    /// * `catalog` - Finalized difficulties with their charts
    /// * `background` - Output filename of the background image, if one is packaged
    pub fn synthesize(
        &self,
        metadata: &SongMetadata,
        catalog: &[CatalogEntry],
        background: Option<&str>,
    ) -> Result<PackageDescriptor, ConversionError> {
        let pack_id = metadata.set.clone();
        let song_id = metadata.id.clone();
        let side = SkinSide::from_side(metadata.side);

        let charts: Vec<ChartBlock> = catalog
            .iter()
            .map(|c| ChartBlock {
                chart_path: c.entry.chart_file_name(OUTPUT_CHART_EXTENSION),
                audio_path: OUTPUT_AUDIO.to_string(),
                jacket_path: OUTPUT_COVER.to_string(),
                background_path: background.map(str::to_string),
                base_bpm: metadata.bpm_base,
                bpm_text: metadata.bpm.clone(),
                sync_base_bpm: true,
                title: metadata.title.clone(),
                composer: metadata.artist.clone(),
                charter: c.entry.chart_designer.clone(),
                difficulty: c.entry.label(),
                difficulty_color: c.entry.color().to_string(),
                skin: Skin {
                    side: side.token().to_string(),
                },
                preview_end: metadata.preview_end,
            })
            .collect();

        if charts.is_empty() {
            return Err(ConversionError::NoValidCharts);
        }
        for block in &charts {
            tracing::debug!("Chart block: {} ({})", block.chart_path, block.difficulty);
        }

        let packlist = PackList {
            packs: vec![PackEntry {
                id: pack_id.clone(),
                name_localized: IndexMap::from([("en".to_string(), format!("Pack {}", pack_id))]),
            }],
        };

        let songlist = SongList {
            songs: vec![SongRecord {
                id: song_id.clone(),
                title_localized: metadata.title_localized.clone(),
                artist: metadata.artist.clone(),
                side: metadata.side,
                bpm: metadata.bpm.clone(),
                bpm_base: metadata.bpm_base,
                set: pack_id.clone(),
                difficulties: catalog.iter().map(|c| c.entry.clone()).collect(),
            }],
        };

        let pack_settings = PackSettings {
            pack_name: format!("Pack {}", pack_id),
            image_path: pack_image_file(&pack_id),
            level_identifiers: vec![self.qualified(&song_id)],
        };

        let index = vec![
            ManifestEntry {
                directory: pack_id.clone(),
                identifier: self.qualified(&pack_id),
                settings_file: pack_settings_file(&pack_id),
                version: 0,
                kind: ManifestKind::Pack,
            },
            ManifestEntry {
                directory: song_id.clone(),
                identifier: self.qualified(&song_id),
                settings_file: PROJECT_FILE.to_string(),
                version: 0,
                kind: ManifestKind::Level,
            },
        ];

        tracing::info!(
            "Synthesized descriptors for {} ({} difficulties, pack {})",
            song_id,
            charts.len(),
            pack_id
        );

        Ok(PackageDescriptor {
            pack_id,
            song_id,
            packlist,
            songlist,
            project: ProjectDescriptor { charts },
            pack_settings,
            index,
        })
    }
}

/// `packlist` as pretty-printed JSON
pub fn packlist_json(descriptor: &PackageDescriptor) -> Result<String, ConversionError> {
    serde_json::to_string_pretty(&descriptor.packlist)
        .map_err(|e| ConversionError::Packaging(format!("packlist: {}", e)))
}

/// `songlist` as pretty-printed JSON
pub fn songlist_json(descriptor: &PackageDescriptor) -> Result<String, ConversionError> {
    serde_json::to_string_pretty(&descriptor.songlist)
        .map_err(|e| ConversionError::Packaging(format!("songlist: {}", e)))
}
