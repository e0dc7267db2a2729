//! Records written into (or alongside) the output package.
//!
//! Field names follow the consuming runtime's formats exactly, so most fields
//! carry a `serde(rename)`.

use super::song::DifficultyEntry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `packlist` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackList {
    pub packs: Vec<PackEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackEntry {
    pub id: String,
    pub name_localized: IndexMap<String, String>,
}

/// `songlist` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongList {
    pub songs: Vec<SongRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: String,
    pub title_localized: IndexMap<String, String>,
    pub artist: String,
    pub side: i64,
    pub bpm: String,
    pub bpm_base: f64,
    pub set: String,
    pub difficulties: Vec<DifficultyEntry>,
}

/// `project.arcproj` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub charts: Vec<ChartBlock>,
}

/// One playable difficulty in the project descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBlock {
    pub chart_path: String,
    pub audio_path: String,
    pub jacket_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_path: Option<String>,
    pub base_bpm: f64,
    pub bpm_text: String,
    pub sync_base_bpm: bool,
    pub title: String,
    pub composer: String,
    pub charter: String,
    pub difficulty: String,
    pub difficulty_color: String,
    pub skin: Skin,
    pub preview_end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skin {
    pub side: String,
}

/// `<packId>.yml` inside the pack directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSettings {
    pub pack_name: String,
    pub image_path: String,
    pub level_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Pack,
    Level,
}

/// One entry of the root `index.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub directory: String,
    pub identifier: String,
    pub settings_file: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: ManifestKind,
}

/// Everything synthesized for one song, ready for the archive writer.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub pack_id: String,
    pub song_id: String,
    pub packlist: PackList,
    pub songlist: SongList,
    pub project: ProjectDescriptor,
    pub pack_settings: PackSettings,
    pub index: Vec<ManifestEntry>,
}
