//! Song metadata resolution from the package config (or caller overrides).

use super::asset_locator::RawEntry;
use super::error::ConversionError;
use crate::models::song::{DEFAULT_PREVIEW_END, DEFAULT_TITLE, RATING_UNSET};
use crate::models::{DifficultyEntry, Overrides, SongMetadata};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

const DEFAULT_ARTIST: &str = "Unknown Artist";
const DEFAULT_BPM_TEXT: &str = "200";
const DEFAULT_BPM_BASE: f64 = 200.0;

/// Characters that cannot appear in an output path component.
static ILLEGAL_PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("Invalid path character regex"));

/// Replace path-illegal characters with `_`.
pub fn sanitize_file_component(value: &str) -> String {
    ILLEGAL_PATH_CHARS.replace_all(value, "_").into_owned()
}

/// Which of the accepted config shapes a document has.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSchema {
    /// `{"songs": [ {...}, ... ]}`; holds the first song.
    SongsList(Value),
    /// A bare song object carrying `id` and `difficulties`.
    SingleSong(Value),
}

impl ConfigSchema {
    pub fn into_song(self) -> Value {
        match self {
            Self::SongsList(song) | Self::SingleSong(song) => song,
        }
    }
}

/// Resolve the shape of a parsed config document.
///
/// Shapes are tried in order: a non-empty `songs` list, then a single song.
/// Anything else is rejected.
pub fn resolve_schema(document: Value) -> Result<ConfigSchema, ConversionError> {
    let Value::Object(mut root) = document else {
        return Err(ConversionError::ConfigFormat(
            "top level is not an object".to_string(),
        ));
    };

    if let Some(songs) = root.remove("songs") {
        let Value::Array(songs) = songs else {
            return Err(ConversionError::ConfigFormat(
                "`songs` is not a list".to_string(),
            ));
        };
        return match songs.into_iter().next() {
            Some(song @ Value::Object(_)) => Ok(ConfigSchema::SongsList(song)),
            Some(_) => Err(ConversionError::ConfigFormat(
                "first entry of `songs` is not an object".to_string(),
            )),
            None => Err(ConversionError::ConfigFormat("`songs` is empty".to_string())),
        };
    }

    if root.contains_key("id") && root.contains_key("difficulties") {
        return Ok(ConfigSchema::SingleSong(Value::Object(root)));
    }

    Err(ConversionError::ConfigFormat(
        "expected a `songs` list or a song with `id` and `difficulties`".to_string(),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct RawSong {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title_localized: Option<IndexMap<String, String>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    bpm: Option<Value>,
    #[serde(default)]
    bpm_base: Option<f64>,
    #[serde(default)]
    side: Option<i64>,
    #[serde(default)]
    set: Option<String>,
    #[serde(default, rename = "audioPreviewEnd")]
    audio_preview_end: Option<u32>,
    #[serde(default)]
    difficulties: Option<Vec<RawDifficulty>>,
}

/// Declared difficulty; bare integers are read as a rating class.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDifficulty {
    Class(u8),
    Entry {
        #[serde(rename = "ratingClass")]
        rating_class: u8,
        #[serde(default)]
        rating: Option<i32>,
        #[serde(default, rename = "ratingPlus")]
        rating_plus: Option<bool>,
        #[serde(default, rename = "chartDesigner")]
        chart_designer: Option<String>,
    },
}

impl RawDifficulty {
    fn into_entry(self) -> DifficultyEntry {
        match self {
            Self::Class(class) => DifficultyEntry::unrated(class, ""),
            Self::Entry {
                rating_class,
                rating,
                rating_plus,
                chart_designer,
            } => DifficultyEntry {
                chart_designer: chart_designer.unwrap_or_default(),
                rating: rating.unwrap_or(RATING_UNSET),
                rating_plus: rating_plus.unwrap_or(false),
                rating_class,
            },
        }
    }
}

/// Outcome of metadata resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(SongMetadata),
    /// No config file and no overrides; the caller must supply values.
    NeedsOverrides,
}

/// Builds [`SongMetadata`] from a config file or from caller overrides.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    default_pack_id: String,
}

impl MetadataResolver {
    pub fn new(default_pack_id: impl Into<String>) -> Self {
        Self {
            default_pack_id: default_pack_id.into(),
        }
    }

    /// Resolve metadata, preferring the config file over overrides.
    pub fn resolve(
        &self,
        config: Option<&RawEntry>,
        overrides: Option<&Overrides>,
    ) -> Result<Resolution, ConversionError> {
        match (config, overrides) {
            (Some(config), _) => self.parse_config(config).map(Resolution::Resolved),
            (None, Some(overrides)) => Ok(Resolution::Resolved(self.from_overrides(overrides))),
            (None, None) => {
                tracing::warn!("No config file found, waiting for manual input");
                Ok(Resolution::NeedsOverrides)
            }
        }
    }

    /// Parse a config file into metadata.
    pub fn parse_config(&self, config: &RawEntry) -> Result<SongMetadata, ConversionError> {
        tracing::info!("Parsing song config: {}", config.path);

        let text = std::str::from_utf8(&config.bytes)
            .map_err(|e| ConversionError::ConfigFormat(format!("not UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');

        let document: Value = serde_json::from_str(text)
            .map_err(|e| ConversionError::ConfigFormat(format!("invalid JSON: {}", e)))?;

        let schema = resolve_schema(document)?;
        tracing::debug!("Config schema: {:?}", std::mem::discriminant(&schema));

        let raw: RawSong = serde_json::from_value(schema.into_song())
            .map_err(|e| ConversionError::ConfigFormat(format!("invalid song entry: {}", e)))?;

        Ok(self.normalize(raw))
    }

    fn normalize(&self, raw: RawSong) -> SongMetadata {
        let localized_en = raw
            .title_localized
            .as_ref()
            .and_then(|t| t.get("en"))
            .filter(|t| !t.is_empty())
            .cloned();
        let title = match (localized_en, raw.title.filter(|t| !t.is_empty())) {
            (Some(title), _) | (None, Some(title)) => title,
            (None, None) => {
                tracing::warn!("No song title found, using default: {}", DEFAULT_TITLE);
                DEFAULT_TITLE.to_string()
            }
        };
        let sanitized_title = sanitize_file_component(&title);
        tracing::info!("Song title: {}", title);

        let mut title_localized = raw.title_localized.unwrap_or_default();
        title_localized
            .entry("en".to_string())
            .or_insert_with(|| title.clone());

        let id = raw
            .id
            .and_then(|id| match id {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty())
            .map(|id| sanitize_file_component(&id))
            .unwrap_or_else(|| sanitized_title.clone());

        let bpm = match raw.bpm {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_BPM_TEXT.to_string(),
        };
        let bpm_base = raw
            .bpm_base
            .or_else(|| bpm.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_BPM_BASE);

        let mut difficulties: Vec<DifficultyEntry> = Vec::new();
        for entry in raw
            .difficulties
            .unwrap_or_default()
            .into_iter()
            .map(RawDifficulty::into_entry)
        {
            if difficulties
                .iter()
                .any(|d| d.rating_class == entry.rating_class)
            {
                tracing::warn!(
                    "Duplicate declared difficulty class {}, keeping the first",
                    entry.rating_class
                );
                continue;
            }
            difficulties.push(entry);
        }

        SongMetadata {
            id,
            title,
            title_localized,
            sanitized_title,
            artist: raw
                .artist
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_ARTIST.to_string()),
            bpm,
            bpm_base,
            side: raw.side.unwrap_or(0),
            set: self.pack_id(raw.set),
            preview_end: raw.audio_preview_end.unwrap_or(DEFAULT_PREVIEW_END),
            difficulties,
            from_overrides: false,
        }
    }

    /// Build metadata from caller overrides. Difficulties are left empty so
    /// they are synthesized from the chart files.
    pub fn from_overrides(&self, overrides: &Overrides) -> SongMetadata {
        let title = if overrides.title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            overrides.title.trim().to_string()
        };
        let sanitized_title = sanitize_file_component(&title);
        let bpm = if overrides.bpm.trim().is_empty() {
            DEFAULT_BPM_TEXT.to_string()
        } else {
            overrides.bpm.trim().to_string()
        };
        let bpm_base = bpm.parse::<f64>().unwrap_or(DEFAULT_BPM_BASE);

        tracing::info!("Using manual overrides for song: {}", title);

        SongMetadata {
            id: sanitized_title.clone(),
            title_localized: IndexMap::from([("en".to_string(), title.clone())]),
            title,
            sanitized_title,
            artist: if overrides.artist.trim().is_empty() {
                DEFAULT_ARTIST.to_string()
            } else {
                overrides.artist.trim().to_string()
            },
            bpm,
            bpm_base,
            side: 0,
            set: self.pack_id(None),
            preview_end: DEFAULT_PREVIEW_END,
            difficulties: Vec::new(),
            from_overrides: true,
        }
    }

    fn pack_id(&self, set: Option<String>) -> String {
        let set = set
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.default_pack_id.clone());
        sanitize_file_component(&set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn resolver() -> MetadataResolver {
        MetadataResolver::new("pack001")
    }

    fn config(text: &str) -> RawEntry {
        RawEntry::new("slst.txt", text.as_bytes().to_vec())
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("A/B:C"), "A_B_C");
        assert_eq!(sanitize_file_component(r#"a\b*c?d"e<f>g|h"#), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_file_component("plain title"), "plain title");
    }

    #[test]
    fn test_resolve_schema_songs_list() {
        let schema = resolve_schema(json!({"songs": [{"id": "a"}, {"id": "b"}]})).unwrap();
        assert_eq!(schema, ConfigSchema::SongsList(json!({"id": "a"})));
    }

    #[test]
    fn test_resolve_schema_single_song() {
        let schema = resolve_schema(json!({"id": "a", "difficulties": []})).unwrap();
        assert!(matches!(schema, ConfigSchema::SingleSong(_)));
    }

    #[test]
    fn test_resolve_schema_rejects_other_shapes() {
        for doc in [
            json!({"songs": []}),
            json!({"songs": "nope"}),
            json!({"songs": [1]}),
            json!({"id": "only-id"}),
            json!({"title": "no id"}),
            json!([1, 2, 3]),
        ] {
            assert!(
                matches!(resolve_schema(doc.clone()), Err(ConversionError::ConfigFormat(_))),
                "accepted {}",
                doc
            );
        }
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"{
            "songs": [{
                "id": "mysong",
                "title_localized": {"en": "My Song", "ja": "マイソング"},
                "artist": "Someone",
                "bpm": "85-170",
                "bpm_base": 170.0,
                "side": 1,
                "set": "custompack",
                "audioPreviewEnd": 30000,
                "difficulties": [
                    {"ratingClass": 2, "chartDesigner": "Charter", "rating": 9, "ratingPlus": true},
                    {"ratingClass": 3, "rating": 10}
                ]
            }]
        }"#;

        let meta = resolver().parse_config(&config(text)).unwrap();
        assert_eq!(meta.id, "mysong");
        assert_eq!(meta.title, "My Song");
        assert_eq!(meta.title_localized.get("ja").unwrap(), "マイソング");
        assert_eq!(meta.artist, "Someone");
        assert_eq!(meta.bpm, "85-170");
        assert_eq!(meta.bpm_base, 170.0);
        assert_eq!(meta.side, 1);
        assert_eq!(meta.set, "custompack");
        assert_eq!(meta.preview_end, 30000);
        assert_eq!(meta.difficulties.len(), 2);
        assert_eq!(meta.difficulties[0].label(), "Future 9+");
        assert_eq!(meta.difficulties[1].chart_designer, "");
        assert!(!meta.from_overrides);
    }

    #[test]
    fn test_parse_defaults() {
        let meta = resolver()
            .parse_config(&config(r#"{"id": "x", "difficulties": []}"#))
            .unwrap();
        assert_eq!(meta.title, "ARC_Song");
        assert_eq!(meta.artist, "Unknown Artist");
        assert_eq!(meta.bpm, "200");
        assert_eq!(meta.bpm_base, 200.0);
        assert_eq!(meta.side, 0);
        assert_eq!(meta.set, "pack001");
        assert_eq!(meta.preview_end, 50400);
        assert!(meta.difficulties.is_empty());
    }

    #[test]
    fn test_title_resolution_order_and_sanitizing() {
        let meta = resolver()
            .parse_config(&config(r#"{"id": "x", "title": "A/B:C", "difficulties": []}"#))
            .unwrap();
        assert_eq!(meta.title, "A/B:C");
        assert_eq!(meta.sanitized_title, "A_B_C");
        assert_eq!(meta.title_localized.get("en").unwrap(), "A/B:C");

        let meta = resolver()
            .parse_config(&config(
                r#"{"id": "x", "title": "Plain", "title_localized": {"en": "English"}, "difficulties": []}"#,
            ))
            .unwrap();
        assert_eq!(meta.title, "English");
    }

    #[test]
    fn test_missing_id_uses_sanitized_title() {
        let meta = resolver()
            .parse_config(&config(r#"{"songs": [{"title": "A/B:C"}]}"#))
            .unwrap();
        assert_eq!(meta.id, "A_B_C");
    }

    #[test]
    fn test_numeric_bpm_and_bare_difficulty_classes() {
        let meta = resolver()
            .parse_config(&config(
                r#"{"id": 42, "bpm": 175, "difficulties": [0, 2, 2]}"#,
            ))
            .unwrap();
        assert_eq!(meta.id, "42");
        assert_eq!(meta.bpm, "175");
        assert_eq!(meta.bpm_base, 175.0);
        let classes: Vec<u8> = meta.difficulties.iter().map(|d| d.rating_class).collect();
        assert_eq!(classes, vec![0, 2]);
    }

    #[test]
    fn test_bom_is_tolerated() {
        let meta = resolver()
            .parse_config(&config("\u{feff}{\"id\": \"x\", \"difficulties\": []}"))
            .unwrap();
        assert_eq!(meta.id, "x");
    }

    #[test]
    fn test_invalid_json_is_config_format_error() {
        let err = resolver().parse_config(&config("{not json")).unwrap_err();
        assert!(matches!(err, ConversionError::ConfigFormat(_)));
    }

    #[test]
    fn test_resolve_without_config_needs_overrides() {
        assert_eq!(
            resolver().resolve(None, None).unwrap(),
            Resolution::NeedsOverrides
        );
    }

    #[test]
    fn test_from_overrides() {
        let overrides = Overrides {
            title: "Over/ride".to_string(),
            artist: "Artist".to_string(),
            bpm: "150".to_string(),
            charter: "Me".to_string(),
        };
        let Resolution::Resolved(meta) = resolver().resolve(None, Some(&overrides)).unwrap() else {
            panic!("expected resolved metadata");
        };

        assert!(meta.from_overrides);
        assert_eq!(meta.title, "Over/ride");
        assert_eq!(meta.id, "Over_ride");
        assert_eq!(meta.bpm_base, 150.0);
        assert_eq!(meta.set, "pack001");
        assert!(meta.difficulties.is_empty());
    }

    proptest! {
        #[test]
        fn prop_sanitized_component_has_no_separators(value in ".{0,40}") {
            let sanitized = sanitize_file_component(&value);
            prop_assert!(!sanitized.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
            prop_assert_eq!(sanitized.chars().count(), value.chars().count());
        }
    }
}
