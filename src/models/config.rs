use serde::{Deserialize, Serialize};

/// Default cap on a single input archive (50 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Converter configuration from `arcpack.yaml`
///
/// Every field has a default so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Caller identity, used as the default chart designer and as the
    /// qualifier of manifest identifiers.
    pub user_id: String,

    /// Inputs larger than this are rejected before decoding.
    pub max_input_bytes: u64,

    pub assets: AssetNames,

    pub background: BackgroundSettings,

    /// Skip any entry with a path segment starting with this character.
    pub skip_marker: Option<char>,

    /// Suspend for caller-supplied overrides when no config file exists.
    /// When disabled a missing config is reported as a missing asset.
    pub prompt_for_overrides: bool,

    /// Pack identifier used when the song does not declare a set.
    pub default_pack_id: String,
}

/// Fixed filenames the locator looks for in an input archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetNames {
    pub cover: String,
    pub audio: String,
    pub primary_config: String,
    pub fallback_configs: Vec<String>,
    pub chart_extension: String,
}

/// Background image heuristic and prompt settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    /// Substring a filename must contain to count as a background.
    pub marker: String,
    pub extension: String,

    /// Name given to background bytes supplied by the caller.
    pub supplied_file_name: String,

    /// Suspend for a caller-supplied image when none is found.
    pub prompt: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            user_id: "Unknown_User".to_string(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            assets: AssetNames::default(),
            background: BackgroundSettings::default(),
            skip_marker: None,
            prompt_for_overrides: true,
            default_pack_id: "pack001".to_string(),
        }
    }
}

impl Default for AssetNames {
    fn default() -> Self {
        Self {
            cover: "base.jpg".to_string(),
            audio: "base.ogg".to_string(),
            primary_config: "slst.txt".to_string(),
            fallback_configs: vec!["songlist".to_string(), "songlist.txt".to_string()],
            chart_extension: ".aff".to_string(),
        }
    }
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            marker: "bg".to_string(),
            extension: ".jpg".to_string(),
            supplied_file_name: "custom_bg.jpg".to_string(),
            prompt: true,
        }
    }
}

impl AssetNames {
    /// Config filenames in lookup order: primary first, then each fallback.
    pub fn config_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_config.as_str())
            .chain(self.fallback_configs.iter().map(String::as_str))
    }
}
