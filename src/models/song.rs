use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{FromRepr, IntoStaticStr};

/// Rating value meaning "not rated".
pub const RATING_UNSET: i32 = -1;

/// Default preview end offset in milliseconds.
pub const DEFAULT_PREVIEW_END: u32 = 50_400;

/// Title used when the config carries neither a localized nor a plain title.
pub const DEFAULT_TITLE: &str = "ARC_Song";

/// Display color used for a rating class outside the ladder.
pub const FALLBACK_DIFFICULTY_COLOR: &str = "#000000FF";

/// The fixed difficulty ladder, indexed by rating class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromRepr, IntoStaticStr,
)]
#[repr(u8)]
pub enum Difficulty {
    Past = 0,
    Present = 1,
    Future = 2,
    Beyond = 3,
    Eternal = 4,
}

impl Difficulty {
    pub fn from_class(class: u8) -> Option<Self> {
        Self::from_repr(class)
    }

    pub fn class(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Display color for the project descriptor (RGBA hex)
    pub fn color(&self) -> &'static str {
        match self {
            Self::Past => "#3A6B78FF",
            Self::Present => "#566947FF",
            Self::Future => "#482B54FF",
            Self::Beyond => "#7C1C30FF",
            Self::Eternal => "#433455FF",
        }
    }
}

/// Skin side token, indexed by the song's side value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum SkinSide {
    Light = 0,
    Conflict = 1,
    Colorless = 2,
}

impl SkinSide {
    /// Sides outside the table render as `light`.
    pub fn from_side(side: i64) -> Self {
        u8::try_from(side)
            .ok()
            .and_then(Self::from_repr)
            .unwrap_or(Self::Light)
    }

    pub fn token(&self) -> &'static str {
        self.into()
    }
}

/// One difficulty of a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyEntry {
    #[serde(rename = "chartDesigner")]
    pub chart_designer: String,

    pub rating: i32,

    #[serde(rename = "ratingPlus")]
    pub rating_plus: bool,

    #[serde(rename = "ratingClass")]
    pub rating_class: u8,
}

impl DifficultyEntry {
    /// Entry with no rating, credited to `designer`.
    pub fn unrated(rating_class: u8, designer: &str) -> Self {
        Self {
            chart_designer: designer.to_string(),
            rating: RATING_UNSET,
            rating_plus: false,
            rating_class,
        }
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        Difficulty::from_class(self.rating_class)
    }

    pub fn is_rated(&self) -> bool {
        self.rating != RATING_UNSET
    }

    /// Label shown in the project descriptor, e.g. "Future 9+" or "Beyond".
    pub fn label(&self) -> String {
        let name = self
            .difficulty()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| format!("Unknown{}", self.rating_class));

        if self.is_rated() {
            format!(
                "{} {}{}",
                name,
                self.rating,
                if self.rating_plus { "+" } else { "" }
            )
        } else {
            name
        }
    }

    pub fn color(&self) -> &'static str {
        self.difficulty()
            .map(|d| d.color())
            .unwrap_or(FALLBACK_DIFFICULTY_COLOR)
    }

    /// Output filename of the chart backing this entry
    pub fn chart_file_name(&self, extension: &str) -> String {
        format!("{}{}", self.rating_class, extension)
    }
}

/// Normalized song metadata for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct SongMetadata {
    /// Song identifier, already safe for use as a directory name.
    pub id: String,

    /// English display title as it appears in the source.
    pub title: String,

    /// All localized titles; always contains `en`.
    pub title_localized: IndexMap<String, String>,

    /// Title with path-illegal characters replaced, for filenames.
    pub sanitized_title: String,

    pub artist: String,

    /// Display BPM text (e.g. "170" or "85-170").
    pub bpm: String,

    pub bpm_base: f64,

    pub side: i64,

    /// Pack identifier.
    pub set: String,

    pub preview_end: u32,

    /// Difficulties declared by the config; empty when none were declared.
    pub difficulties: Vec<DifficultyEntry>,

    /// True when built from caller overrides instead of a config file.
    pub from_overrides: bool,
}

/// Values supplied by the caller when an archive has no config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overrides {
    pub title: String,
    pub artist: String,
    pub bpm: String,
    pub charter: String,
}
