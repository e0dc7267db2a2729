//! Data models for arcpack.
//!
//! - [`ConverterConfig`]: converter settings loaded from `arcpack.yaml`
//! - [`SongMetadata`], [`DifficultyEntry`], [`Difficulty`]: the normalized song
//! - [`PackageDescriptor`] and the records it holds: what gets written out
//! - [`BatchState`]: batch progress held by [`StateManager`](crate::state::StateManager)

pub mod batch_state;
pub mod config;
pub mod package;
pub mod song;

pub use batch_state::{BatchState, ItemStatus};
pub use config::{AssetNames, BackgroundSettings, ConverterConfig, DEFAULT_MAX_INPUT_BYTES};
pub use package::{
    ChartBlock, ManifestEntry, ManifestKind, PackEntry, PackList, PackSettings,
    PackageDescriptor, ProjectDescriptor, Skin, SongList, SongRecord,
};
pub use song::{Difficulty, DifficultyEntry, Overrides, SkinSide, SongMetadata};
