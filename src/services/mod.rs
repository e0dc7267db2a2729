//! Services module - the conversion stages.
//!
//! Each stage is a plain struct with no I/O beyond what it is handed, so the
//! [`pipeline`](crate::pipeline) can drive them one item at a time and tests can
//! exercise them in isolation.
//!
//! # Components
//!
//! - [`ArchiveReader`]: decodes the input ZIP into path-keyed entries, dropping
//!   directories and archiver junk
//! - [`AssetLocator`]: finds cover, audio, config, background and chart files,
//!   whether the archive is flat or nested
//! - [`MetadataResolver`]: parses the song config (two accepted shapes) or builds
//!   metadata from caller overrides
//! - [`CatalogBuilder`]: pairs chart files with difficulties
//! - [`DescriptorSynthesizer`]: builds packlist, songlist, project, pack settings
//!   and manifest records
//! - [`ArchiveWriter`]: writes the `.arcpkg` container
//! - [`UsageCounter`]: best-effort conversion counter
//!
//! All stage failures are [`ConversionError`]s.

pub mod archive_reader;
pub mod archive_writer;
pub mod asset_locator;
pub mod catalog;
pub mod descriptors;
pub mod error;
pub mod metadata;
pub mod usage_counter;

pub use archive_reader::{ArchiveEntries, ArchiveReader, normalize_entry_path};
pub use archive_writer::{ArchiveWriter, OUTPUT_EXTENSION, PackageInputs, output_file_name};
pub use asset_locator::{AssetLocator, AssetSet, RawEntry, common_base_path};
pub use catalog::{CatalogBuilder, CatalogEntry};
pub use descriptors::{DescriptorSynthesizer, packlist_json, songlist_json};
pub use error::ConversionError;
pub use metadata::{
    ConfigSchema, MetadataResolver, Resolution, resolve_schema, sanitize_file_component,
};
pub use usage_counter::{FileUsageCounter, UsageCounter};
