use super::asset_locator::RawEntry;
use super::catalog::CatalogEntry;
use super::descriptors::{
    INDEX_FILE, OUTPUT_AUDIO, OUTPUT_CHART_EXTENSION, OUTPUT_COVER, PROJECT_FILE,
    pack_image_file, pack_settings_file,
};
use super::error::ConversionError;
use crate::models::PackageDescriptor;
use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Extension of the output container
pub const OUTPUT_EXTENSION: &str = "arcpkg";

/// Payload files packaged next to the synthesized records.
#[derive(Debug, Clone, Copy)]
pub struct PackageInputs<'a> {
    pub cover: &'a [u8],
    pub audio: &'a [u8],
    /// Source config, copied under its own filename
    pub config: Option<&'a RawEntry>,
    /// Background image as (output filename, bytes)
    pub background: Option<(&'a str, &'a [u8])>,
    pub catalog: &'a [CatalogEntry],
}

/// Writes the output container.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveWriter;

impl ArchiveWriter {
    pub fn new() -> Self {
        Self
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
            .last_modified_time(zip::DateTime::default())
    }

    /// Build the container in memory.
    ///
    /// Entry order and timestamps are fixed, so the same inputs always give
    /// the same bytes.
    pub fn write(
        &self,
        descriptor: &PackageDescriptor,
        inputs: &PackageInputs<'_>,
    ) -> Result<Vec<u8>, ConversionError> {
        let pack_id = &descriptor.pack_id;
        let song_id = &descriptor.song_id;

        let mut zip = PackageBuilder::new();

        zip.directory(pack_id)?;
        let pack_settings = serde_yaml_ng::to_string(&descriptor.pack_settings)?;
        zip.file(
            &format!("{}/{}", pack_id, pack_settings_file(pack_id)),
            pack_settings.as_bytes(),
        )?;
        zip.file(
            &format!("{}/{}", pack_id, pack_image_file(pack_id)),
            inputs.cover,
        )?;

        // A song named after its pack shares the pack folder
        if song_id != pack_id {
            zip.directory(song_id)?;
        }
        zip.file(&format!("{}/{}", song_id, OUTPUT_COVER), inputs.cover)?;
        zip.file(&format!("{}/{}", song_id, OUTPUT_AUDIO), inputs.audio)?;
        if let Some(config) = inputs.config {
            zip.file(
                &format!("{}/{}", song_id, config.file_name()),
                &config.bytes,
            )?;
        }
        let project = serde_yaml_ng::to_string(&descriptor.project)?;
        zip.file(&format!("{}/{}", song_id, PROJECT_FILE), project.as_bytes())?;
        if let Some((name, bytes)) = inputs.background {
            zip.file(&format!("{}/{}", song_id, name), bytes)?;
        }
        for item in inputs.catalog {
            let name = item.entry.chart_file_name(OUTPUT_CHART_EXTENSION);
            zip.file(&format!("{}/{}", song_id, name), &item.chart.bytes)?;
        }

        let index = serde_yaml_ng::to_string(&descriptor.index)?;
        zip.file(INDEX_FILE, index.as_bytes())?;

        let bytes = zip.finish()?;
        tracing::info!(
            "Package created, size: {:.2}MB",
            bytes.len() as f64 / 1024.0 / 1024.0
        );
        Ok(bytes)
    }
}

/// Thin wrapper mapping zip and I/O failures to packaging errors.
struct PackageBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl PackageBuilder {
    fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: ArchiveWriter::options(),
        }
    }

    fn directory(&mut self, name: &str) -> Result<(), ConversionError> {
        self.writer
            .add_directory(format!("{}/", name), self.options)
            .map_err(|e| ConversionError::Packaging(format!("{}/: {}", name, e)))
    }

    fn file(&mut self, path: &str, bytes: &[u8]) -> Result<(), ConversionError> {
        self.writer
            .start_file(path, self.options)
            .map_err(|e| ConversionError::Packaging(format!("{}: {}", path, e)))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| ConversionError::Packaging(format!("{}: {}", path, e)))?;
        tracing::debug!("Packaged {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ConversionError> {
        self.writer
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| ConversionError::Packaging(e.to_string()))
    }
}

/// Output filename: `<sanitizedTitle>_<YYYY-MM-DDTHH-MM-SS>.arcpkg`
pub fn output_file_name(sanitized_title: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}.{}",
        sanitized_title,
        now.format("%Y-%m-%dT%H-%M-%S"),
        OUTPUT_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DifficultyEntry;
    use crate::services::descriptors::DescriptorSynthesizer;
    use crate::services::metadata::MetadataResolver;
    use chrono::TimeZone;
    use std::io::Read;
    use zip::ZipArchive;

    fn build() -> Vec<u8> {
        build_with_set("pk")
    }

    fn build_with_set(set: &str) -> Vec<u8> {
        let config = RawEntry::new(
            "song/slst.txt",
            format!(r#"{{"songs": [{{"id": "song", "title": "T", "set": "{}"}}]}}"#, set)
                .into_bytes(),
        );
        let metadata = MetadataResolver::new("pack001").parse_config(&config).unwrap();
        let catalog = vec![CatalogEntry {
            entry: DifficultyEntry::unrated(2, "me"),
            chart: RawEntry::new("song/2.aff", b"chart".to_vec()),
        }];
        let descriptor = DescriptorSynthesizer::new("me")
            .synthesize(&metadata, &catalog, Some("custom_bg.jpg"))
            .unwrap();

        ArchiveWriter::new()
            .write(
                &descriptor,
                &PackageInputs {
                    cover: b"cover",
                    audio: b"audio",
                    config: Some(&config),
                    background: Some(("custom_bg.jpg", b"bg")),
                    catalog: &catalog,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_layout() {
        let bytes = build();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        for expected in [
            "pk/pk.yml",
            "pk/1080_select_pk.png",
            "song/base.jpg",
            "song/base.ogg",
            "song/slst.txt",
            "song/project.arcproj",
            "song/custom_bg.jpg",
            "song/2.aff",
            "index.yml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let mut index = String::new();
        archive
            .by_name("index.yml")
            .unwrap()
            .read_to_string(&mut index)
            .unwrap();
        assert!(index.contains("identifier: me.pk"));
        assert!(index.contains("identifier: me.song"));
        assert!(index.contains("type: level"));

        let mut pack_image = Vec::new();
        archive
            .by_name("pk/1080_select_pk.png")
            .unwrap()
            .read_to_end(&mut pack_image)
            .unwrap();
        assert_eq!(pack_image, b"cover");
    }

    #[test]
    fn test_song_sharing_pack_folder() {
        let bytes = build_with_set("song");
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();

        assert_eq!(names.iter().filter(|n| **n == "song/").count(), 1);
        for expected in ["song/song.yml", "song/1080_select_song.png", "song/2.aff"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        assert_eq!(build(), build());
    }

    #[test]
    fn test_output_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            output_file_name("A_B_C", now),
            "A_B_C_2024-03-09T14-05-07.arcpkg"
        );
    }
}
