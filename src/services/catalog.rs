use super::asset_locator::RawEntry;
use super::error::ConversionError;
use crate::models::song::Difficulty;
use crate::models::{DifficultyEntry, SongMetadata};
use regex::Regex;

/// A difficulty paired with the chart file backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub entry: DifficultyEntry,
    pub chart: RawEntry,
}

/// Pairs chart files with difficulties.
pub struct CatalogBuilder {
    leading_index: Regex,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            leading_index: Regex::new(r"^(\d+)").expect("Invalid leading index regex"),
        }
    }

    /// Difficulty index encoded in a chart filename, if it is on the ladder.
    ///
    /// # Returns
    /// * `Some(index)` - Leading digits parse to 0..=4
    /// * `None` - No leading digits, or out of range
    pub fn chart_index(&self, file_name: &str) -> Option<u8> {
        let caps = self.leading_index.captures(file_name)?;
        let index: u8 = caps.get(1)?.as_str().parse().ok()?;
        Difficulty::from_class(index).map(|d| d.class())
    }

    /// Build the difficulty catalog in chart archive order.
    ///
    /// # Arguments
    /// * `charts` - Candidate chart files, in archive order
    /// * `metadata` - Resolved song; its declared difficulties gate which charts are kept
    /// * `designer` - Credited when a difficulty has no designer of its own
    pub fn build(
        &self,
        charts: Vec<RawEntry>,
        metadata: &SongMetadata,
        designer: &str,
    ) -> Result<Vec<CatalogEntry>, ConversionError> {
        let mut catalog: Vec<CatalogEntry> = Vec::new();

        for chart in charts {
            let Some(index) = self.chart_index(chart.file_name()) else {
                tracing::warn!("Ignoring chart with no valid difficulty index: {}", chart.path);
                continue;
            };

            if catalog.iter().any(|c| c.entry.rating_class == index) {
                tracing::warn!(
                    "Ignoring second chart for difficulty {}: {}",
                    index,
                    chart.path
                );
                continue;
            }

            let entry = if metadata.difficulties.is_empty() {
                DifficultyEntry::unrated(index, designer)
            } else {
                match metadata
                    .difficulties
                    .iter()
                    .find(|d| d.rating_class == index)
                {
                    Some(declared) => {
                        let mut entry = declared.clone();
                        if entry.chart_designer.trim().is_empty() {
                            entry.chart_designer = designer.to_string();
                        }
                        entry
                    }
                    None => {
                        tracing::warn!(
                            "Ignoring chart for undeclared difficulty {}: {}",
                            index,
                            chart.path
                        );
                        continue;
                    }
                }
            };

            tracing::debug!("Catalogued {} -> {}", chart.path, entry.label());
            catalog.push(CatalogEntry { entry, chart });
        }

        for declared in &metadata.difficulties {
            if !catalog
                .iter()
                .any(|c| c.entry.rating_class == declared.rating_class)
            {
                tracing::warn!(
                    "Declared difficulty {} has no chart file, dropping it",
                    declared.rating_class
                );
            }
        }

        if catalog.is_empty() {
            return Err(ConversionError::NoValidCharts);
        }

        tracing::info!("Difficulty catalog: {} entries", catalog.len());
        Ok(catalog)
    }
}
