//! Pipeline module - drives one archive through the conversion stages.
//!
//! A [`ConversionJob`] carries everything resolved so far for one input, so a
//! job suspended for caller input resumes exactly where it stopped. The
//! [`Converter`] holds the stateless stage services and is shared across jobs.
//!
//! ```text
//! Pending -> Reading -> AssetDiscovery -> MetadataResolution
//!         -> DifficultyResolution -> DescriptorSynthesis -> Packaging -> Done
//!
//! MetadataResolution -> AwaitingManualInput     (no config, prompts enabled)
//! MetadataResolution -> AwaitingBackgroundInput (no background found)
//! any stage          -> Failed
//! ```

pub mod batch;
pub mod io;

pub use batch::{BatchProgress, BatchQueue, InputProvider, ItemReport};

use crate::models::{ConverterConfig, Overrides, PackageDescriptor, SongMetadata};
use crate::services::{
    ArchiveEntries, ArchiveReader, ArchiveWriter, AssetLocator, AssetSet, CatalogBuilder,
    CatalogEntry, ConversionError, DescriptorSynthesizer, MetadataResolver, PackageInputs,
    RawEntry, Resolution, output_file_name,
};
use std::time::{Duration, Instant};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Where a job is in the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ConversionStage {
    Pending,
    Reading,
    AssetDiscovery,
    MetadataResolution,
    AwaitingManualInput,
    AwaitingBackgroundInput,
    DifficultyResolution,
    DescriptorSynthesis,
    Packaging,
    Done,
    Failed,
}

impl ConversionStage {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::AwaitingManualInput | Self::AwaitingBackgroundInput)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What a suspended job needs from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRequest {
    /// No config file; title, artist, bpm and charter are needed.
    ManualInput {
        item: String,
        /// Config filenames that were looked for
        missing: Vec<String>,
    },
    /// No background image matched the naming heuristic.
    Background { item: String },
}

impl InputRequest {
    pub fn item(&self) -> &str {
        match self {
            Self::ManualInput { item, .. } | Self::Background { item } => item,
        }
    }
}

/// Caller answer to [`InputRequest::Background`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundResponse {
    Provided(Vec<u8>),
    /// Package without a background. Not asked again for this item.
    Skipped,
}

/// A finished package.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub descriptor: PackageDescriptor,
}

impl ConversionArtifact {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Result of advancing a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Done(ConversionArtifact),
    Failed(ConversionError),
    AwaitingInput(InputRequest),
}

/// Input supplied to a job that is not waiting for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResumeError {
    #[error("Item is at stage {actual}, not {expected}")]
    NotAwaiting {
        expected: ConversionStage,
        actual: ConversionStage,
    },

    #[error("No item is waiting for input")]
    NothingSuspended,
}

/// Per-item scratch state. Never shared between items.
#[derive(Debug, Default)]
pub struct ConversionContext {
    input: Option<Vec<u8>>,
    declared_size: Option<u64>,
    entries: Option<ArchiveEntries>,
    assets: Option<AssetSet>,
    overrides: Option<Overrides>,
    metadata: Option<SongMetadata>,
    background: Option<RawEntry>,
    background_answered: bool,
    catalog: Option<Vec<CatalogEntry>>,
    descriptor: Option<PackageDescriptor>,
}

impl ConversionContext {
    pub fn metadata(&self) -> Option<&SongMetadata> {
        self.metadata.as_ref()
    }

    pub fn overrides(&self) -> Option<&Overrides> {
        self.overrides.as_ref()
    }
}

/// One input archive moving through the pipeline.
#[derive(Debug)]
pub struct ConversionJob {
    label: String,
    stage: ConversionStage,
    history: Vec<ConversionStage>,
    pending: Option<InputRequest>,
    outcome: Option<ConversionOutcome>,
    elapsed: Duration,
    context: ConversionContext,
}

impl ConversionJob {
    /// Create a job for raw archive bytes.
    ///
    /// # Arguments
    /// * `label` - Name used in logs and reports, usually the input filename
    /// * `bytes` - The whole input archive
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            stage: ConversionStage::Pending,
            history: vec![ConversionStage::Pending],
            pending: None,
            outcome: None,
            elapsed: Duration::ZERO,
            context: ConversionContext {
                input: Some(bytes),
                ..Default::default()
            },
        }
    }

    /// Create a job for an input known only by its size, without loading it.
    ///
    /// Used when the size check can be made up front; the job fails at the
    /// size gate if `size` is over the limit.
    pub fn from_declared_size(label: impl Into<String>, size: u64) -> Self {
        let mut job = Self::new(label, Vec::new());
        job.context.input = None;
        job.context.declared_size = Some(size);
        job
    }

    /// Preset overrides used if the archive turns out to have no config.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.context.overrides = Some(overrides);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> ConversionStage {
        self.stage
    }

    /// Every stage entered so far, in order
    pub fn history(&self) -> &[ConversionStage] {
        &self.history
    }

    /// The request a suspended job is waiting on
    pub fn pending_request(&self) -> Option<&InputRequest> {
        self.pending.as_ref()
    }

    pub fn context(&self) -> &ConversionContext {
        &self.context
    }

    /// Time spent inside the pipeline, excluding time suspended.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn enter(&mut self, stage: ConversionStage) {
        tracing::debug!("[{}] {} -> {}", self.label, self.stage, stage);
        self.stage = stage;
        self.history.push(stage);
    }
}

enum Step {
    Next(ConversionStage),
    Suspend(ConversionStage, InputRequest),
    Finished(ConversionArtifact),
}

/// The conversion stages, configured once and shared by every job.
pub struct Converter {
    config: ConverterConfig,
    reader: ArchiveReader,
    locator: AssetLocator,
    resolver: MetadataResolver,
    catalog: CatalogBuilder,
    synthesizer: DescriptorSynthesizer,
    writer: ArchiveWriter,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            reader: ArchiveReader::new(config.skip_marker),
            locator: AssetLocator::new(
                config.assets.clone(),
                config.background.clone(),
                config.prompt_for_overrides,
            ),
            resolver: MetadataResolver::new(config.default_pack_id.clone()),
            catalog: CatalogBuilder::new(),
            synthesizer: DescriptorSynthesizer::new(config.user_id.clone()),
            writer: ArchiveWriter::new(),
            config,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run a job until it finishes, fails or needs caller input.
    ///
    /// Calling this on a finished job returns the cached outcome; on a
    /// suspended job it repeats the pending request.
    pub fn advance(&self, job: &mut ConversionJob) -> ConversionOutcome {
        if let Some(outcome) = &job.outcome {
            return outcome.clone();
        }
        if let Some(request) = &job.pending {
            return ConversionOutcome::AwaitingInput(request.clone());
        }

        let started = Instant::now();
        let outcome = loop {
            match self.step(job) {
                Ok(Step::Next(stage)) => job.enter(stage),
                Ok(Step::Suspend(stage, request)) => {
                    job.enter(stage);
                    tracing::info!("[{}] Waiting for input at {}", job.label, stage);
                    job.pending = Some(request.clone());
                    break ConversionOutcome::AwaitingInput(request);
                }
                Ok(Step::Finished(artifact)) => {
                    job.enter(ConversionStage::Done);
                    tracing::info!(
                        "[{}] Converted to {} ({:.2}MB)",
                        job.label,
                        artifact.file_name,
                        artifact.size() as f64 / 1024.0 / 1024.0
                    );
                    break ConversionOutcome::Done(artifact);
                }
                Err(e) => {
                    tracing::error!("[{}] Failed at {}: {}", job.label, job.stage, e);
                    job.enter(ConversionStage::Failed);
                    break ConversionOutcome::Failed(e);
                }
            }
        };
        job.elapsed += started.elapsed();

        if job.stage.is_terminal() {
            job.context = ConversionContext::default();
            job.outcome = Some(outcome.clone());
        }
        outcome
    }

    /// Resume a job waiting for overrides. `None` abandons it.
    pub fn supply_overrides(
        &self,
        job: &mut ConversionJob,
        overrides: Option<Overrides>,
    ) -> Result<ConversionOutcome, ResumeError> {
        expect_stage(job, ConversionStage::AwaitingManualInput)?;
        job.pending = None;

        let Some(overrides) = overrides else {
            return Ok(self.fail(job, ConversionError::Abandoned(
                "no song details supplied".to_string(),
            )));
        };
        job.context.overrides = Some(overrides);
        job.enter(ConversionStage::MetadataResolution);
        Ok(self.advance(job))
    }

    /// Resume a job waiting for a background image.
    pub fn supply_background(
        &self,
        job: &mut ConversionJob,
        response: BackgroundResponse,
    ) -> Result<ConversionOutcome, ResumeError> {
        expect_stage(job, ConversionStage::AwaitingBackgroundInput)?;
        job.pending = None;
        job.context.background_answered = true;

        match response {
            BackgroundResponse::Provided(bytes) => {
                tracing::info!(
                    "[{}] Using supplied background image ({} bytes)",
                    job.label,
                    bytes.len()
                );
                job.context.background = Some(RawEntry::new(
                    self.config.background.supplied_file_name.clone(),
                    bytes,
                ));
            }
            BackgroundResponse::Skipped => {
                tracing::info!("[{}] Continuing without a background image", job.label);
            }
        }

        job.enter(ConversionStage::DifficultyResolution);
        Ok(self.advance(job))
    }

    /// Fail a suspended job.
    pub fn abandon(
        &self,
        job: &mut ConversionJob,
        reason: &str,
    ) -> Result<ConversionOutcome, ResumeError> {
        if !job.stage.is_suspended() {
            return Err(ResumeError::NothingSuspended);
        }
        job.pending = None;
        Ok(self.fail(job, ConversionError::Abandoned(reason.to_string())))
    }

    fn fail(&self, job: &mut ConversionJob, error: ConversionError) -> ConversionOutcome {
        tracing::error!("[{}] {}", job.label, error);
        job.enter(ConversionStage::Failed);
        job.context = ConversionContext::default();
        let outcome = ConversionOutcome::Failed(error);
        job.outcome = Some(outcome.clone());
        outcome
    }

    fn step(&self, job: &mut ConversionJob) -> Result<Step, ConversionError> {
        let label = job.label.clone();
        let ctx = &mut job.context;

        match job.stage {
            ConversionStage::Pending => {
                let size = ctx
                    .declared_size
                    .unwrap_or_else(|| ctx.input.as_ref().map_or(0, Vec::len) as u64);
                if size > self.config.max_input_bytes {
                    return Err(ConversionError::SizeLimitExceeded {
                        size,
                        limit: self.config.max_input_bytes,
                    });
                }
                tracing::info!(
                    "[{}] Starting conversion ({:.2}MB)",
                    label,
                    size as f64 / 1024.0 / 1024.0
                );
                Ok(Step::Next(ConversionStage::Reading))
            }

            ConversionStage::Reading => {
                let input = ctx.input.take().ok_or_else(|| missing_state("input"))?;
                ctx.entries = Some(self.reader.read(&input)?);
                Ok(Step::Next(ConversionStage::AssetDiscovery))
            }

            ConversionStage::AssetDiscovery => {
                let entries = ctx.entries.take().unwrap_or_default();
                ctx.assets = Some(self.locator.locate(entries)?);
                Ok(Step::Next(ConversionStage::MetadataResolution))
            }

            ConversionStage::MetadataResolution => {
                let assets = ctx.assets.as_mut().ok_or_else(|| missing_state("assets"))?;

                let metadata = match self
                    .resolver
                    .resolve(assets.config.as_ref(), ctx.overrides.as_ref())?
                {
                    Resolution::Resolved(metadata) => metadata,
                    Resolution::NeedsOverrides if self.config.prompt_for_overrides => {
                        let missing = self
                            .config
                            .assets
                            .config_candidates()
                            .map(str::to_string)
                            .collect();
                        return Ok(Step::Suspend(
                            ConversionStage::AwaitingManualInput,
                            InputRequest::ManualInput {
                                item: label,
                                missing,
                            },
                        ));
                    }
                    Resolution::NeedsOverrides => {
                        return Err(ConversionError::MissingAssets(vec![
                            self.config.assets.primary_config.clone(),
                        ]));
                    }
                };

                if ctx.background.is_none() {
                    ctx.background = assets.background.take();
                }
                let needs_background = ctx.background.is_none()
                    && !ctx.background_answered
                    && !metadata.from_overrides
                    && self.config.background.prompt;
                ctx.metadata = Some(metadata);

                if needs_background {
                    return Ok(Step::Suspend(
                        ConversionStage::AwaitingBackgroundInput,
                        InputRequest::Background { item: label },
                    ));
                }
                Ok(Step::Next(ConversionStage::DifficultyResolution))
            }

            ConversionStage::DifficultyResolution => {
                let metadata = ctx.metadata.as_ref().ok_or_else(|| missing_state("metadata"))?;
                let assets = ctx.assets.as_mut().ok_or_else(|| missing_state("assets"))?;

                let designer = ctx
                    .overrides
                    .as_ref()
                    .filter(|_| metadata.from_overrides)
                    .map(|o| o.charter.trim())
                    .filter(|c| !c.is_empty())
                    .unwrap_or(&self.config.user_id);

                let charts = std::mem::take(&mut assets.charts);
                ctx.catalog = Some(self.catalog.build(charts, metadata, designer)?);
                Ok(Step::Next(ConversionStage::DescriptorSynthesis))
            }

            ConversionStage::DescriptorSynthesis => {
                let metadata = ctx.metadata.as_ref().ok_or_else(|| missing_state("metadata"))?;
                let catalog = ctx.catalog.as_deref().ok_or_else(|| missing_state("catalog"))?;
                let background = ctx.background.as_ref().map(RawEntry::file_name);

                ctx.descriptor = Some(self.synthesizer.synthesize(metadata, catalog, background)?);
                Ok(Step::Next(ConversionStage::Packaging))
            }

            ConversionStage::Packaging => {
                let metadata = ctx.metadata.as_ref().ok_or_else(|| missing_state("metadata"))?;
                let assets = ctx.assets.as_ref().ok_or_else(|| missing_state("assets"))?;
                let catalog = ctx.catalog.as_deref().ok_or_else(|| missing_state("catalog"))?;
                let descriptor = ctx
                    .descriptor
                    .take()
                    .ok_or_else(|| missing_state("descriptor"))?;

                let bytes = self.writer.write(
                    &descriptor,
                    &PackageInputs {
                        cover: &assets.cover.bytes,
                        audio: &assets.audio.bytes,
                        config: assets.config.as_ref(),
                        background: ctx
                            .background
                            .as_ref()
                            .map(|b| (b.file_name(), b.bytes.as_slice())),
                        catalog,
                    },
                )?;

                Ok(Step::Finished(ConversionArtifact {
                    file_name: output_file_name(&metadata.sanitized_title, chrono::Utc::now()),
                    bytes,
                    descriptor,
                }))
            }

            stage @ (ConversionStage::AwaitingManualInput
            | ConversionStage::AwaitingBackgroundInput
            | ConversionStage::Done
            | ConversionStage::Failed) => Err(ConversionError::Packaging(format!(
                "cannot advance from {}",
                stage
            ))),
        }
    }
}

fn expect_stage(job: &ConversionJob, expected: ConversionStage) -> Result<(), ResumeError> {
    if job.stage == expected {
        Ok(())
    } else {
        Err(ResumeError::NotAwaiting {
            expected,
            actual: job.stage,
        })
    }
}

fn missing_state(what: &str) -> ConversionError {
    ConversionError::Packaging(format!("{} not resolved before use", what))
}
