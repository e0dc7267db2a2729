//! Batch driver: runs jobs strictly in submission order.
//!
//! A suspended job halts the whole queue. Supplying its input resumes it and
//! then continues with the remaining jobs.

use super::{
    BackgroundResponse, ConversionArtifact, ConversionJob, ConversionOutcome, Converter,
    InputRequest, ResumeError,
};
use crate::metrics::Metrics;
use crate::models::{ItemStatus, Overrides};
use crate::services::{ConversionError, UsageCounter};
use crate::state::StateManager;
use std::collections::VecDeque;
use std::sync::Arc;

/// Answers suspended jobs' requests, e.g. from CLI flags or a prompt.
#[cfg_attr(test, mockall::automock)]
pub trait InputProvider {
    /// Song details for an archive without a config. `None` abandons the item.
    fn request_overrides(&mut self, request: &InputRequest) -> Option<Overrides>;

    /// Background image for an archive without one.
    fn request_background_image(&mut self, request: &InputRequest) -> BackgroundResponse;
}

/// Final result of one batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub label: String,
    pub result: Result<ConversionArtifact, ConversionError>,
}

impl ItemReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Where the queue stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchProgress {
    /// Halted on an item waiting for input
    Suspended(InputRequest),
    /// One item settled and more are queued (step-wise runs only)
    Advanced,
    /// Every submitted item reached Done or Failed
    Finished,
}

/// In-order queue of conversion jobs.
pub struct BatchQueue {
    converter: Converter,
    pending: VecDeque<ConversionJob>,
    suspended: Option<ConversionJob>,
    reports: Vec<ItemReport>,
    counter: Option<Box<dyn UsageCounter>>,
    state: StateManager,
    metrics: Arc<Metrics>,
    running: bool,
}

impl BatchQueue {
    pub fn new(converter: Converter, state: StateManager, metrics: Arc<Metrics>) -> Self {
        Self {
            converter,
            pending: VecDeque::new(),
            suspended: None,
            reports: Vec::new(),
            counter: None,
            state,
            metrics,
            running: false,
        }
    }

    /// Count successful conversions with `counter` (best effort).
    pub fn with_counter(mut self, counter: Box<dyn UsageCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn push(&mut self, job: ConversionJob) {
        tracing::debug!("Queued {}", job.label());
        self.pending.push_back(job);
        if self.running {
            self.state.add_items(1);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.suspended.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The job the queue is halted on, if any
    pub fn suspended(&self) -> Option<&ConversionJob> {
        self.suspended.as_ref()
    }

    /// Reports of finished items, in completion order, since the last take
    pub fn take_reports(&mut self) -> Vec<ItemReport> {
        std::mem::take(&mut self.reports)
    }

    /// Process queued jobs until the queue is empty or a job suspends.
    pub fn run(&mut self) -> BatchProgress {
        loop {
            match self.run_one() {
                BatchProgress::Advanced => continue,
                progress => return progress,
            }
        }
    }

    /// Process at most one queued job.
    ///
    /// Lets the caller handle each report (e.g. write it to disk) before the
    /// next item starts.
    pub fn run_one(&mut self) -> BatchProgress {
        if let Some(job) = &self.suspended {
            if let Some(request) = job.pending_request() {
                return BatchProgress::Suspended(request.clone());
            }
        }

        if !self.running {
            self.running = true;
            tracing::info!("Starting batch of {} items", self.pending.len());
            self.state.start_batch(self.pending.len());
        }

        if let Some(mut job) = self.pending.pop_front() {
            self.state
                .update_progress(job.label().to_string(), job.stage());
            let outcome = self.converter.advance(&mut job);
            if let Some(request) = self.settle(job, outcome) {
                return BatchProgress::Suspended(request);
            }
        }
        self.after_settle()
    }

    /// Answer a manual-input request, then continue the queue.
    pub fn supply_overrides(
        &mut self,
        overrides: Option<Overrides>,
    ) -> Result<BatchProgress, ResumeError> {
        self.resume(|converter, job| converter.supply_overrides(job, overrides))?;
        Ok(self.run())
    }

    /// Answer a background request, then continue the queue.
    pub fn supply_background(
        &mut self,
        response: BackgroundResponse,
    ) -> Result<BatchProgress, ResumeError> {
        self.resume(|converter, job| converter.supply_background(job, response))?;
        Ok(self.run())
    }

    /// Fail the suspended job, then continue the queue.
    pub fn abandon(&mut self, reason: &str) -> Result<BatchProgress, ResumeError> {
        self.resume(|converter, job| converter.abandon(job, reason))?;
        Ok(self.run())
    }

    /// Answer `request` from `provider` and settle the suspended job only.
    ///
    /// Returns `Suspended` if the job needs more input, otherwise whether
    /// other items are still queued. A job that cannot be resumed is abandoned.
    pub fn answer(
        &mut self,
        request: &InputRequest,
        provider: &mut dyn InputProvider,
    ) -> BatchProgress {
        tracing::info!("Requesting input for {}", request.item());
        let resumed = match request {
            InputRequest::ManualInput { .. } => {
                let overrides = provider.request_overrides(request);
                self.resume(|converter, job| converter.supply_overrides(job, overrides))
            }
            InputRequest::Background { .. } => {
                let response = provider.request_background_image(request);
                self.resume(|converter, job| converter.supply_background(job, response))
            }
        };

        let resumed = resumed.or_else(|e| {
            tracing::error!("Could not resume {}: {}", request.item(), e);
            let reason = e.to_string();
            self.resume(|converter, job| converter.abandon(job, &reason))
        });

        match resumed {
            Ok(Some(request)) => BatchProgress::Suspended(request),
            Ok(None) | Err(_) => self.after_settle(),
        }
    }

    /// Run the queue to completion, answering every request from `provider`.
    pub fn drive(&mut self, provider: &mut dyn InputProvider) -> Vec<ItemReport> {
        let mut progress = self.run();

        while let BatchProgress::Suspended(request) = progress {
            progress = match self.answer(&request, provider) {
                BatchProgress::Advanced => self.run(),
                other => other,
            };
        }

        self.take_reports()
    }

    /// Settle the suspended job with `supply`. Returns its next request if it
    /// suspended again.
    fn resume<F>(&mut self, supply: F) -> Result<Option<InputRequest>, ResumeError>
    where
        F: FnOnce(&Converter, &mut ConversionJob) -> Result<ConversionOutcome, ResumeError>,
    {
        let mut job = self.suspended.take().ok_or(ResumeError::NothingSuspended)?;

        let outcome = match supply(&self.converter, &mut job) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.suspended = Some(job);
                return Err(e);
            }
        };

        self.state.resume_item();
        Ok(self.settle(job, outcome))
    }

    /// Close the batch once nothing is queued.
    fn after_settle(&mut self) -> BatchProgress {
        if !self.pending.is_empty() {
            return BatchProgress::Advanced;
        }
        if self.running {
            self.running = false;
            self.state.finish_batch();
            tracing::info!("Batch finished: {}", self.state.read(|s| s.summary()));
        }
        BatchProgress::Finished
    }

    /// Record an outcome. Returns the request if the job suspended.
    fn settle(&mut self, job: ConversionJob, outcome: ConversionOutcome) -> Option<InputRequest> {
        let label = job.label().to_string();

        match outcome {
            ConversionOutcome::AwaitingInput(request) => {
                self.metrics.record_suspended();
                self.state.suspend_item(label);
                self.suspended = Some(job);
                Some(request)
            }
            ConversionOutcome::Done(artifact) => {
                self.state.update_progress(label.clone(), job.stage());
                self.metrics.record_converted(artifact.size());
                self.metrics.record_conversion_time(job.elapsed());
                self.bump_counter();
                self.state.add_item_result(
                    label.clone(),
                    ItemStatus::Converted,
                    artifact.file_name.clone(),
                    artifact.size(),
                );
                self.reports.push(ItemReport {
                    label,
                    result: Ok(artifact),
                });
                None
            }
            ConversionOutcome::Failed(error) => {
                self.state.update_progress(label.clone(), job.stage());
                self.metrics.record_failed();
                self.metrics.record_conversion_time(job.elapsed());
                self.state.add_item_result(
                    label.clone(),
                    ItemStatus::Failed,
                    error.to_string(),
                    0,
                );
                self.reports.push(ItemReport {
                    label,
                    result: Err(error),
                });
                None
            }
        }
    }

    fn bump_counter(&self) {
        let Some(counter) = &self.counter else {
            return;
        };
        match counter.increment_and_fetch() {
            Ok(total) => tracing::debug!("Conversions so far: {}", total),
            Err(e) => {
                self.metrics.record_counter_error();
                tracing::warn!("Failed to update usage counter: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConverterConfig;
    use crate::services::usage_counter::MockUsageCounter;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn complete(id: &str) -> Vec<u8> {
        let config = format!(r#"{{"songs": [{{"id": "{}", "title": "{}"}}]}}"#, id, id);
        zip_of(&[
            ("base.jpg", b"c"),
            ("base.ogg", b"a"),
            ("slst.txt", config.as_bytes()),
            ("bg.jpg", b"bg"),
            ("2.aff", b"x"),
        ])
    }

    fn queue() -> BatchQueue {
        BatchQueue::new(
            Converter::new(ConverterConfig::default()),
            StateManager::new(),
            Arc::new(Metrics::new()),
        )
    }

    #[test]
    fn test_failures_do_not_stop_the_queue() {
        let mut queue = queue();
        queue.push(ConversionJob::new("bad.zip", b"junk".to_vec()));
        queue.push(ConversionJob::new("good.zip", complete("good")));

        assert_eq!(queue.run(), BatchProgress::Finished);
        let reports = queue.take_reports();
        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].result,
            Err(ConversionError::ArchiveDecode(_))
        ));
        assert!(reports[1].is_success());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_counter_failures_are_swallowed() {
        let mut counter = MockUsageCounter::new();
        counter
            .expect_increment_and_fetch()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("disk full")));

        let metrics = Arc::new(Metrics::new());
        let mut queue = BatchQueue::new(
            Converter::new(ConverterConfig::default()),
            StateManager::new(),
            Arc::clone(&metrics),
        )
        .with_counter(Box::new(counter));
        queue.push(ConversionJob::new("good.zip", complete("good")));

        assert_eq!(queue.run(), BatchProgress::Finished);
        assert!(queue.take_reports()[0].is_success());
        assert_eq!(
            metrics
                .counter_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_resume_without_suspension() {
        let mut queue = queue();
        assert_eq!(
            queue.supply_overrides(None),
            Err(ResumeError::NothingSuspended)
        );
    }

    #[test]
    fn test_drive_uses_provider() {
        let mut provider = MockInputProvider::new();
        provider
            .expect_request_overrides()
            .times(1)
            .returning(|_| {
                Some(Overrides {
                    title: "Manual".to_string(),
                    ..Default::default()
                })
            });
        provider.expect_request_background_image().never();

        let mut queue = queue();
        queue.push(ConversionJob::new(
            "manual.zip",
            zip_of(&[("base.jpg", b"c"), ("base.ogg", b"a"), ("0.aff", b"x")]),
        ));

        let reports = queue.drive(&mut provider);
        assert_eq!(reports.len(), 1);
        let artifact = reports[0].result.as_ref().unwrap();
        assert_eq!(artifact.descriptor.project.charts[0].charter, "Unknown_User");
    }

    #[test]
    fn test_run_one_settles_a_single_item() {
        let mut queue = queue();
        queue.push(ConversionJob::new("a.zip", complete("a")));
        queue.push(ConversionJob::new("b.zip", complete("b")));

        assert_eq!(queue.run_one(), BatchProgress::Advanced);
        let first = queue.take_reports();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, "a.zip");
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.run_one(), BatchProgress::Finished);
        let second = queue.take_reports();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].label, "b.zip");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_answer_settles_only_the_suspended_item() {
        let mut provider = MockInputProvider::new();
        provider
            .expect_request_overrides()
            .times(1)
            .returning(|_| {
                Some(Overrides {
                    title: "Manual".to_string(),
                    ..Default::default()
                })
            });

        let mut queue = queue();
        queue.push(ConversionJob::new(
            "manual.zip",
            zip_of(&[("base.jpg", b"c"), ("base.ogg", b"a"), ("0.aff", b"x")]),
        ));
        queue.push(ConversionJob::new("next.zip", complete("next")));

        let BatchProgress::Suspended(request) = queue.run_one() else {
            panic!("expected the first item to suspend");
        };
        assert!(queue.take_reports().is_empty());

        assert_eq!(queue.answer(&request, &mut provider), BatchProgress::Advanced);
        let reports = queue.take_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].label, "manual.zip");
        assert!(reports[0].is_success());
        assert!(queue.suspended().is_none());

        assert_eq!(queue.run_one(), BatchProgress::Finished);
        assert_eq!(queue.take_reports()[0].label, "next.zip");
    }

    #[test]
    fn test_answer_abandons_on_declined_input() {
        let mut provider = MockInputProvider::new();
        provider.expect_request_overrides().times(1).returning(|_| None);

        let mut queue = queue();
        queue.push(ConversionJob::new(
            "manual.zip",
            zip_of(&[("base.jpg", b"c"), ("base.ogg", b"a"), ("0.aff", b"x")]),
        ));

        let BatchProgress::Suspended(request) = queue.run_one() else {
            panic!("expected the item to suspend");
        };
        assert_eq!(queue.answer(&request, &mut provider), BatchProgress::Finished);
        let reports = queue.take_reports();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_success());
    }
}
