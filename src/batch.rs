use std::{
    collections::{BTreeSet, VecDeque},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    cancel::CancelToken,
    capture::CaptureChannel,
    encode::{EncodeJob, EncodeResult, EncodeStatus, ProcessRunner, SystemProcessRunner},
    error::{ShotblastError, ShotblastResult},
    frame::FrameBuffer,
    mask::{self, MaskCompositor},
    presets::PresetResolver,
    request::{PlayblastRequest, ResolvedSettings},
};

/// Frames buffered between the capture stage and the encoder before capture
/// blocks. Keeps memory bounded while the encoder catches up.
const FRAME_QUEUE_DEPTH: usize = 8;

/// Outcome of one submitted request, tagged with its submission index.
#[derive(Debug)]
pub struct RequestOutcome {
    pub index: usize,
    pub camera: String,
    pub result: EncodeResult,
}

/// All outcomes of a batch, in submission order regardless of which worker
/// finished first.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<RequestOutcome>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_success())
    }

    pub fn count(&self, status: EncodeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.status == status)
            .count()
    }
}

/// Runs batches of playblast requests through the capture → mask → encode
/// pipeline.
///
/// Requests are independent: one request's failure never aborts the others
/// unless fail-fast is enabled. All capture, across every worker, funnels
/// through the single [`CaptureChannel`]; concurrency buys overlap between one
/// request's capture and another's encoding, not parallel viewport access.
pub struct BatchOrchestrator {
    channel: CaptureChannel,
    resolver: PresetResolver,
    runner: Arc<dyn ProcessRunner>,
    mask_font: Option<Arc<Vec<u8>>>,
    cancel: CancelToken,
    fail_fast: bool,
}

impl BatchOrchestrator {
    pub fn new(channel: CaptureChannel, resolver: PresetResolver) -> Self {
        Self {
            channel,
            resolver,
            runner: Arc::new(SystemProcessRunner),
            mask_font: None,
            cancel: CancelToken::new(),
            fail_fast: false,
        }
    }

    pub fn with_process_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Font used to draw shot-mask text. Without one, the platform's system
    /// fonts are searched when a masked request first needs it.
    pub fn with_mask_font(mut self, font_bytes: Vec<u8>) -> Self {
        self.mask_font = Some(Arc::new(font_bytes));
        self
    }

    /// Cancel the whole batch on the first failed request.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Use an externally-owned cancellation token instead of a fresh one, so
    /// an embedding host can wire batch cancellation into its own UI.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Shared cancellation handle. Raise it from any thread; unfinished
    /// requests come back `Cancelled`, finished ones keep their results.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every request to completion and collect the outcomes.
    ///
    /// `concurrency` bounds the worker pool; it is clamped to the request
    /// count. Validation (including output-path uniqueness across the batch)
    /// runs up front, before any capture call, and a request that fails it is
    /// recorded `Failed` without entering the pipeline.
    #[tracing::instrument(level = "info", skip_all, fields(requests = requests.len(), concurrency))]
    pub fn run_batch(&self, requests: &[PlayblastRequest], concurrency: usize) -> BatchResult {
        let mut prepared = self.prepare(requests);
        let font = self.resolve_mask_font(&prepared);

        let mut outcomes: Vec<Option<RequestOutcome>> = Vec::new();
        outcomes.resize_with(requests.len(), || None);

        // Settle validation failures on the spot; only valid requests are
        // handed to workers.
        let mut runnable: Vec<(usize, ResolvedSettings)> = Vec::new();
        for (index, slot) in prepared.drain(..).enumerate() {
            match slot {
                Ok(settings) => runnable.push((index, settings)),
                Err(error) => {
                    let path = fallback_output_path(&requests[index]);
                    outcomes[index] = Some(RequestOutcome {
                        index,
                        camera: requests[index].camera.clone(),
                        result: EncodeResult::failed(path, error),
                    });
                }
            }
        }

        let workers = concurrency.clamp(1, runnable.len().max(1));
        let poisoned_dirs: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<(usize, ResolvedSettings)>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<RequestOutcome>();
        for item in runnable {
            // Unbounded and pre-filled; send cannot fail while task_rx lives.
            let _ = task_tx.send(item);
        }
        drop(task_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let done_tx = done_tx.clone();
                let poisoned_dirs = &poisoned_dirs;
                let font = font.clone();
                scope.spawn(move || {
                    while let Ok((index, settings)) = task_rx.recv() {
                        let camera = settings.camera.clone();
                        let result = self.run_request(&settings, font.as_ref(), poisoned_dirs);
                        if self.fail_fast && result.status == EncodeStatus::Failed {
                            tracing::warn!(camera = %camera, "request failed, cancelling batch");
                            self.cancel.cancel();
                        }
                        let _ = done_tx.send(RequestOutcome {
                            index,
                            camera,
                            result,
                        });
                    }
                });
            }
            drop(done_tx);
            for outcome in done_rx {
                let index = outcome.index;
                outcomes[index] = Some(outcome);
            }
        });

        BatchResult {
            outcomes: outcomes.into_iter().flatten().collect(),
        }
    }

    /// Lazy, pull-based variant of [`BatchOrchestrator::run_batch`]: each call
    /// to `next()` runs exactly one request to completion and yields its
    /// outcome, in submission order. Nothing is captured for a request until
    /// it is pulled.
    pub fn iter_batch<'a>(&'a self, requests: &'a [PlayblastRequest]) -> BatchIter<'a> {
        let prepared = self.prepare(requests);
        let font = self.resolve_mask_font(&prepared);
        BatchIter {
            orchestrator: self,
            requests,
            queue: prepared.into_iter().enumerate().collect(),
            font,
            poisoned_dirs: Mutex::new(BTreeSet::new()),
        }
    }

    /// Resolve all requests against the current presets and scene state, then
    /// fail duplicates: two requests writing the same path would otherwise
    /// race on the file.
    fn prepare(
        &self,
        requests: &[PlayblastRequest],
    ) -> Vec<Result<ResolvedSettings, ShotblastError>> {
        let scene = self.channel.scene_name();
        let fps = self.channel.frame_rate();
        let animation_range = self.channel.animation_range();
        let batch_naming = requests.len() > 1;

        let mut prepared: Vec<Result<ResolvedSettings, ShotblastError>> = requests
            .iter()
            .map(|r| {
                r.resolve(&self.resolver, &scene, animation_range, fps, batch_naming)
            })
            .collect();

        let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
        for slot in &mut prepared {
            if let Ok(settings) = slot {
                if !seen.insert(settings.output_path.clone()) {
                    *slot = Err(ShotblastError::validation(format!(
                        "output path '{}' is produced by more than one request",
                        settings.output_path.display()
                    )));
                }
            }
        }
        prepared
    }

    fn resolve_mask_font(
        &self,
        prepared: &[Result<ResolvedSettings, ShotblastError>],
    ) -> Option<Arc<Vec<u8>>> {
        if let Some(font) = &self.mask_font {
            return Some(font.clone());
        }
        let needs_font = prepared
            .iter()
            .any(|p| p.as_ref().is_ok_and(|s| s.mask.is_some()));
        if !needs_font {
            return None;
        }
        match mask::system_font_bytes() {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(e) => {
                tracing::warn!(error = %e, "no mask font available");
                None
            }
        }
    }

    fn run_request(
        &self,
        settings: &ResolvedSettings,
        font: Option<&Arc<Vec<u8>>>,
        poisoned_dirs: &Mutex<BTreeSet<PathBuf>>,
    ) -> EncodeResult {
        if self.cancel.is_cancelled() {
            return EncodeResult::cancelled(&settings.output_path);
        }

        let dir = settings
            .output_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        {
            let poisoned = lock_unpoisoned(poisoned_dirs);
            if poisoned.contains(&dir) {
                return EncodeResult::failed(
                    &settings.output_path,
                    ShotblastError::from(std::io::Error::other(format!(
                        "output directory '{}' already failed for an earlier request",
                        dir.display()
                    ))),
                );
            }
        }
        if let Err(e) = std::fs::create_dir_all(&dir) {
            lock_unpoisoned(poisoned_dirs).insert(dir);
            return EncodeResult::failed(&settings.output_path, ShotblastError::from(e));
        }

        self.run_pipeline(settings, font)
    }

    fn run_pipeline(
        &self,
        settings: &ResolvedSettings,
        font: Option<&Arc<Vec<u8>>>,
    ) -> EncodeResult {
        let mut compositor = match (&settings.mask, font) {
            (Some(_), Some(font)) => match MaskCompositor::new(font.as_ref().clone()) {
                Ok(c) => Some(c),
                Err(e) => return EncodeResult::failed(&settings.output_path, e),
            },
            (Some(_), None) => {
                return EncodeResult::failed(
                    &settings.output_path,
                    ShotblastError::validation(
                        "shot mask requested but no mask font is configured or installed",
                    ),
                );
            }
            (None, _) => None,
        };

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<ShotblastResult<FrameBuffer>>(FRAME_QUEUE_DEPTH);

        std::thread::scope(|scope| {
            let channel = self.channel.clone();
            let cancel = self.cancel.clone();
            let producer = scope.spawn(move || {
                for frame in settings.frame_range.iter() {
                    // Stop issuing capture calls the moment the batch is
                    // cancelled; the encode side reports the cancellation.
                    if cancel.is_cancelled() {
                        break;
                    }
                    let item = channel
                        .capture_with_context(
                            &settings.camera,
                            frame,
                            settings.resolution,
                            &settings.visibility,
                        )
                        .and_then(|(mut buffer, context)| {
                            if let (Some(layout), Some(comp)) =
                                (settings.mask.as_ref(), compositor.as_mut())
                            {
                                comp.composite_into(&mut buffer, layout, &context)?;
                            }
                            Ok(buffer)
                        });
                    let failed = item.is_err();
                    if frame_tx.send(item).is_err() {
                        // Encoder hung up; nothing left to produce for.
                        break;
                    }
                    if failed {
                        break;
                    }
                }
            });

            let job = EncodeJob::new(
                settings.encode.clone(),
                self.runner.as_ref(),
                self.cancel.clone(),
            );
            let result = job.run(
                frame_rx.into_iter(),
                settings.audio.as_ref(),
                &settings.output_path,
            );
            let _ = producer.join();
            result
        })
    }
}

fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn fallback_output_path(request: &PlayblastRequest) -> PathBuf {
    request.output_dir.join(&request.filename)
}

/// See [`BatchOrchestrator::iter_batch`].
pub struct BatchIter<'a> {
    orchestrator: &'a BatchOrchestrator,
    requests: &'a [PlayblastRequest],
    queue: VecDeque<(usize, Result<ResolvedSettings, ShotblastError>)>,
    font: Option<Arc<Vec<u8>>>,
    poisoned_dirs: Mutex<BTreeSet<PathBuf>>,
}

impl Iterator for BatchIter<'_> {
    type Item = RequestOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, slot) = self.queue.pop_front()?;
        let camera = self.requests[index].camera.clone();
        let result = match slot {
            Err(error) => {
                EncodeResult::failed(fallback_output_path(&self.requests[index]), error)
            }
            Ok(settings) => self.orchestrator.run_request(
                &settings,
                self.font.as_ref(),
                &self.poisoned_dirs,
            ),
        };
        if self.orchestrator.fail_fast && result.status == EncodeStatus::Failed {
            self.orchestrator.cancel.cancel();
        }
        Some(RequestOutcome {
            index,
            camera,
            result,
        })
    }
}
