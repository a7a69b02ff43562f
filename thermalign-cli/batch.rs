use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thermalign_core::{FeatureConfig, RegistrationConfig};
use thermalign_register::{BlendError, Registrar, Registration, clamp_alpha};

use crate::config::AppConfig;
use crate::debug::{draw_inlier_keypoints, keypoints_file_name};
use crate::error::{BatchError, ConfigError};
use crate::pairs::{ImagePair, PairResolver, aligned_file_name};

/// Cooperative stop request, checked before each pair
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pairs attempted so far out of the total; written by the worker only
#[derive(Debug, Default)]
pub struct BatchProgress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl BatchProgress {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Completed share in `[0, 1]`; zero before the total is known
    pub fn fraction(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            total => self.completed() as f32 / total as f32,
        }
    }

    fn start(&self, total: usize) {
        self.completed.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
    }

    fn advance(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
    FailedToStart,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Idle => "idle",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::Cancelled => "cancelled",
            BatchState::FailedToStart => "failed to start",
        };
        f.write_str(name)
    }
}

/// Why one pair produced no output
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingFile(PathBuf),
    DecodeFailure { path: PathBuf, message: String },
    NoDescriptors { visible: usize, thermal: usize },
    InsufficientMatches { found: usize, required: usize },
    HomographyUnavailable,
    CompositeFailure(BlendError),
    WriteFailure { path: PathBuf, message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingFile(path) => write!(f, "missing file: {}", path.display()),
            SkipReason::DecodeFailure { path, message } => {
                write!(f, "decode failure: {}: {}", path.display(), message)
            }
            SkipReason::NoDescriptors { visible, thermal } => {
                write!(f, "no descriptors (visible {}, thermal {})", visible, thermal)
            }
            SkipReason::InsufficientMatches { found, required } => {
                write!(f, "insufficient matches ({} of {} required)", found, required)
            }
            SkipReason::HomographyUnavailable => write!(f, "homography unavailable"),
            SkipReason::CompositeFailure(e) => write!(f, "composite failure: {}", e),
            SkipReason::WriteFailure { path, message } => {
                write!(f, "write failure: {}: {}", path.display(), message)
            }
        }
    }
}

/// What happened to one attempted pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Processed { output: PathBuf, inliers: usize },
    Skipped(SkipReason),
}

/// Notifications emitted while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    PairStarted { index: usize, sequence_id: String },
    PairFinished { index: usize, sequence_id: String, outcome: PairOutcome },
    Finished { state: BatchState },
}

/// Observer forwarding every event into a channel; send errors are ignored
pub fn channel_observer(tx: Sender<BatchEvent>) -> impl FnMut(&BatchEvent) {
    move |event: &BatchEvent| {
        let _ = tx.send(event.clone());
    }
}

/// Immutable settings for one batch run
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Thermal layer weight; out-of-range values are clamped when blending
    pub alpha: f32,
    pub features: FeatureConfig,
    pub registration: RegistrationConfig,
    pub resolver: PairResolver,
    pub aligned_suffix: String,
    pub debug_keypoints: bool,
}

impl BatchJob {
    /// Job with default settings
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let defaults = AppConfig::default();
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            alpha: defaults.alpha,
            features: defaults.features,
            registration: defaults.registration,
            resolver: PairResolver::default(),
            aligned_suffix: defaults.aligned_suffix,
            debug_keypoints: defaults.debug_keypoints,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let input_dir = cfg.input_dir.clone().ok_or(ConfigError::Missing("input_dir"))?;
        let output_dir = cfg.output_dir.clone().ok_or(ConfigError::Missing("output_dir"))?;
        Ok(Self {
            input_dir,
            output_dir,
            alpha: clamp_alpha(cfg.alpha),
            features: cfg.features.clone(),
            registration: cfg.registration.clone(),
            resolver: PairResolver::new(&cfg.thermal_suffix, &cfg.visible_suffix, &cfg.extensions),
            aligned_suffix: cfg.aligned_suffix.clone(),
            debug_keypoints: cfg.debug_keypoints,
        })
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = clamp_alpha(alpha);
        self
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub state: BatchState,
    pub total_pairs: usize,
    pub processed: Vec<(ImagePair, PathBuf)>,
    pub skipped: Vec<(ImagePair, SkipReason)>,
    pub not_attempted: Vec<ImagePair>,
    pub unmatched_thermal: usize,
    pub unmatched_visible: usize,
    pub elapsed: Duration,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch {} in {:.2?}", self.state, self.elapsed)?;
        writeln!(f, "  pairs found:   {}", self.total_pairs)?;
        writeln!(f, "  processed:     {}", self.processed.len())?;
        writeln!(f, "  skipped:       {}", self.skipped.len())?;
        for (pair, reason) in &self.skipped {
            writeln!(f, "    {}: {}", pair.sequence_id, reason)?;
        }
        if !self.not_attempted.is_empty() {
            writeln!(f, "  not attempted: {}", self.not_attempted.len())?;
        }
        if self.unmatched_thermal + self.unmatched_visible > 0 {
            writeln!(
                f,
                "  unmatched:     {} thermal, {} visible",
                self.unmatched_thermal, self.unmatched_visible
            )?;
        }
        Ok(())
    }
}

/// Runs a [`BatchJob`] sequentially: `Idle -> Running -> {Completed, Cancelled}`,
/// or `Idle -> FailedToStart`.
pub struct BatchOrchestrator {
    job: BatchJob,
    state: BatchState,
    cancel: CancellationToken,
    progress: Arc<BatchProgress>,
}

impl BatchOrchestrator {
    pub fn new(job: BatchJob) -> Self {
        Self {
            job,
            state: BatchState::Idle,
            cancel: CancellationToken::new(),
            progress: Arc::new(BatchProgress::default()),
        }
    }

    /// Use an externally owned token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<BatchProgress> {
        Arc::clone(&self.progress)
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn job(&self) -> &BatchJob {
        &self.job
    }

    /// Enter `FailedToStart`; reporting the error is left to the caller
    fn fail(&mut self, err: BatchError) -> Result<BatchReport, BatchError> {
        self.state = BatchState::FailedToStart;
        Err(err)
    }

    /// Process every resolved pair, reporting to `observer` as it goes
    pub fn run(&mut self, observer: &mut dyn FnMut(&BatchEvent)) -> Result<BatchReport, BatchError> {
        if self.state != BatchState::Idle {
            return Err(BatchError::AlreadyRun(self.state));
        }
        let started = Instant::now();

        let registrar = match Registrar::new(self.job.features.clone(), self.job.registration.clone()) {
            Ok(registrar) => registrar,
            Err(e) => return self.fail(e.into()),
        };
        let set = match self.job.resolver.resolve(&self.job.input_dir) {
            Ok(set) => set,
            Err(e) => return self.fail(e),
        };
        if set.pairs.is_empty() {
            return self.fail(BatchError::NoPairs(self.job.input_dir.clone()));
        }
        if let Err(source) = std::fs::create_dir_all(&self.job.output_dir) {
            return self.fail(BatchError::OutputDirectory {
                path: self.job.output_dir.clone(),
                source,
            });
        }

        let total = set.pairs.len();
        self.state = BatchState::Running;
        self.progress.start(total);
        log::info!(
            "Processing {} pairs from {} ({} thermal, {} visible unmatched)",
            total,
            self.job.input_dir.display(),
            set.unmatched_thermal,
            set.unmatched_visible
        );
        observer(&BatchEvent::Started { total });

        let mut report = BatchReport {
            state: BatchState::Running,
            total_pairs: total,
            processed: Vec::new(),
            skipped: Vec::new(),
            not_attempted: Vec::new(),
            unmatched_thermal: set.unmatched_thermal,
            unmatched_visible: set.unmatched_visible,
            elapsed: Duration::ZERO,
        };

        let mut pairs = set.pairs.into_iter().enumerate();
        while let Some((index, pair)) = pairs.next() {
            if self.cancel.is_cancelled() {
                log::info!("Batch cancelled before pair {}", pair.sequence_id);
                report.not_attempted.push(pair);
                report.not_attempted.extend(pairs.by_ref().map(|(_, p)| p));
                self.state = BatchState::Cancelled;
                break;
            }

            observer(&BatchEvent::PairStarted {
                index,
                sequence_id: pair.sequence_id.clone(),
            });

            let outcome = match self.process_pair(&registrar, &pair) {
                Ok((output, inliers)) => {
                    log::info!(
                        "[{}/{}] {} -> {} ({} inliers)",
                        index + 1,
                        total,
                        pair.sequence_id,
                        output.display(),
                        inliers
                    );
                    report.processed.push((pair.clone(), output.clone()));
                    PairOutcome::Processed { output, inliers }
                }
                Err(reason) => {
                    log::warn!("[{}/{}] Skipping {}: {}", index + 1, total, pair.sequence_id, reason);
                    report.skipped.push((pair.clone(), reason.clone()));
                    PairOutcome::Skipped(reason)
                }
            };

            self.progress.advance();
            observer(&BatchEvent::PairFinished {
                index,
                sequence_id: pair.sequence_id,
                outcome,
            });
        }

        if self.state == BatchState::Running {
            self.state = BatchState::Completed;
        }
        report.state = self.state;
        report.elapsed = started.elapsed();
        log::info!(
            "Batch {}: {} processed, {} skipped, {} not attempted",
            self.state,
            report.processed.len(),
            report.skipped.len(),
            report.not_attempted.len()
        );
        observer(&BatchEvent::Finished { state: self.state });

        Ok(report)
    }

    /// Register, composite and write one pair
    fn process_pair(&self, registrar: &Registrar, pair: &ImagePair) -> Result<(PathBuf, usize), SkipReason> {
        for path in [&pair.thermal, &pair.visible] {
            if !path.is_file() {
                return Err(SkipReason::MissingFile(path.clone()));
            }
        }
        let thermal = load_rgb(&pair.thermal)?;
        let visible = load_rgb(&pair.visible)?;

        let alignment = match registrar.align(&visible, &thermal) {
            Registration::Aligned(alignment) => alignment,
            Registration::InsufficientFeatures { visible, thermal } => {
                return Err(SkipReason::NoDescriptors { visible, thermal });
            }
            Registration::InsufficientMatches { found, required } => {
                return Err(SkipReason::InsufficientMatches { found, required });
            }
            Registration::HomographyUnavailable => return Err(SkipReason::HomographyUnavailable),
        };

        let overlay = registrar
            .composite(&visible, &thermal, &alignment, self.job.alpha)
            .map_err(SkipReason::CompositeFailure)?;

        let name = aligned_file_name(&pair.thermal, &self.job.aligned_suffix).ok_or_else(|| {
            SkipReason::WriteFailure {
                path: pair.thermal.clone(),
                message: "cannot derive output name".to_string(),
            }
        })?;
        let output = self.job.output_dir.join(name);
        save_rgb(&overlay, &output)?;

        if self.job.debug_keypoints {
            let debug_path = self.job.output_dir.join(keypoints_file_name(&output));
            if let Err(e) = draw_inlier_keypoints(&visible, &alignment).save(&debug_path) {
                log::warn!("Failed to write {}: {}", debug_path.display(), e);
            }
        }

        Ok((output, alignment.homography.inlier_count()))
    }
}

fn load_rgb(path: &Path) -> Result<RgbImage, SkipReason> {
    image::open(path).map(|img| img.to_rgb8()).map_err(|e| SkipReason::DecodeFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn save_rgb(img: &RgbImage, path: &Path) -> Result<(), SkipReason> {
    img.save(path).map_err(|e| SkipReason::WriteFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
