//! Background loader for one parse attempt
//!
//! A [`LoaderJob`] parses a fresh [`Document`] on the runtime's blocking pool. It never
//! touches model state: progress and the terminal result are sent as
//! [`LoaderMessage`]s tagged with the job's generation, and the receiver decides
//! whether they are still current.

use crate::breaker::{Breaker, ProgressSink};
use crate::document::Document;
use crate::utils::lock_or_recover;
use crate::{Result, TrackFileError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle of a loader job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed { succeeded: bool },
    Aborted,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Terminal result of a job
#[derive(Debug)]
pub enum LoadResult {
    Loaded(Document),
    Failed { message: String },
    /// Cancelled on request; not a user-facing error
    Aborted,
}

impl LoadResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

#[derive(Debug)]
pub enum LoaderEvent {
    Progress(f64),
    Finished(LoadResult),
}

/// An event from the job with the given generation
#[derive(Debug)]
pub struct LoaderMessage {
    pub generation: u64,
    pub event: LoaderEvent,
}

/// Forwards throttled progress into the job's channel
struct ChannelSink {
    generation: u64,
    progress_step: f64,
    last_sent: Mutex<f64>,
    tx: UnboundedSender<LoaderMessage>,
}

impl ProgressSink for ChannelSink {
    fn progress(&self, fraction: f64) {
        let mut last_sent = lock_or_recover(&self.last_sent);
        if fraction < 1.0 && fraction - *last_sent < self.progress_step {
            return;
        }
        if fraction <= *last_sent {
            return;
        }
        *last_sent = fraction;
        // The receiver may be gone if the model was dropped
        let _ = self.tx.send(LoaderMessage {
            generation: self.generation,
            event: LoaderEvent::Progress(fraction),
        });
    }
}

/// One background parse attempt
#[derive(Debug)]
pub struct LoaderJob {
    generation: u64,
    progress_step: f64,
    breaker: Breaker,
    state: Arc<Mutex<JobState>>,
    /// Present until the job is started
    document: Option<Document>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl LoaderJob {
    /// Create an idle job owning a new, empty document
    ///
    /// Progress is only forwarded when it advanced by at least `progress_step`
    /// (completion is always forwarded).
    pub fn new(generation: u64, progress_step: f64) -> Self {
        let document = Document::new();
        Self {
            generation,
            progress_step: progress_step.max(0.0),
            breaker: document.breaker(),
            state: Arc::new(Mutex::new(JobState::Idle)),
            document: Some(document),
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> JobState {
        *lock_or_recover(&self.state)
    }

    /// Create a job and start parsing `path` on `runtime`'s blocking pool right away
    pub fn spawn(
        generation: u64,
        progress_step: f64,
        runtime: &Handle,
        path: impl Into<PathBuf>,
        tx: UnboundedSender<LoaderMessage>,
    ) -> Self {
        let document = Document::new();
        let job = Self {
            generation,
            progress_step: progress_step.max(0.0),
            breaker: document.breaker(),
            state: Arc::new(Mutex::new(JobState::Idle)),
            document: None,
        };
        job.launch(document, runtime, path.into(), tx);
        job
    }

    /// Start parsing `path` on `runtime`'s blocking pool
    ///
    /// A job runs at most once; starting it again fails with
    /// [`TrackFileError::AlreadyStarted`] and has no effect.
    pub fn start(
        &mut self,
        runtime: &Handle,
        path: impl Into<PathBuf>,
        tx: UnboundedSender<LoaderMessage>,
    ) -> Result<()> {
        let Some(document) = self.document.take() else {
            return Err(TrackFileError::AlreadyStarted);
        };
        self.launch(document, runtime, path.into(), tx);
        Ok(())
    }

    fn launch(
        &self,
        mut document: Document,
        runtime: &Handle,
        path: PathBuf,
        tx: UnboundedSender<LoaderMessage>,
    ) {
        *lock_or_recover(&self.state) = JobState::Running;

        let generation = self.generation;
        let state = self.state.clone();
        let sink = ChannelSink {
            generation,
            progress_step: self.progress_step,
            last_sent: Mutex::new(0.0),
            tx: tx.clone(),
        };

        tracing::debug!("Loader job {} started for {}", generation, path.display());

        runtime.spawn_blocking(move || {
            let result = match document.parse(&path, &sink) {
                Ok(()) => LoadResult::Loaded(document),
                Err(TrackFileError::Aborted) => LoadResult::Aborted,
                Err(e) => LoadResult::Failed {
                    message: e.to_string(),
                },
            };

            *lock_or_recover(&state) = match &result {
                LoadResult::Loaded(_) => JobState::Completed { succeeded: true },
                LoadResult::Failed { .. } => JobState::Completed { succeeded: false },
                LoadResult::Aborted => JobState::Aborted,
            };
            tracing::debug!("Loader job {} finished: {:?}", generation, *lock_or_recover(&state));

            let _ = tx.send(LoaderMessage {
                generation,
                event: LoaderEvent::Finished(result),
            });
        });
    }

    /// Request cooperative cancellation. Safe to call at any time, any number of times.
    pub fn cancel(&self) {
        self.breaker.request_break();
    }

    pub fn is_cancelled(&self) -> bool {
        self.breaker.is_aborted()
    }
}
