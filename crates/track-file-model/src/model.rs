//! PresentationModel - Row-indexed view over the most recently loaded document
//!
//! The model owns the loaded [`Document`] and the derived item list, runs at most one
//! [`LoaderJob`] at a time and publishes every state change as a [`ModelEvent`].
//!
//! # Concurrency
//!
//! All shared fields live behind one mutex. Loader jobs never touch them: they send
//! [`LoaderMessage`]s to a dispatcher task, which takes the lock only to publish.
//! Each job is tagged with a generation; `load_file` and `clear_data` bump it, so
//! messages of a superseded job are dropped on arrival. Building the item list,
//! projecting records and building overlays happen outside the lock.

use crate::document::Document;
use crate::item::{ItemView, PresentableItem};
use crate::loader::{JobState, LoadResult, LoaderEvent, LoaderJob, LoaderMessage};
use crate::overlay::{self, OverlayObject, OverlaySelection};
use crate::record::{ItemRecord, Role, RoleValue};
use crate::utils::lock_or_recover;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};

/// Outcome of the last completed load attempt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataState {
    #[default]
    Blank,
    Failed,
    Loaded,
}

/// Configuration for the presentation model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Capacity of the event channel; slower subscribers see `Lagged`
    pub event_capacity: usize,
    /// Minimum progress advance that is published (completion always is)
    pub progress_step: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            progress_step: 0.01,
        }
    }
}

/// Change notifications, in the order the state changed
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    /// A new load began; everything before it belongs to earlier loads
    LoadStarted { path: PathBuf },
    ParsingChanged(bool),
    ProgressChanged(f64),
    ParseFinished { succeeded: bool, aborted: bool },
    /// The item list was rebuilt (`true`) or discarded after a failure (`false`)
    Loaded(bool),
    CountChanged(usize),
    Cleared,
}

/// A consistent `(document, items)` pair
///
/// Holding a snapshot keeps its document alive, so views resolved from it stay
/// valid even after the model loads another file.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    document: Option<Arc<Document>>,
    items: Arc<[PresentableItem]>,
    data_state: DataState,
}

impl Snapshot {
    /// Present an already parsed document without going through a loader job
    pub fn from_document(document: Document) -> Self {
        let data_state = if document.is_valid() {
            DataState::Loaded
        } else {
            DataState::Blank
        };
        let items: Arc<[PresentableItem]> = PresentableItem::collect(&document).into();
        Self {
            document: Some(Arc::new(document)),
            items,
            data_state,
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn data_state(&self) -> DataState {
        self.data_state
    }

    #[inline]
    pub fn items(&self) -> &[PresentableItem] {
        &self.items
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_deref()
    }

    /// The item at `row`, `None` outside `0..row_count()`
    pub fn item(&self, row: usize) -> Option<PresentableItem> {
        self.items.get(row).copied()
    }

    pub fn view(&self, row: usize) -> Option<ItemView<'_>> {
        let item = self.item(row)?;
        item.resolve(self.document.as_deref()?)
    }

    /// Owned record of `row`, `None` outside `0..row_count()`
    pub fn get(&self, row: usize) -> Option<ItemRecord> {
        self.view(row).map(|view| ItemRecord::from_view(&view))
    }

    pub fn data(&self, row: usize, role: Role) -> Option<RoleValue> {
        self.get(row).map(|record| record.value(role))
    }

    /// Overlay shapes for the selection; empty without a loaded document
    pub fn overlay_objects(&self, selection: OverlaySelection) -> Vec<OverlayObject> {
        match self.document.as_deref() {
            Some(document) => overlay::create_overlay_objects(document, &self.items, selection),
            None => Vec::new(),
        }
    }
}

struct ModelState {
    generation: u64,
    data_state: DataState,
    parsing: bool,
    progress: f64,
    path: Option<PathBuf>,
    error: Option<String>,
    document: Option<Arc<Document>>,
    items: Arc<[PresentableItem]>,
    job: Option<LoaderJob>,
}

impl ModelState {
    fn new() -> Self {
        Self {
            generation: 0,
            data_state: DataState::Blank,
            parsing: false,
            progress: 0.0,
            path: None,
            error: None,
            document: None,
            items: Arc::from(Vec::new()),
            job: None,
        }
    }

    /// Cancel the current job, invalidate its messages and drop all loaded data
    ///
    /// Returns the item count before the reset.
    fn reset(&mut self) -> usize {
        if let Some(job) = self.job.take() {
            if job.state().is_running() {
                tracing::debug!("Cancelling loader job {}", job.generation());
            }
            job.cancel();
        }
        let old_count = self.items.len();
        self.generation += 1;
        self.data_state = DataState::Blank;
        self.parsing = false;
        self.progress = 0.0;
        self.path = None;
        self.error = None;
        self.document = None;
        self.items = Arc::from(Vec::new());
        old_count
    }
}

struct Shared {
    state: Mutex<ModelState>,
    events: broadcast::Sender<ModelEvent>,
}

impl Shared {
    fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            state: Mutex::new(ModelState::new()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ModelState> {
        lock_or_recover(&self.state)
    }

    /// Publish an event. Callers hold the state lock, so events follow state order.
    fn emit(&self, event: ModelEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn apply(&self, message: LoaderMessage) {
        match message.event {
            LoaderEvent::Progress(fraction) => {
                let mut state = self.lock();
                if message.generation != state.generation || !state.parsing {
                    return;
                }
                if fraction <= state.progress {
                    return;
                }
                state.progress = fraction;
                self.emit(ModelEvent::ProgressChanged(fraction));
            }
            LoaderEvent::Finished(result) => self.complete(message.generation, result),
        }
    }

    fn complete(&self, generation: u64, result: LoadResult) {
        #[cfg(feature = "profiling")]
        profiling::scope!("model::complete");

        // Compute outside the lock, publish inside
        let result = match result {
            LoadResult::Loaded(document) if document.is_valid() => {
                let items: Arc<[PresentableItem]> = PresentableItem::collect(&document).into();
                Ok((Arc::new(document), items))
            }
            LoadResult::Loaded(document) => Err(Some(
                document
                    .error()
                    .unwrap_or("Document is not valid")
                    .to_string(),
            )),
            LoadResult::Failed { message } => Err(Some(message)),
            LoadResult::Aborted => Err(None),
        };

        let mut state = self.lock();
        if generation != state.generation {
            tracing::debug!(
                "Dropping result of superseded loader job {} (current {})",
                generation,
                state.generation
            );
            return;
        }
        state.parsing = false;
        self.emit(ModelEvent::ParsingChanged(false));

        match result {
            Ok((document, items)) => {
                tracing::info!(
                    "Loaded {}: {} tracks, {} waypoints",
                    document.path().display(),
                    document.tracks().len(),
                    document.waypoints().len()
                );
                let count = items.len();
                state.document = Some(document);
                state.items = items;
                state.data_state = DataState::Loaded;
                state.error = None;
                if state.progress < 1.0 {
                    state.progress = 1.0;
                    self.emit(ModelEvent::ProgressChanged(1.0));
                }
                self.emit(ModelEvent::ParseFinished {
                    succeeded: true,
                    aborted: false,
                });
                self.emit(ModelEvent::CountChanged(count));
                self.emit(ModelEvent::Loaded(true));
            }
            Err(Some(message)) => {
                tracing::warn!("Failed to load track file: {}", message);
                let old_count = state.items.len();
                state.document = None;
                state.items = Arc::from(Vec::new());
                state.data_state = DataState::Failed;
                state.error = Some(message);
                self.emit(ModelEvent::ParseFinished {
                    succeeded: false,
                    aborted: false,
                });
                if old_count != 0 {
                    self.emit(ModelEvent::CountChanged(0));
                }
                self.emit(ModelEvent::Loaded(false));
            }
            Err(None) => {
                tracing::debug!("Loader job {} aborted", generation);
                self.emit(ModelEvent::ParseFinished {
                    succeeded: false,
                    aborted: true,
                });
            }
        }
    }
}

/// Forward loader messages into the model until it is dropped
async fn dispatch(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<LoaderMessage>) {
    while let Some(message) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.apply(message);
    }
    tracing::trace!("Loader dispatcher stopped");
}

/// Row-indexed presentation of the most recently loaded track file
///
/// Rows `0..T` are the document's tracks in file order, rows `T..T+W` its waypoints.
/// All methods take `&self` and may be called from any thread.
pub struct PresentationModel {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<LoaderMessage>,
    runtime: Handle,
    config: ModelConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PresentationModel {
    /// Create a blank model whose loader jobs run on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self::with_config(runtime, ModelConfig::default())
    }

    pub fn with_config(runtime: Handle, config: ModelConfig) -> Self {
        let shared = Arc::new(Shared::new(config.event_capacity));
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(dispatch(Arc::downgrade(&shared), rx));
        Self {
            shared,
            tx,
            runtime,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.shared.events.subscribe()
    }

    /// Start loading `path`, superseding any load in progress
    ///
    /// The model is cleared to blank synchronously; the outcome arrives later as
    /// a [`ModelEvent::ParseFinished`].
    pub fn load_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.shared.lock();
        let was_parsing = state.parsing;
        let old_count = state.reset();

        tracing::info!("Loading track file {}", path.display());
        self.shared.emit(ModelEvent::LoadStarted { path: path.clone() });
        if old_count != 0 {
            self.shared.emit(ModelEvent::CountChanged(0));
        }

        let job = LoaderJob::spawn(
            state.generation,
            self.config.progress_step,
            &self.runtime,
            &path,
            self.tx.clone(),
        );
        state.path = Some(path);
        state.parsing = true;
        state.job = Some(job);
        if !was_parsing {
            self.shared.emit(ModelEvent::ParsingChanged(true));
        }
        self.shared.emit(ModelEvent::ProgressChanged(0.0));
    }

    /// Request cancellation of the load in progress, if any
    ///
    /// The job finishes on its own and reports an aborted completion; the loaded
    /// data state is left untouched.
    pub fn cancel_load(&self) {
        let state = self.shared.lock();
        if let Some(job) = state.job.as_ref() {
            if state.parsing {
                tracing::debug!("Cancel requested for loader job {}", job.generation());
                job.cancel();
            }
        }
    }

    /// Discard the loaded document, cancelling any load in progress
    pub fn clear_data(&self) {
        let mut state = self.shared.lock();
        let was_parsing = state.parsing;
        let old_count = state.reset();

        tracing::debug!("Clearing model data");
        if was_parsing {
            self.shared.emit(ModelEvent::ParsingChanged(false));
        }
        if old_count != 0 {
            self.shared.emit(ModelEvent::CountChanged(0));
        }
        self.shared.emit(ModelEvent::Cleared);
    }

    /// A consistent copy of the current document and items
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        Snapshot {
            document: state.document.clone(),
            items: state.items.clone(),
            data_state: state.data_state,
        }
    }

    pub fn row_count(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// The item at `row`, `None` outside `0..row_count()`
    pub fn item(&self, row: usize) -> Option<PresentableItem> {
        self.shared.lock().items.get(row).copied()
    }

    /// Owned record of `row`, `None` outside `0..row_count()`
    pub fn get(&self, row: usize) -> Option<ItemRecord> {
        self.snapshot().get(row)
    }

    /// Value of one role of `row`, `None` outside `0..row_count()`
    pub fn data(&self, row: usize, role: Role) -> Option<RoleValue> {
        self.snapshot().data(row, role)
    }

    /// Overlay shapes for all items or a single highlighted one
    pub fn create_overlay_objects(&self, selection: OverlaySelection) -> Vec<OverlayObject> {
        self.snapshot().overlay_objects(selection)
    }

    pub fn parsing(&self) -> bool {
        self.shared.lock().parsing
    }

    /// Parse progress from 0.0 to 1.0; resets to 0.0 on each load
    pub fn progress(&self) -> f64 {
        self.shared.lock().progress
    }

    pub fn data_state(&self) -> DataState {
        self.shared.lock().data_state
    }

    /// Whether the last completed load failed
    pub fn failure(&self) -> bool {
        self.data_state() == DataState::Failed
    }

    /// Whether a valid document is loaded
    pub fn file_valid(&self) -> bool {
        self.shared
            .lock()
            .document
            .as_ref()
            .is_some_and(|document| document.is_valid())
    }

    /// Path of the file being loaded or last loaded
    pub fn file_path(&self) -> Option<PathBuf> {
        self.shared.lock().path.clone()
    }

    /// Metadata name of the loaded file, empty without one
    pub fn name(&self) -> String {
        self.shared
            .lock()
            .document
            .as_ref()
            .map(|document| document.name())
            .unwrap_or_default()
    }

    /// Metadata description of the loaded file, empty without one
    pub fn description(&self) -> String {
        self.shared
            .lock()
            .document
            .as_ref()
            .map(|document| document.description())
            .unwrap_or_default()
    }

    /// Message of the last failed load
    pub fn error_message(&self) -> Option<String> {
        self.shared.lock().error.clone()
    }

    /// State of the current loader job, `Idle` without one
    pub fn loader_state(&self) -> JobState {
        self.shared
            .lock()
            .job
            .as_ref()
            .map_or(JobState::Idle, |job| job.state())
    }
}

impl Drop for PresentationModel {
    fn drop(&mut self) {
        if let Some(job) = self.shared.lock().job.take() {
            job.cancel();
        }
    }
}
