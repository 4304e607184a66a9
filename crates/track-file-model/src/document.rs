//! Document storage and parsing module
//!
//! A [`Document`] owns the parsed content of one GPX file. It is created per parse
//! request, filled exactly once, and immutable afterwards.

use crate::breaker::{Breaker, ProgressReader, ProgressSink};
use crate::{Result, TrackFileError, utils};
use std::path::{Path, PathBuf};

/// One parsed GPX file
#[derive(Debug, Default)]
pub struct Document {
    /// Set once, when a parse completes successfully
    valid: bool,
    /// Set once, when any parse attempt completes
    completed: bool,
    /// Source path of the file
    path: PathBuf,
    /// The parsed GPX data (empty until a successful parse)
    gpx_data: gpx::Gpx,
    /// Last parser error message, if any
    error: Option<String>,
    /// Cancellation handle for the parse
    breaker: Breaker,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Document {
    /// Create an empty, not yet parsed document with a fresh cancellation handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an already-valid document from in-memory GPX data
    pub fn from_gpx(path: impl Into<PathBuf>, gpx_data: gpx::Gpx) -> Self {
        let mut document = Self {
            valid: true,
            completed: true,
            path: path.into(),
            gpx_data,
            ..Self::default()
        };
        document.drop_invalid_waypoints();
        document
    }

    /// Parse the GPX file at `path`, streaming progress to `sink`
    ///
    /// Failure is an ordinary return value: content errors come back as
    /// [`TrackFileError::GpxParse`]/[`TrackFileError::Io`], cancellation as
    /// [`TrackFileError::Aborted`]. A document can only be parsed once.
    pub fn parse(&mut self, path: impl AsRef<Path>, sink: &dyn ProgressSink) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("document::parse");

        if self.completed {
            return Err(TrackFileError::AlreadyParsed(
                self.path.display().to_string(),
            ));
        }
        self.path = path.as_ref().to_path_buf();

        let result = self.read_gpx(sink);
        self.completed = true;

        match result {
            Ok(gpx_data) => {
                self.gpx_data = gpx_data;
                self.drop_invalid_waypoints();
                self.valid = true;
                sink.progress(1.0);
                tracing::debug!(
                    "Parsed {}: {} tracks, {} waypoints",
                    self.path.display(),
                    self.gpx_data.tracks.len(),
                    self.gpx_data.waypoints.len()
                );
                Ok(())
            }
            // The parser only sees an I/O error; report the break itself
            Err(_) if self.breaker.is_aborted() => {
                tracing::debug!("Parse of {} aborted", self.path.display());
                Err(TrackFileError::Aborted)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Failed to parse {}: {}", self.path.display(), message);
                sink.error(&message);
                self.error = Some(message);
                Err(e)
            }
        }
    }

    fn read_gpx(&self, sink: &dyn ProgressSink) -> Result<gpx::Gpx> {
        if self.breaker.is_aborted() {
            return Err(TrackFileError::Aborted);
        }
        let file = std::fs::File::open(&self.path)?;
        let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        let reader = ProgressReader::new(file, total_bytes, self.breaker.clone(), sink);
        let gpx_data = gpx::read(std::io::BufReader::new(reader))?;
        Ok(gpx_data)
    }

    /// Enforce the waypoint invariant: every coordinate is present and finite
    fn drop_invalid_waypoints(&mut self) {
        let before = self.gpx_data.waypoints.len();
        self.gpx_data.waypoints.retain(|waypoint| {
            let point = waypoint.point();
            utils::is_valid_coordinate(point.y(), point.x())
        });
        let dropped = before - self.gpx_data.waypoints.len();
        if dropped > 0 {
            tracing::warn!(
                "Skipping {} waypoints with invalid coordinates in {}",
                dropped,
                self.path.display()
            );
        }
    }

    /// Request the in-flight parse to stop as soon as feasible
    pub fn request_cancel(&self) {
        self.breaker.request_break();
    }

    /// A handle that can cancel this document's parse from another thread
    pub fn breaker(&self) -> Breaker {
        self.breaker.clone()
    }

    /// Whether a cancellation was requested
    pub fn is_aborted(&self) -> bool {
        self.breaker.is_aborted()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File-level name from the GPX metadata, empty if absent or not parsed
    pub fn name(&self) -> String {
        self.metadata()
            .and_then(|m| m.name.clone())
            .unwrap_or_default()
    }

    /// File-level description from the GPX metadata, empty if absent or not parsed
    pub fn description(&self) -> String {
        self.metadata()
            .and_then(|m| m.description.clone())
            .unwrap_or_default()
    }

    fn metadata(&self) -> Option<&gpx::Metadata> {
        if !self.valid {
            return None;
        }
        self.gpx_data.metadata.as_ref()
    }

    /// Last parser error message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// All tracks, in file order
    #[inline]
    pub fn tracks(&self) -> &[gpx::Track] {
        &self.gpx_data.tracks
    }

    /// All waypoints, in file order
    #[inline]
    pub fn waypoints(&self) -> &[gpx::Waypoint] {
        &self.gpx_data.waypoints
    }

    /// Access the raw GPX data
    #[inline]
    pub fn gpx_data(&self) -> &gpx::Gpx {
        &self.gpx_data
    }
}
