//! Track File Model - Background Loading and Presentation of GPX Files
//!
//! This library loads a single GPX track file off the caller's thread, reports progress
//! while the file is being parsed, and exposes the parsed content as a flat, row-indexed
//! collection of presentable items (tracks first, then waypoints). On demand it derives
//! map overlay shapes from those items.
//!
//! # Architecture
//!
//! - **[`Document`]**: Owns one parsed file; parsing is cancellable through a [`Breaker`]
//! - **[`PresentableItem`]**: A `(kind, id)` key resolving to an [`ItemView`] over a [`Document`]
//! - **[`LoaderJob`]**: One background parse attempt, publishing [`LoaderMessage`]s
//! - **[`PresentationModel`]**: Owns the loaded [`Document`] and its items, with change events
//! - **[`OverlayObject`]**: Renderable line/point shapes built from items
//!
//! # Usage
//!
//! ```ignore
//! let model = PresentationModel::new(tokio::runtime::Handle::current());
//! let mut events = model.subscribe();
//! model.load_file("ride.gpx");
//! while let Ok(event) = events.recv().await {
//!     if let ModelEvent::ParseFinished { .. } = event {
//!         break;
//!     }
//! }
//! for row in 0..model.row_count() {
//!     println!("{:?}", model.get(row));
//! }
//! ```

mod breaker;
mod document;
mod item;
mod loader;
mod model;
mod overlay;
mod record;
pub mod utils;

// Public API exports
pub use breaker::{Breaker, NoProgress, ProgressReader, ProgressSink};
pub use document::Document;
pub use item::{ItemKind, ItemView, PresentableItem, TrackItem, WaypointItem};
pub use loader::{JobState, LoadResult, LoaderEvent, LoaderJob, LoaderMessage};
pub use model::{DataState, ModelConfig, ModelEvent, PresentationModel, Snapshot};
pub use overlay::{
    OVERLAY_NODE_WAYPOINT_TYPE, OVERLAY_WAY_HIGHLIGHTED_TYPE, OVERLAY_WAY_TRACK_TYPE, OverlayKind,
    OverlayLine, OverlayObject, OverlayPoint, OverlaySelection, custom_type_set,
};
pub use record::{ItemRecord, Role, RoleValue, role_names};
pub use utils::TrackColor;

/// Error types for loading and parsing track files
#[derive(Debug, thiserror::Error)]
pub enum TrackFileError {
    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing aborted")]
    Aborted,

    #[error("Document already parsed: {0}")]
    AlreadyParsed(String),

    #[error("Loader job already started")]
    AlreadyStarted,
}

impl TrackFileError {
    /// Whether this error is the result of a cancellation request rather than bad input
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, TrackFileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let _: fn(tokio::runtime::Handle) -> PresentationModel = PresentationModel::new;
        let _: fn() -> ModelConfig = ModelConfig::default;
        let _: fn() -> Document = Document::new;
    }

    #[test]
    fn test_aborted_is_distinct() {
        assert!(TrackFileError::Aborted.is_aborted());
        assert!(!TrackFileError::AlreadyStarted.is_aborted());
        let io = TrackFileError::from(std::io::Error::other("boom"));
        assert!(!io.is_aborted());
        assert_eq!(io.to_string(), "IO error: boom");
    }
}
