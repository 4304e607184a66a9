//! Presentable items: typed keys into a [`Document`] and the views they resolve to
//!
//! A [`PresentableItem`] holds no reference into the document. It is resolved against
//! a borrowed [`Document`] when needed, so a view can never outlive its backing data.

use crate::document::Document;
use crate::utils::{self, TrackColor};
use geo::{Coord, LineString, Point};

/// The two kinds of presentable items
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ItemKind {
    Track = 0,
    Waypoint = 1,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Waypoint => "waypoint",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "track" | "trk" => Ok(Self::Track),
            "waypoint" | "wpt" => Ok(Self::Waypoint),
            other => Err(format!("unknown item kind: {other}")),
        }
    }
}

/// Identity of one track or waypoint inside a document
///
/// `id` is the 0-based index within the item's own kind; tracks and waypoints are
/// separate id spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresentableItem {
    pub kind: ItemKind,
    pub id: usize,
}

impl PresentableItem {
    pub fn track(id: usize) -> Self {
        Self {
            kind: ItemKind::Track,
            id,
        }
    }

    pub fn waypoint(id: usize) -> Self {
        Self {
            kind: ItemKind::Waypoint,
            id,
        }
    }

    /// All items of a document: tracks in file order, then waypoints in file order
    ///
    /// Returns nothing for a document that did not parse successfully.
    pub fn collect(document: &Document) -> Vec<Self> {
        if !document.is_valid() {
            return Vec::new();
        }
        let tracks = (0..document.tracks().len()).map(Self::track);
        let waypoints = (0..document.waypoints().len()).map(Self::waypoint);
        tracks.chain(waypoints).collect()
    }

    /// Resolve against a document; `None` if the id is out of range
    pub fn resolve<'a>(&self, document: &'a Document) -> Option<ItemView<'a>> {
        match self.kind {
            ItemKind::Track => document.tracks().get(self.id).map(|track| {
                ItemView::Track(TrackItem {
                    track,
                    id: self.id,
                })
            }),
            ItemKind::Waypoint => document.waypoints().get(self.id).map(|waypoint| {
                ItemView::Waypoint(WaypointItem {
                    waypoint,
                    id: self.id,
                })
            }),
        }
    }
}

/// A resolved item
#[derive(Clone, Copy, Debug)]
pub enum ItemView<'a> {
    Track(TrackItem<'a>),
    Waypoint(WaypointItem<'a>),
}

impl ItemView<'_> {
    pub fn id(&self) -> usize {
        match self {
            Self::Track(t) => t.id(),
            Self::Waypoint(w) => w.id(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Track(_) => ItemKind::Track,
            Self::Waypoint(_) => ItemKind::Waypoint,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Track(t) => t.name(),
            Self::Waypoint(w) => w.name(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Track(t) => t.description(),
            Self::Waypoint(w) => w.description(),
        }
    }
}

/// View over one track of a document
#[derive(Clone, Copy, Debug)]
pub struct TrackItem<'a> {
    track: &'a gpx::Track,
    id: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> TrackItem<'a> {
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Source name, or `Track <id>` when the file has none
    pub fn name(&self) -> String {
        self.track
            .name
            .clone()
            .unwrap_or_else(|| format!("Track {}", self.id))
    }

    pub fn description(&self) -> String {
        self.track.description.clone().unwrap_or_default()
    }

    /// All points of all segments, in order
    pub fn points(self) -> impl Iterator<Item = &'a gpx::Waypoint> {
        self.track
            .segments
            .iter()
            .flat_map(|segment| segment.points.iter())
    }

    /// Total number of points across segments
    pub fn point_count(&self) -> usize {
        self.track.segments.iter().map(|s| s.points.len()).sum()
    }

    /// Great-circle length in meters, summed per segment
    ///
    /// Computed from the points on every call; jumps between segments are not counted.
    pub fn length(&self) -> f64 {
        self.track
            .segments
            .iter()
            .map(|segment| utils::path_length(segment.points.iter().map(|wp| wp.point())))
            .sum()
    }

    /// Deterministic color derived from the track id
    pub fn display_color(&self) -> TrackColor {
        TrackColor::from_index(self.id)
    }

    /// Line geometry (x = lon, y = lat) over every point of the track
    pub fn line_string(&self) -> LineString<f64> {
        LineString::new(
            self.points()
                .map(|wp| {
                    let p = wp.point();
                    Coord { x: p.x(), y: p.y() }
                })
                .collect(),
        )
    }

    /// Access the raw GPX track
    #[inline]
    pub fn raw(&self) -> &'a gpx::Track {
        self.track
    }
}

/// View over one waypoint of a document
#[derive(Clone, Copy, Debug)]
pub struct WaypointItem<'a> {
    waypoint: &'a gpx::Waypoint,
    id: usize,
}

impl<'a> WaypointItem<'a> {
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Source name, or `Waypoint <id>` when the file has none
    pub fn name(&self) -> String {
        self.waypoint
            .name
            .clone()
            .unwrap_or_else(|| format!("Waypoint {}", self.id))
    }

    pub fn description(&self) -> String {
        self.waypoint.description.clone().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.waypoint.symbol.clone().unwrap_or_default()
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.waypoint.point().y()
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.waypoint.point().x()
    }

    /// Elevation in meters; 0.0 when the file records none
    ///
    /// A missing elevation and an elevation of exactly 0.0 look the same here; use
    /// [`WaypointItem::raw`] to tell them apart.
    pub fn elevation(&self) -> f64 {
        self.waypoint.elevation.unwrap_or(0.0)
    }

    #[inline]
    pub fn position(&self) -> Point<f64> {
        self.waypoint.point()
    }

    /// Access the raw GPX waypoint
    #[inline]
    pub fn raw(&self) -> &'a gpx::Waypoint {
        self.waypoint
    }
}
