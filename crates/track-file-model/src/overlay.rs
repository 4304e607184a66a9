//! Overlay shapes derived from presentable items
//!
//! Tracks become lines, waypoints become points. A single selected item can be
//! rendered in a highlighted variant instead of its normal style.

use crate::document::Document;
use crate::item::{ItemView, PresentableItem};
use crate::utils::TrackColor;
use geo::{LineString, Point};

/// Type marker of a normal track line
pub const OVERLAY_WAY_TRACK_TYPE: &str = "_track";
/// Type marker of a highlighted line or point
pub const OVERLAY_WAY_HIGHLIGHTED_TYPE: &str = "_highlighted";
/// Type marker of a normal waypoint marker
pub const OVERLAY_NODE_WAYPOINT_TYPE: &str = "_waypoint";

/// The custom type markers a renderer has to style
pub fn custom_type_set() -> &'static [&'static str] {
    &[
        OVERLAY_WAY_TRACK_TYPE,
        OVERLAY_WAY_HIGHLIGHTED_TYPE,
        OVERLAY_NODE_WAYPOINT_TYPE,
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OverlayKind {
    TrackLine,
    Highlighted,
    WaypointMarker,
}

impl OverlayKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TrackLine => OVERLAY_WAY_TRACK_TYPE,
            Self::Highlighted => OVERLAY_WAY_HIGHLIGHTED_TYPE,
            Self::WaypointMarker => OVERLAY_NODE_WAYPOINT_TYPE,
        }
    }
}

/// Which items to build overlays for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlaySelection {
    /// Every item, normal style
    #[default]
    All,
    /// One item, highlighted style
    Item(PresentableItem),
}

/// A track line
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverlayLine {
    pub kind: OverlayKind,
    pub item: PresentableItem,
    pub name: String,
    /// x = lon, y = lat
    pub geometry: LineString<f64>,
    pub color: TrackColor,
}

/// A waypoint marker
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverlayPoint {
    pub kind: OverlayKind,
    pub item: PresentableItem,
    pub name: String,
    /// x = lon, y = lat
    pub position: Point<f64>,
    pub symbol: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "lowercase"))]
pub enum OverlayObject {
    Line(OverlayLine),
    Point(OverlayPoint),
}

impl OverlayObject {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Line(line) => line.kind,
            Self::Point(point) => point.kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    pub fn item(&self) -> PresentableItem {
        match self {
            Self::Line(line) => line.item,
            Self::Point(point) => point.item,
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.kind() == OverlayKind::Highlighted
    }

    /// Build the overlay shape of one resolved item
    pub fn from_view(view: &ItemView<'_>, highlighted: bool) -> Self {
        match view {
            ItemView::Track(track) => Self::Line(OverlayLine {
                kind: if highlighted {
                    OverlayKind::Highlighted
                } else {
                    OverlayKind::TrackLine
                },
                item: PresentableItem::track(track.id()),
                name: track.name(),
                geometry: track.line_string(),
                color: track.display_color(),
            }),
            ItemView::Waypoint(waypoint) => Self::Point(OverlayPoint {
                kind: if highlighted {
                    OverlayKind::Highlighted
                } else {
                    OverlayKind::WaypointMarker
                },
                item: PresentableItem::waypoint(waypoint.id()),
                name: waypoint.name(),
                position: waypoint.position(),
                symbol: waypoint.symbol(),
            }),
        }
    }
}

/// Build overlay shapes for `items` resolved against `document`
///
/// Empty when the document is not valid or the selected item does not resolve.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn create_overlay_objects(
    document: &Document,
    items: &[PresentableItem],
    selection: OverlaySelection,
) -> Vec<OverlayObject> {
    if !document.is_valid() {
        return Vec::new();
    }
    match selection {
        OverlaySelection::All => items
            .iter()
            .filter_map(|item| item.resolve(document))
            .map(|view| OverlayObject::from_view(&view, false))
            .collect(),
        OverlaySelection::Item(selected) => {
            if !items.contains(&selected) {
                return Vec::new();
            }
            selected
                .resolve(document)
                .map(|view| OverlayObject::from_view(&view, true))
                .into_iter()
                .collect()
        }
    }
}
