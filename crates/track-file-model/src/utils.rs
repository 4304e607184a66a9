//! Utility functions for distances, coordinate checks and track colors

use geo::Point;
use std::sync::{Mutex, MutexGuard};

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Hue step between consecutive track colors, in degrees (golden angle)
const GOLDEN_ANGLE_DEG: f32 = 137.508;

/// Calculate the Haversine (great-circle) distance between two points in meters
///
/// Points use the `geo` convention: x = longitude, y = latitude, both in degrees.
#[inline]
pub fn haversine_distance(p1: Point<f64>, p2: Point<f64>) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let delta_lat = (p2.y() - p1.y()).to_radians();
    let delta_lon = (p2.x() - p1.x()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Sum of great-circle distances between consecutive points, in meters
///
/// Returns 0.0 for fewer than two points.
pub fn path_length<I>(points: I) -> f64
where
    I: IntoIterator<Item = Point<f64>>,
{
    let mut total = 0.0;
    let mut prev: Option<Point<f64>> = None;
    for point in points {
        if let Some(p) = prev {
            total += haversine_distance(p, point);
        }
        prev = Some(point);
    }
    total
}

/// Check that a WGS84 coordinate is finite and inside the valid lat/lon ranges
#[inline]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mutex poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

/// An opaque RGB display color for a track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TrackColor {
    /// Generate a color for a track based on its index
    ///
    /// Consecutive indices are spread around the hue circle by the golden angle, so
    /// neighbouring tracks get clearly different colors.
    pub fn from_index(index: usize) -> Self {
        let hue = (index as f32 * GOLDEN_ANGLE_DEG) % 360.0;
        let saturation = 0.7;
        let value = 0.9;

        // HSV to RGB
        let c = value * saturation;
        let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
        let m = value - c;

        let (r, g, b) = if hue < 60.0 {
            (c, x, 0.0)
        } else if hue < 120.0 {
            (x, c, 0.0)
        } else if hue < 180.0 {
            (0.0, c, x)
        } else if hue < 240.0 {
            (0.0, x, c)
        } else if hue < 300.0 {
            (x, 0.0, c)
        } else {
            (c, 0.0, x)
        };

        Self {
            r: ((r + m) * 255.0) as u8,
            g: ((g + m) * 255.0) as u8,
            b: ((b + m) * 255.0) as u8,
        }
    }

    /// Format as `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for TrackColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
