//! Numeric helpers shared by the stand editor, the card layout and the viewport.
//!
//! Geographic helpers work on WGS84 degrees, screen helpers on CSS-like pixels
//! with the y axis pointing down.

use serde::{Deserialize, Serialize};

/// Radius used for heading rays (the same sphere web maps project onto)
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Size of one web-mercator tile in pixels at zoom 0
const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the web-mercator projection
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lng, other.lat, other.lng)
    }
}

/// A point on screen, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, offset: Offset) -> ScreenPoint {
        ScreenPoint {
            x: self.x + offset.dx,
            y: self.y + offset.dy,
        }
    }
}

/// A displacement on screen, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn add(&self, dx: f64, dy: f64) -> Offset {
        Offset {
            dx: self.dx + dx,
            dy: self.dy + dy,
        }
    }
}

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size whose top-left corner sits at `origin`
    pub fn at(origin: ScreenPoint, width: f64, height: f64) -> Self {
        Self::new(origin.x, origin.y, width, height)
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Intersection test. Rectangles that merely touch count as overlapping.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() < other.left()
            || other.right() < self.left()
            || self.bottom() < other.top()
            || other.bottom() < self.top())
    }
}

/// Clamp `value` into `[min, max]`. When the range is inverted `min` wins.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Normalize any integer heading into `[0, 359]`
pub fn normalize_heading(degrees: i32) -> u16 {
    degrees.rem_euclid(360) as u16
}

/// Unit vector pointing from `to` towards `from`.
///
/// Coincident points have no direction; `(1, 0)` is returned so callers
/// never divide by zero.
pub fn repulsion_direction(from: ScreenPoint, to: ScreenPoint) -> (f64, f64) {
    let dx = from.x - to.x;
    let dy = from.y - to.y;
    let length = dx.hypot(dy);
    if length < f64::EPSILON {
        return (1.0, 0.0);
    }
    (dx / length, dy / length)
}

/// Calculate the distance between two points using the Haversine formula
/// Returns distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Point reached by travelling `distance_m` meters from `origin` along the
/// initial great-circle bearing `bearing_deg`
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let angular = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lng.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Two-point line showing the nose direction of a parked aircraft
pub fn heading_ray(origin: GeoPoint, heading_deg: u16, length_m: f64) -> [GeoPoint; 2] {
    [
        origin,
        destination_point(origin, f64::from(heading_deg), length_m),
    ]
}

/// Project a coordinate to absolute web-mercator pixels at `zoom`
pub fn mercator_project(point: GeoPoint, zoom: f64) -> ScreenPoint {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat = clamp(point.lat, -MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (point.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * scale;
    ScreenPoint::new(x, y)
}

/// Inverse of [`mercator_project`]
pub fn mercator_unproject(pixel: ScreenPoint, zoom: f64) -> GeoPoint {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lng = pixel.x / scale * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * pixel.y / scale);
    let lat = n.sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}
