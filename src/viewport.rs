//! Map viewport: projection from coordinates to screen pixels
//!
//! Tiles and panning belong to the map widget; the board only needs the
//! projection, the visible bounds and a way to fly somewhere.

use crate::geometry::{GeoPoint, Rect, ScreenPoint, mercator_project, mercator_unproject};

pub trait Viewport: Send {
    /// Screen position of a coordinate, relative to the viewport's top-left corner
    fn project(&self, point: GeoPoint) -> ScreenPoint;

    /// Visible area in screen pixels
    fn bounds(&self) -> Rect;

    fn zoom(&self) -> f64;

    /// Center the view on `point` at `zoom`
    fn fly_to(&mut self, point: GeoPoint, zoom: f64);

    /// Shift the view by a screen distance (positive `dx` pans east)
    fn pan_by(&mut self, dx: f64, dy: f64);

    fn set_zoom(&mut self, zoom: f64);

    /// The surface changed size
    fn resize(&mut self, width: f64, height: f64);
}

/// Web-mercator viewport of a fixed pixel size
#[derive(Debug, Clone, PartialEq)]
pub struct MercatorViewport {
    center: GeoPoint,
    zoom: f64,
    width: f64,
    height: f64,
}

impl MercatorViewport {
    pub fn new(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }
}

impl Viewport for MercatorViewport {
    fn project(&self, point: GeoPoint) -> ScreenPoint {
        let p = mercator_project(point, self.zoom);
        let c = mercator_project(self.center, self.zoom);
        ScreenPoint::new(
            p.x - c.x + self.width / 2.0,
            p.y - c.y + self.height / 2.0,
        )
    }

    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn fly_to(&mut self, point: GeoPoint, zoom: f64) {
        self.center = point;
        self.zoom = zoom;
    }

    fn pan_by(&mut self, dx: f64, dy: f64) {
        let c = mercator_project(self.center, self.zoom);
        self.center = mercator_unproject(ScreenPoint::new(c.x + dx, c.y + dy), self.zoom);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(1.0, 20.0);
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_projects_to_middle() {
        let center = GeoPoint::new(-34.8222, -58.5358);
        let vp = MercatorViewport::new(center, 14.0, 1280.0, 800.0);
        let p = vp.project(center);
        assert!((p.x - 640.0).abs() < 1e-6);
        assert!((p.y - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_north_east_is_up_right() {
        let center = GeoPoint::new(-34.8222, -58.5358);
        let vp = MercatorViewport::new(center, 16.0, 1280.0, 800.0);
        let p = vp.project(GeoPoint::new(center.lat + 0.001, center.lng + 0.001));
        assert!(p.x > 640.0);
        assert!(p.y < 400.0);
    }

    #[test]
    fn test_pan_moves_projection() {
        let center = GeoPoint::new(10.0, 10.0);
        let mut vp = MercatorViewport::new(center, 15.0, 400.0, 400.0);
        vp.pan_by(100.0, 0.0);
        let p = vp.project(center);
        assert!((p.x - 100.0).abs() < 1e-3);
        assert!((p.y - 200.0).abs() < 1e-3);
    }
}
