//! Keychain hanging loop
//!
//! A flat tab made of a rectangle topped by a semicircle, with a circular hole
//! through the semicircle's centre. The tab is attached to the top edge of the
//! picture and extruded through the full sandwich height. It is printed in
//! the White slot.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Mesh, Triangle, Vertex};

/// Segments used for the semicircular cap and for the hole
pub const ARC_SEGMENTS: usize = 32;

/// Shortest allowed rectangle below the semicircle, in millimetres
const MIN_NECK_MM: f64 = 0.2;

/// Fraction of the cap radius the hole may occupy
const MAX_HOLE_RATIO: f64 = 0.8;

/// Keychain loop dimensions in millimetres
///
/// The hole is centred where the semicircle meets the straight neck. A hole
/// whose radius is not smaller than the neck would break through the picture
/// edge, so [`KeychainLoop::validate`] rejects it instead of printing an open
/// loop. A longer `length_mm` fixes that; the error names the shortest
/// length that fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeychainLoop {
    /// Width of the tab along X
    pub width_mm: f64,
    /// Length of the tab along Y, measured from the picture edge
    pub length_mm: f64,
    /// Requested hole diameter
    pub hole_diameter_mm: f64,
}

impl KeychainLoop {
    /// Create a new loop
    pub fn new(width_mm: f64, length_mm: f64, hole_diameter_mm: f64) -> Self {
        Self {
            width_mm,
            length_mm,
            hole_diameter_mm,
        }
    }

    fn cap_radius(&self) -> f64 {
        self.width_mm / 2.0
    }

    /// Length of the straight section below the semicircle
    pub fn neck_length(&self) -> f64 {
        (self.length_mm - self.cap_radius()).max(MIN_NECK_MM)
    }

    /// Hole radius after clamping to the cap
    pub fn hole_radius(&self) -> f64 {
        (self.hole_diameter_mm / 2.0).min(self.cap_radius() * MAX_HOLE_RATIO)
    }

    /// Shortest `length_mm` whose neck is longer than the hole radius
    pub fn min_length_for_hole(&self) -> f64 {
        self.cap_radius() + self.hole_radius()
    }

    /// Check the loop is printable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a dimension is not positive or the
    /// hole radius reaches the neck length.
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("Keychain width", self.width_mm),
            ("Keychain length", self.length_mm),
            ("Keychain hole diameter", self.hole_diameter_mm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::configuration(format!(
                    "{} must be positive, got {}",
                    what, value
                )));
            }
        }
        if self.hole_radius() >= self.neck_length() {
            return Err(Error::configuration(format!(
                "Keychain hole radius {:.2} mm does not fit above a {:.2} mm neck; \
                 use a loop length above {:.2} mm",
                self.hole_radius(),
                self.neck_length(),
                self.min_length_for_hole()
            )));
        }
        Ok(())
    }

    /// Outer contour, counter-clockwise, with the tab base on `y = 0`
    pub fn outline(&self) -> Vec<[f64; 2]> {
        let r = self.cap_radius();
        let neck = self.neck_length();
        let mut points = Vec::with_capacity(ARC_SEGMENTS + 3);
        points.push([-r, 0.0]);
        points.push([r, 0.0]);
        points.push([r, neck]);
        for i in 1..ARC_SEGMENTS {
            let angle = std::f64::consts::PI * i as f64 / ARC_SEGMENTS as f64;
            points.push([r * angle.cos(), neck + r * angle.sin()]);
        }
        points.push([-r, neck]);
        points
    }

    /// Hole contour, clockwise, centred on the cap
    pub fn hole(&self) -> Vec<[f64; 2]> {
        let r = self.hole_radius();
        let neck = self.neck_length();
        (0..ARC_SEGMENTS)
            .map(|i| {
                let angle = -std::f64::consts::TAU * i as f64 / ARC_SEGMENTS as f64;
                [r * angle.cos(), neck + r * angle.sin()]
            })
            .collect()
    }

    /// Build the closed loop mesh in millimetres
    ///
    /// `attach` is the midpoint of the picture edge the tab grows from, and the
    /// tab spans `bottom..top` along Z.
    pub fn build_mesh(&self, attach: [f64; 2], bottom: f64, top: f64) -> Result<Mesh> {
        self.validate()?;

        let outer = self.outline();
        let hole = self.hole();
        let ring: Vec<[f64; 2]> = outer.iter().chain(hole.iter()).copied().collect();
        let n = ring.len();

        let mut coords = Vec::with_capacity(n * 2);
        for p in &ring {
            coords.push(p[0]);
            coords.push(p[1]);
        }
        let cap = earcutr::earcut(&coords, &[outer.len()], 2)
            .map_err(|e| Error::geometry("Keychain", &format!("Cap triangulation failed: {}", e)))?;
        if cap.is_empty() {
            return Err(Error::geometry("Keychain", "Cap triangulation produced no triangles"));
        }

        let mut mesh = Mesh::with_capacity(n * 2, cap.len() / 3 * 2 + n * 2);
        for z in [bottom, top] {
            for p in &ring {
                mesh.vertices
                    .push(Vertex::new(attach[0] + p[0], attach[1] + p[1], z));
            }
        }

        for tri in cap.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ccw = signed_area(ring[a], ring[b], ring[c]) > 0.0;
            let (b, c) = if ccw { (b, c) } else { (c, b) };
            // Top faces up, bottom faces down
            mesh.triangles.push(Triangle::new(n + a, n + b, n + c));
            mesh.triangles.push(Triangle::new(a, c, b));
        }

        // Outer is counter-clockwise and the hole clockwise, so the same
        // winding puts both walls facing away from the material.
        for contour in [0..outer.len(), outer.len()..n] {
            let start = contour.start;
            let len = contour.len();
            for i in 0..len {
                let b0 = start + i;
                let b1 = start + (i + 1) % len;
                mesh.triangles.push(Triangle::new(b0, b1, n + b1));
                mesh.triangles.push(Triangle::new(b0, n + b1, n + b0));
            }
        }

        Ok(mesh)
    }
}

fn signed_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}
