//! Vessel boundary - analytic bottle-shaped container
//!
//! The bottle is a solid of revolution around the Y axis. Its inner profile,
//! in the (radial distance, height above floor) half-plane, is a short chain
//! of primitives:
//!
//! ```text
//!          |   |        neck column (open, continues upward)
//!         /     \       shoulder taper
//!        |       |      cylindrical wall
//!         \_____/       flat floor with rounded rim (cap_radius)
//! ```
//!
//! Distances are measured to that chain directly, so wall queries stay cheap
//! and exact no matter how many grains ask.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Radii below this are treated as lying on the bottle axis
const AXIS_EPSILON: f32 = 1e-6;

/// Construction parameters of the bottle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselParams {
    /// Inner radius of the cylindrical body
    pub wall_radius: f32,
    /// Height of the body from the floor to the start of the shoulder
    pub height: f32,
    /// Rounding radius where the floor meets the wall
    pub cap_radius: f32,
    /// Height of the taper from body to neck
    pub shoulder_height: f32,
    /// Inner radius of the neck and mouth
    pub neck_radius: f32,
    /// Height of the neck above the shoulder
    pub neck_height: f32,
    /// World-space height of the inner floor
    pub base_y: f32,
}

impl Default for VesselParams {
    fn default() -> Self {
        Self {
            wall_radius: 0.55,
            height: 1.4,
            cap_radius: 0.15,
            shoulder_height: 0.1,
            neck_radius: 0.4,
            neck_height: 0.39,
            base_y: -1.1,
        }
    }
}

impl VesselParams {
    /// Straight cylinder with a rounded bottom rim and no neck
    pub fn cylinder(wall_radius: f32, height: f32, cap_radius: f32) -> Self {
        Self {
            wall_radius,
            height,
            cap_radius,
            shoulder_height: 0.0,
            neck_radius: wall_radius,
            neck_height: 0.0,
            base_y: 0.0,
        }
    }

    fn validate(&self) -> SimResult<()> {
        let all = [
            ("wall_radius", self.wall_radius),
            ("height", self.height),
            ("cap_radius", self.cap_radius),
            ("shoulder_height", self.shoulder_height),
            ("neck_radius", self.neck_radius),
            ("neck_height", self.neck_height),
            ("base_y", self.base_y),
        ];
        if let Some((name, _)) = all.iter().find(|(_, value)| !value.is_finite()) {
            return Err(SimError::InvalidVesselParams(format!("{name} must be finite")));
        }

        let positive = [
            ("wall_radius", self.wall_radius),
            ("height", self.height),
            ("neck_radius", self.neck_radius),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| *value <= 0.0) {
            return Err(SimError::InvalidVesselParams(format!(
                "{name} must be positive, got {value}"
            )));
        }

        let non_negative = [
            ("cap_radius", self.cap_radius),
            ("shoulder_height", self.shoulder_height),
            ("neck_height", self.neck_height),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, value)| *value < 0.0) {
            return Err(SimError::InvalidVesselParams(format!(
                "{name} must not be negative, got {value}"
            )));
        }

        if self.cap_radius > self.wall_radius || self.cap_radius > self.height {
            return Err(SimError::InvalidVesselParams(format!(
                "cap_radius {} does not fit a body of radius {} and height {}",
                self.cap_radius, self.wall_radius, self.height
            )));
        }

        if self.neck_radius > self.wall_radius {
            return Err(SimError::InvalidVesselParams(format!(
                "neck_radius {} is wider than wall_radius {}",
                self.neck_radius, self.wall_radius
            )));
        }

        Ok(())
    }
}

/// Closest point on one profile primitive
struct ProfileHit {
    point: Vec2,
    /// Unit normal of the primitive pointing into the cavity
    inward: Vec2,
}

/// Static collision geometry of the bottle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesselBoundary {
    params: VesselParams,
}

impl VesselBoundary {
    pub fn new(params: VesselParams) -> SimResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &VesselParams {
        &self.params
    }

    pub fn floor_y(&self) -> f32 {
        self.params.base_y
    }

    /// World height where the neck ends and grains are poured in
    pub fn mouth_y(&self) -> f32 {
        self.params.base_y + self.params.height + self.params.shoulder_height + self.params.neck_height
    }

    pub fn mouth_radius(&self) -> f32 {
        self.params.neck_radius
    }

    /// Midpoint of the bottle on its axis
    pub fn center(&self) -> Vec3 {
        Vec3::new(0.0, (self.floor_y() + self.mouth_y()) * 0.5, 0.0)
    }

    /// Radius of the sphere around [`Self::center`] that encloses the bottle
    pub fn bounding_radius(&self) -> f32 {
        let half_height = (self.mouth_y() - self.floor_y()) * 0.5;
        (half_height * half_height + self.params.wall_radius * self.params.wall_radius).sqrt()
    }

    /// Inner radius of the cavity at a world height (0 below the floor)
    pub fn radius_at_height(&self, y: f32) -> f32 {
        let p = &self.params;
        let h = y - p.base_y;
        let body_top = p.height;
        let shoulder_top = p.height + p.shoulder_height;

        if h < 0.0 {
            0.0
        } else if h < p.cap_radius {
            let dy = p.cap_radius - h;
            p.wall_radius - p.cap_radius + (p.cap_radius * p.cap_radius - dy * dy).max(0.0).sqrt()
        } else if h <= body_top {
            p.wall_radius
        } else if h <= shoulder_top && p.shoulder_height > 0.0 {
            let t = (h - body_top) / p.shoulder_height;
            p.wall_radius + (p.neck_radius - p.wall_radius) * t
        } else {
            p.neck_radius
        }
    }

    /// Signed distance from `point` to the inner wall, with the wall normal
    ///
    /// Positive distances are free space inside the bottle, negative ones lie
    /// inside the wall material. The normal always points from the wall into
    /// the cavity, so pushing a point along it reduces penetration.
    pub fn signed_distance(&self, point: Vec3) -> (f32, Vec3) {
        let radial = Vec2::new(point.x, point.z);
        let rho = radial.length();
        let q = Vec2::new(rho, point.y - self.params.base_y);

        let hit = self.closest_on_profile(q);
        let offset = q - hit.point;
        let distance = offset.length();
        let inside = q.y > 0.0 && rho < self.radius_at_height(point.y);

        let normal_2d = if distance > AXIS_EPSILON {
            if inside { offset / distance } else { -offset / distance }
        } else {
            hit.inward
        };

        let radial_dir = if rho > AXIS_EPSILON {
            radial / rho
        } else {
            Vec2::X
        };
        let normal = Vec3::new(
            radial_dir.x * normal_2d.x,
            normal_2d.y,
            radial_dir.y * normal_2d.x,
        );

        let signed = if inside { distance } else { -distance };
        (signed, normal)
    }

    /// True if a sphere fits inside the cavity without touching the wall
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.signed_distance(center).0 >= radius
    }

    fn closest_on_profile(&self, q: Vec2) -> ProfileHit {
        let p = &self.params;
        let r = p.wall_radius;
        let c = p.cap_radius;
        let body_top = p.height;
        let shoulder_top = p.height + p.shoulder_height;

        let mut best = closest_on_segment(q, Vec2::ZERO, Vec2::new(r - c, 0.0));

        if c > 0.0 {
            let arc = closest_on_rim(q, Vec2::new(r - c, c), c);
            if arc.point.distance_squared(q) < best.point.distance_squared(q) {
                best = arc;
            }
        }

        let segments = [
            (Vec2::new(r, c), Vec2::new(r, body_top)),
            (Vec2::new(r, body_top), Vec2::new(p.neck_radius, shoulder_top)),
        ];
        for (a, b) in segments {
            let hit = closest_on_segment(q, a, b);
            if hit.point.distance_squared(q) < best.point.distance_squared(q) {
                best = hit;
            }
        }

        // Neck continues as an open column above the shoulder
        let neck = ProfileHit {
            point: Vec2::new(p.neck_radius, q.y.max(shoulder_top)),
            inward: Vec2::NEG_X,
        };
        if neck.point.distance_squared(q) < best.point.distance_squared(q) {
            best = neck;
        }

        best
    }
}

/// Closest point on segment `a -> b`; the cavity lies to the left of the direction
fn closest_on_segment(q: Vec2, a: Vec2, b: Vec2) -> ProfileHit {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return ProfileHit {
            point: a,
            inward: Vec2::Y,
        };
    }

    let t = ((q - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let dir = ab / len_sq.sqrt();
    ProfileHit {
        point: a + ab * t,
        inward: Vec2::new(-dir.y, dir.x),
    }
}

/// Closest point on the quarter arc joining floor and wall
fn closest_on_rim(q: Vec2, center: Vec2, radius: f32) -> ProfileHit {
    let offset = q - center;
    // Quarter arc spans the lower-outer quadrant of its circle
    let clamped = Vec2::new(offset.x.max(0.0), offset.y.min(0.0));
    let dir = clamped.try_normalize().unwrap_or(Vec2::new(
        std::f32::consts::FRAC_1_SQRT_2,
        -std::f32::consts::FRAC_1_SQRT_2,
    ));
    ProfileHit {
        point: center + dir * radius,
        inward: -dir,
    }
}
