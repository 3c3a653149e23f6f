//! Ground-plane geometry shared by placement and the generators.
//!
//! `Vec2` here is (world x, world z), matching the road graph convention.

use bevy::prelude::*;

/// Shortest distance from `p` to the segment `a`-`b`.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    p.distance(closest_point_on_segment(p, a, b))
}

pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Proper or touching intersection point of two segments.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-8 {
        return None;
    }
    let qp = b1 - a1;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a1 + r * t)
    } else {
        None
    }
}

pub fn segment_segment_distance(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> f32 {
    if segment_intersection(a1, a2, b1, b2).is_some() {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

/// Unit vector a yaw of `yaw` radians turns local +Z into.
///
/// Matches `Quat::from_rotation_y(yaw) * Vec3::Z` projected onto the ground.
pub fn yaw_to_direction(yaw: f32) -> Vec2 {
    Vec2::new(yaw.sin(), yaw.cos())
}

/// Yaw that turns local +Z onto `dir`.
pub fn direction_to_yaw(dir: Vec2) -> f32 {
    dir.x.atan2(dir.y)
}

/// Smallest absolute angle between two directions, in radians.
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Oriented rectangle on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub center: Vec2,
    /// Half width along local X, half depth along local Z.
    pub half_extents: Vec2,
    pub yaw: f32,
}

impl Footprint {
    pub fn new(center: Vec2, size: Vec2, yaw: f32) -> Self {
        Self {
            center,
            half_extents: size * 0.5,
            yaw,
        }
    }

    /// Degenerate footprint for point-like objects.
    pub fn point(center: Vec2) -> Self {
        Self {
            center,
            half_extents: Vec2::ZERO,
            yaw: 0.0,
        }
    }

    /// Local X and Z axes in world space.
    pub fn axes(&self) -> (Vec2, Vec2) {
        let forward = yaw_to_direction(self.yaw);
        // local +X under a Y rotation
        let right = Vec2::new(forward.y, -forward.x);
        (right, forward)
    }

    pub fn corners(&self) -> [Vec2; 4] {
        let (right, forward) = self.axes();
        let rx = right * self.half_extents.x;
        let fz = forward * self.half_extents.y;
        [
            self.center + rx + fz,
            self.center - rx + fz,
            self.center - rx - fz,
            self.center + rx - fz,
        ]
    }

    /// Radius of the circle through the corners.
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents.length()
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let (right, forward) = self.axes();
        let d = p - self.center;
        d.dot(right).abs() <= self.half_extents.x + 1e-5
            && d.dot(forward).abs() <= self.half_extents.y + 1e-5
    }

    /// Zero when the segment touches or crosses the rectangle.
    pub fn distance_to_segment(&self, a: Vec2, b: Vec2) -> f32 {
        if self.contains(a) || self.contains(b) {
            return 0.0;
        }
        if self.half_extents == Vec2::ZERO {
            return point_segment_distance(self.center, a, b);
        }
        let c = self.corners();
        (0..4)
            .map(|i| segment_segment_distance(c[i], c[(i + 1) % 4], a, b))
            .fold(f32::MAX, f32::min)
    }

    /// Separating-axis test, with both rectangles grown by `clearance`.
    pub fn overlaps(&self, other: &Footprint, clearance: f32) -> bool {
        let a = self.grown(clearance * 0.5);
        let b = other.grown(clearance * 0.5);
        let (ar, af) = a.axes();
        let (br, bf) = b.axes();
        let ac = a.corners();
        let bc = b.corners();

        for axis in [ar, af, br, bf] {
            let (amin, amax) = project(&ac, axis);
            let (bmin, bmax) = project(&bc, axis);
            if amax < bmin || bmax < amin {
                return false;
            }
        }
        true
    }

    pub fn grown(&self, by: f32) -> Footprint {
        Footprint {
            half_extents: self.half_extents + Vec2::splat(by.max(0.0)),
            ..*self
        }
    }
}

fn project(points: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn yaw_direction_matches_bevy_rotation() {
        for yaw in [0.0, 0.4, FRAC_PI_2, 2.5, -1.2] {
            let rotated = Quat::from_rotation_y(yaw) * Vec3::Z;
            let dir = yaw_to_direction(yaw);
            assert!((rotated.x - dir.x).abs() < 1e-5);
            assert!((rotated.z - dir.y).abs() < 1e-5);
            assert!((direction_to_yaw(dir) - yaw).abs() < 1e-5);

            let right = Quat::from_rotation_y(yaw) * Vec3::X;
            let fp = Footprint::new(Vec2::ZERO, Vec2::ONE, yaw);
            let (r, _) = fp.axes();
            assert!((right.x - r.x).abs() < 1e-5 && (right.z - r.y).abs() < 1e-5);
        }
    }

    #[test]
    fn segment_distances() {
        let d = point_segment_distance(Vec2::new(0.0, 5.0), Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);
        let d = point_segment_distance(Vec2::new(13.0, 4.0), Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);

        let hit = segment_intersection(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        );
        assert_eq!(hit, Some(Vec2::ZERO));
    }

    #[test]
    fn footprint_segment_distance_catches_pass_through() {
        // road crossing the middle without touching a corner
        let fp = Footprint::new(Vec2::ZERO, Vec2::new(20.0, 20.0), 0.0);
        let d = fp.distance_to_segment(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0));
        assert_eq!(d, 0.0);

        let d = fp.distance_to_segment(Vec2::new(-50.0, 15.0), Vec2::new(50.0, 15.0));
        assert!((d - 5.0).abs() < 1e-4);
    }

    #[test]
    fn rotated_overlap() {
        let a = Footprint::new(Vec2::ZERO, Vec2::new(10.0, 10.0), 0.0);
        let b = Footprint::new(Vec2::new(11.0, 0.0), Vec2::new(10.0, 10.0), std::f32::consts::FRAC_PI_4);
        assert!(a.overlaps(&b, 0.0));
        let c = Footprint::new(Vec2::new(20.0, 0.0), Vec2::new(10.0, 10.0), 0.0);
        assert!(!a.overlaps(&c, 0.0));
        assert!(a.overlaps(&c, 12.0));
    }
}
