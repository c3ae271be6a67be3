// Copyright 2017 Matthew Plant. This file is part of MGF2D.
//
// MGF2D is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// MGF2D is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with MGF2D. If not, see <http://www.gnu.org/licenses/>.

use std::f32;

use cgmath::{Vector2, Zero};
use serde::{Deserialize, Serialize};

use crate::geom::*;

/// An axis aligned bounding box. Valid boxes satisfy lower <= upper on both
/// axes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AABB {
    pub lower_bound: Vector2<f32>,
    pub upper_bound: Vector2<f32>,
}

/// A ray from `origin` along `translation`, clipped to `max_fraction` of the
/// translation.
#[derive(Copy, Clone, Debug)]
pub struct RayCastInput {
    pub origin: Vector2<f32>,
    pub translation: Vector2<f32>,
    pub max_fraction: f32,
}

/// Result of a ray or shape cast. `point` and `normal` are only meaningful
/// when `hit` is set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CastOutput {
    pub normal: Vector2<f32>,
    pub point: Vector2<f32>,
    pub fraction: f32,
    pub iterations: u32,
    pub hit: bool,
}

impl Default for CastOutput {
    fn default() -> Self {
        CastOutput {
            normal: Vector2::zero(),
            point: Vector2::zero(),
            fraction: 0.0,
            iterations: 0,
            hit: false,
        }
    }
}

impl AABB {
    pub fn new(lower_bound: Vector2<f32>, upper_bound: Vector2<f32>) -> Self {
        AABB { lower_bound, upper_bound }
    }

    /// The box enclosing a circle of radius r around p.
    pub fn around(p: Vector2<f32>, r: f32) -> Self {
        let r = Vector2::new(r, r);
        AABB { lower_bound: p - r, upper_bound: p + r }
    }

    pub fn is_valid(&self) -> bool {
        let d = self.upper_bound - self.lower_bound;
        d.x >= 0.0 && d.y >= 0.0
            && self.lower_bound.x.is_finite() && self.lower_bound.y.is_finite()
            && self.upper_bound.x.is_finite() && self.upper_bound.y.is_finite()
    }

    /// The smallest box enclosing both arguments.
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            lower_bound: vmin(self.lower_bound, other.lower_bound),
            upper_bound: vmax(self.upper_bound, other.upper_bound),
        }
    }

    /// Grows self to enclose other. Returns true if self changed.
    pub fn enlarge(&mut self, other: &AABB) -> bool {
        let mut changed = false;
        if other.lower_bound.x < self.lower_bound.x {
            self.lower_bound.x = other.lower_bound.x;
            changed = true;
        }
        if other.lower_bound.y < self.lower_bound.y {
            self.lower_bound.y = other.lower_bound.y;
            changed = true;
        }
        if self.upper_bound.x < other.upper_bound.x {
            self.upper_bound.x = other.upper_bound.x;
            changed = true;
        }
        if self.upper_bound.y < other.upper_bound.y {
            self.upper_bound.y = other.upper_bound.y;
            changed = true;
        }
        changed
    }

    /// Touching boxes overlap.
    pub fn overlaps(&self, other: &AABB) -> bool {
        !(other.lower_bound.x > self.upper_bound.x
          || other.lower_bound.y > self.upper_bound.y
          || self.lower_bound.x > other.upper_bound.x
          || self.lower_bound.y > other.upper_bound.y)
    }

    /// True if other lies entirely within self.
    pub fn contains(&self, other: &AABB) -> bool {
        self.lower_bound.x <= other.lower_bound.x
            && self.lower_bound.y <= other.lower_bound.y
            && other.upper_bound.x <= self.upper_bound.x
            && other.upper_bound.y <= self.upper_bound.y
    }

    /// Used as the insertion cost metric of the dynamic tree; in 2D the
    /// perimeter plays the role surface area plays in 3D.
    pub fn perimeter(&self) -> f32 {
        let w = self.upper_bound.x - self.lower_bound.x;
        let h = self.upper_bound.y - self.lower_bound.y;
        2.0 * (w + h)
    }

    pub fn center(&self) -> Vector2<f32> {
        (self.lower_bound + self.upper_bound) * 0.5
    }

    /// Half widths.
    pub fn extents(&self) -> Vector2<f32> {
        (self.upper_bound - self.lower_bound) * 0.5
    }

    /// Expands the box by margin on every side.
    pub fn fattened(&self, margin: f32) -> AABB {
        let m = Vector2::new(margin, margin);
        AABB {
            lower_bound: self.lower_bound - m,
            upper_bound: self.upper_bound + m,
        }
    }

    pub fn translate(&self, d: Vector2<f32>) -> AABB {
        AABB {
            lower_bound: self.lower_bound + d,
            upper_bound: self.upper_bound + d,
        }
    }

    /// Casts the segment p1 -> p2 against the box using the slab method.
    /// Rays that start inside the box do not hit.
    pub fn ray_cast(&self, p1: Vector2<f32>, p2: Vector2<f32>) -> CastOutput {
        let mut output = CastOutput::default();

        let mut tmin = -f32::MAX;
        let mut tmax = f32::MAX;
        let d = p2 - p1;
        let mut normal = Vector2::zero();

        for axis in 0..2 {
            let (p, d, lower, upper) = if axis == 0 {
                (p1.x, d.x, self.lower_bound.x, self.upper_bound.x)
            } else {
                (p1.y, d.y, self.lower_bound.y, self.upper_bound.y)
            };

            if d.abs() < f32::EPSILON {
                // Parallel to this slab.
                if p < lower || upper < p {
                    return output;
                }
                continue;
            }

            let inv_d = 1.0 / d;
            let mut t1 = (lower - p) * inv_d;
            let mut t2 = (upper - p) * inv_d;
            let mut s = -1.0;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
                s = 1.0;
            }
            if t1 > tmin {
                normal = if axis == 0 { Vector2::new(s, 0.0) } else { Vector2::new(0.0, s) };
                tmin = t1;
            }
            tmax = tmax.min(t2);
            if tmin > tmax {
                return output;
            }
        }

        if tmin < 0.0 || 1.0 < tmin {
            return output;
        }

        output.fraction = tmin;
        output.normal = normal;
        output.point = lerp(p1, p2, tmin);
        output.hit = true;
        output
    }
}

/// A type that can compute its world bounds under a transform.
pub trait BoundedBy {
    fn bounds(&self, xf: &Transform) -> AABB;
}

impl BoundedBy for Circle {
    fn bounds(&self, xf: &Transform) -> AABB {
        AABB::around(xf.apply(self.center), self.radius)
    }
}

impl BoundedBy for Capsule {
    fn bounds(&self, xf: &Transform) -> AABB {
        let v1 = xf.apply(self.center1);
        let v2 = xf.apply(self.center2);
        AABB::new(vmin(v1, v2), vmax(v1, v2)).fattened(self.radius)
    }
}

impl BoundedBy for Segment {
    fn bounds(&self, xf: &Transform) -> AABB {
        let v1 = xf.apply(self.point1);
        let v2 = xf.apply(self.point2);
        AABB::new(vmin(v1, v2), vmax(v1, v2))
    }
}

impl BoundedBy for ChainSegment {
    /// Ghost vertices do not contribute.
    fn bounds(&self, xf: &Transform) -> AABB {
        self.segment.bounds(xf)
    }
}

impl BoundedBy for Polygon {
    fn bounds(&self, xf: &Transform) -> AABB {
        let first = xf.apply(self.vertices[0]);
        let mut lower = first;
        let mut upper = first;
        for v in &self.vertices[1..self.count] {
            let v = xf.apply(*v);
            lower = vmin(lower, v);
            upper = vmax(upper, v);
        }
        AABB::new(lower, upper).fattened(self.radius)
    }
}

#[cfg(test)]
mod tests {
    mod bounds {
        use crate::bounds::*;
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        fn unit_box() -> AABB {
            AABB::new(Vector2::new(-1.0, -1.0), Vector2::new(1.0, 1.0))
        }

        #[test]
        fn test_aabb() {
            let a = unit_box();
            let b = AABB::new(Vector2::new(2.0, 0.0), Vector2::new(3.0, 4.0));
            let combined = a.union(&b);
            assert!(combined.contains(&a));
            assert!(combined.contains(&b));
            assert!(!a.overlaps(&b));
            assert_relative_eq!(combined.perimeter(), 18.0);
            assert_relative_eq!(a.center().x, 0.0);
            assert_relative_eq!(b.extents().y, 2.0);

            // Touching boxes overlap.
            let c = AABB::new(Vector2::new(1.0, -1.0), Vector2::new(2.0, 1.0));
            assert!(a.overlaps(&c));

            let mut d = a;
            assert!(!d.enlarge(&a));
            assert!(d.enlarge(&b));
            assert_eq!(d, combined);

            let fat = a.fattened(0.1);
            assert!(fat.contains(&a));
            assert!(!a.contains(&fat));
            assert!(fat.is_valid());
        }

        #[test]
        fn test_aabb_ray_cast() {
            let a = unit_box();

            let out = a.ray_cast(Vector2::new(-3.0, 0.0), Vector2::new(3.0, 0.0));
            assert!(out.hit);
            assert_relative_eq!(out.fraction, 1.0 / 3.0, epsilon = 1e-6);
            assert_relative_eq!(out.normal.x, -1.0);
            assert_relative_eq!(out.normal.y, 0.0);
            assert_relative_eq!(out.point.x, -1.0, epsilon = 1e-6);

            // Entering through the top face.
            let out = a.ray_cast(Vector2::new(0.5, 5.0), Vector2::new(0.5, -5.0));
            assert!(out.hit);
            assert_relative_eq!(out.fraction, 0.4, epsilon = 1e-6);
            assert_relative_eq!(out.normal.y, 1.0);

            // Parallel and outside.
            let out = a.ray_cast(Vector2::new(-3.0, 2.0), Vector2::new(3.0, 2.0));
            assert!(!out.hit);

            // Too short to reach.
            let out = a.ray_cast(Vector2::new(-3.0, 0.0), Vector2::new(-1.5, 0.0));
            assert!(!out.hit);

            // Starts inside.
            let out = a.ray_cast(Vector2::new(0.0, 0.0), Vector2::new(3.0, 0.0));
            assert!(!out.hit);
        }

        #[test]
        fn test_shape_bounds() {
            let xf = Transform::new(Vector2::new(1.0, 2.0), Rot::IDENTITY);
            let circle = Circle { center: Vector2::new(1.0, 0.0), radius: 0.5 };
            let b = circle.bounds(&xf);
            assert_relative_eq!(b.lower_bound.x, 1.5);
            assert_relative_eq!(b.upper_bound.y, 2.5);

            let square = make_rounded_box(1.0, 1.0, 0.25);
            let b = square.bounds(&xf);
            assert_relative_eq!(b.lower_bound.x, -0.25);
            assert_relative_eq!(b.upper_bound.y, 3.25);
        }
    }
}
