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

//! Geometric primitives: rotations, transforms, sweeps and the convex shapes
//! understood by the collision pipeline.

use std::f32;

use cgmath::{InnerSpace, Vector2, Zero};
use serde::{Deserialize, Serialize};

/// Tolerance used for degenerate length checks.
pub const COLLISION_EPSILON: f32 = 0.000001;

/// Collision and constraint tolerance in length units.
pub const LINEAR_SLOP: f32 = 0.005;

/// Contacts are generated for shapes closer than this distance so the solver
/// can act before the shapes actually touch.
pub const SPECULATIVE_DISTANCE: f32 = 4.0 * LINEAR_SLOP;

/// Margin used to fatten tree AABBs so small motions do not touch the tree.
pub const AABB_MARGIN: f32 = 0.1;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Feature index used when a contact point has no meaningful feature.
pub const NULL_FEATURE: u8 = 0xFF;

/// A large length used as an upper bound for world coordinates.
pub const HUGE: f32 = 100000.0;

/// 2D cross product, the signed area of the parallelogram spanned by a and b.
#[inline(always)]
pub fn cross(a: Vector2<f32>, b: Vector2<f32>) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a vector and a scalar.
#[inline(always)]
pub fn cross_vs(v: Vector2<f32>, s: f32) -> Vector2<f32> {
    Vector2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector.
#[inline(always)]
pub fn cross_sv(s: f32, v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(-s * v.y, s * v.x)
}

/// Counter-clockwise perpendicular.
#[inline(always)]
pub fn left_perp(v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(-v.y, v.x)
}

/// Clockwise perpendicular. For a counter-clockwise polygon this is the
/// outward direction of an edge.
#[inline(always)]
pub fn right_perp(v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(v.y, -v.x)
}

#[inline(always)]
pub fn vmin(a: Vector2<f32>, b: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(a.x.min(b.x), a.y.min(b.y))
}

#[inline(always)]
pub fn vmax(a: Vector2<f32>, b: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(a.x.max(b.x), a.y.max(b.y))
}

#[inline(always)]
pub fn lerp(a: Vector2<f32>, b: Vector2<f32>, t: f32) -> Vector2<f32> {
    a * (1.0 - t) + b * t
}

/// Normalizes v, returning the original length alongside the unit vector.
/// Vectors shorter than `COLLISION_EPSILON` produce a zero length and a zero
/// vector instead of NaNs.
pub fn length_and_normalize(v: Vector2<f32>) -> (f32, Vector2<f32>) {
    let length = v.magnitude();
    if length < COLLISION_EPSILON {
        (0.0, Vector2::zero())
    } else {
        (length, v / length)
    }
}

/// Like `length_and_normalize` but discards the length.
pub fn normalize_or_zero(v: Vector2<f32>) -> Vector2<f32> {
    length_and_normalize(v).1
}

/// A rotation stored as its cosine and sine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rot {
    pub c: f32,
    pub s: f32,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { c: 1.0, s: 0.0 };

    pub fn from_angle(angle: f32) -> Self {
        Rot { c: angle.cos(), s: angle.sin() }
    }

    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rescales the rotation back onto the unit circle.
    pub fn normalize(self) -> Self {
        let mag = (self.c * self.c + self.s * self.s).sqrt();
        if mag > 0.0 {
            Rot { c: self.c / mag, s: self.s / mag }
        } else {
            Rot::IDENTITY
        }
    }

    /// Normalized linear interpolation between two rotations.
    pub fn nlerp(q1: Rot, q2: Rot, t: f32) -> Self {
        let omt = 1.0 - t;
        Rot {
            c: omt * q1.c + t * q2.c,
            s: omt * q1.s + t * q2.s,
        }.normalize()
    }

    #[inline(always)]
    pub fn rotate(self, v: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    #[inline(always)]
    pub fn inv_rotate(self, v: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composes two rotations, `self * r`.
    pub fn mul(self, r: Rot) -> Rot {
        Rot {
            s: self.s * r.c + self.c * r.s,
            c: self.c * r.c - self.s * r.s,
        }
    }

    /// Composes the inverse of self with r, `transpose(self) * r`.
    pub fn inv_mul(self, r: Rot) -> Rot {
        Rot {
            s: self.c * r.s - self.s * r.c,
            c: self.c * r.c + self.s * r.s,
        }
    }
}

/// A rigid transform: a translation followed by a rotation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub p: Vector2<f32>,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vector2 { x: 0.0, y: 0.0 },
        q: Rot::IDENTITY,
    };

    pub fn new(p: Vector2<f32>, q: Rot) -> Self {
        Transform { p, q }
    }

    pub fn from_translation(p: Vector2<f32>) -> Self {
        Transform { p, q: Rot::IDENTITY }
    }

    /// Maps a local point into world space.
    #[inline(always)]
    pub fn apply(&self, v: Vector2<f32>) -> Vector2<f32> {
        self.q.rotate(v) + self.p
    }

    /// Maps a world point into local space.
    #[inline(always)]
    pub fn apply_inv(&self, v: Vector2<f32>) -> Vector2<f32> {
        self.q.inv_rotate(v - self.p)
    }

    /// `self * b`
    pub fn mul(&self, b: &Transform) -> Transform {
        Transform {
            q: self.q.mul(b.q),
            p: self.q.rotate(b.p) + self.p,
        }
    }

    /// `inverse(self) * b`, the frame of b expressed relative to self.
    pub fn inv_mul(&self, b: &Transform) -> Transform {
        Transform {
            q: self.q.inv_mul(b.q),
            p: self.q.inv_rotate(b.p - self.p),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

/// The motion of a body over a time step. Positions are of the center of
/// mass; `local_center` recovers the body origin.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vector2<f32>,
    /// World center of mass at the start of the step.
    pub c1: Vector2<f32>,
    /// World center of mass at the end of the step.
    pub c2: Vector2<f32>,
    pub q1: Rot,
    pub q2: Rot,
}

impl Sweep {
    /// Describes the motion of a body from transform xf1 to xf2.
    pub fn new(local_center: Vector2<f32>, xf1: &Transform, xf2: &Transform) -> Self {
        Sweep {
            local_center,
            c1: xf1.apply(local_center),
            c2: xf2.apply(local_center),
            q1: xf1.q,
            q2: xf2.q,
        }
    }

    /// A sweep that does not move.
    pub fn stationary(local_center: Vector2<f32>, xf: &Transform) -> Self {
        Sweep::new(local_center, xf, xf)
    }

    /// Interpolates the body transform at a time in [0, 1].
    pub fn transform_at(&self, time: f32) -> Transform {
        let q = Rot::nlerp(self.q1, self.q2, time);
        let c = lerp(self.c1, self.c2, time);
        Transform {
            p: c - q.rotate(self.local_center),
            q,
        }
    }
}

/// A solid circle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vector2<f32>,
    pub radius: f32,
}

/// A solid capsule: two semicircles joined by a rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub center1: Vector2<f32>,
    pub center2: Vector2<f32>,
    pub radius: f32,
}

/// A two sided line segment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub point1: Vector2<f32>,
    pub point2: Vector2<f32>,
}

/// One edge of a polyline, along with the neighboring vertices of that edge.
/// Chain segments are one sided: their normal is the right perpendicular of
/// `point2 - point1`, so a chain running right to left has an upward normal.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainSegment {
    /// The vertex before `segment.point1`.
    pub ghost1: Vector2<f32>,
    pub segment: Segment,
    /// The vertex after `segment.point2`.
    pub ghost2: Vector2<f32>,
    pub chain_id: u32,
}

/// A solid convex polygon with an optional rounding radius. Vertices are
/// stored counter-clockwise and normals[i] is the outward normal of the edge
/// from vertices[i] to vertices[i + 1].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: [Vector2<f32>; MAX_POLYGON_VERTICES],
    pub normals: [Vector2<f32>; MAX_POLYGON_VERTICES],
    pub centroid: Vector2<f32>,
    pub radius: f32,
    pub count: usize,
}

impl Polygon {
    pub fn vertices(&self) -> &[Vector2<f32>] {
        &self.vertices[..self.count]
    }

    pub fn normals(&self) -> &[Vector2<f32>] {
        &self.normals[..self.count]
    }
}

const ZERO2: Vector2<f32> = Vector2 { x: 0.0, y: 0.0 };

fn compute_polygon_centroid(vertices: &[Vector2<f32>]) -> Vector2<f32> {
    let origin = vertices[0];
    let inv3 = 1.0 / 3.0;
    let mut center = ZERO2;
    let mut area = 0.0;
    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let a = 0.5 * cross(e1, e2);
        center += (e1 + e2) * (a * inv3);
        area += a;
    }
    debug_assert!(area > f32::EPSILON, "polygon has no area");
    origin + center / area
}

/// Builds a polygon from counter-clockwise convex points. Between 3 and
/// `MAX_POLYGON_VERTICES` points must be supplied; duplicate or collinear
/// points must already have been welded away.
pub fn make_polygon(points: &[Vector2<f32>], radius: f32) -> Polygon {
    let count = points.len();
    debug_assert!(count >= 3 && count <= MAX_POLYGON_VERTICES);

    let mut polygon = Polygon {
        vertices: [ZERO2; MAX_POLYGON_VERTICES],
        normals: [ZERO2; MAX_POLYGON_VERTICES],
        centroid: ZERO2,
        radius,
        count,
    };
    polygon.vertices[..count].copy_from_slice(points);
    for i in 0..count {
        let edge = points[(i + 1) % count] - points[i];
        debug_assert!(edge.magnitude2() > f32::EPSILON * f32::EPSILON);
        polygon.normals[i] = normalize_or_zero(right_perp(edge));
    }
    polygon.centroid = compute_polygon_centroid(points);
    polygon
}

/// An axis aligned box centered on the origin.
pub fn make_box(half_width: f32, half_height: f32) -> Polygon {
    make_polygon(
        &[
            Vector2::new(-half_width, -half_height),
            Vector2::new(half_width, -half_height),
            Vector2::new(half_width, half_height),
            Vector2::new(-half_width, half_height),
        ],
        0.0,
    )
}

pub fn make_square(half_width: f32) -> Polygon {
    make_box(half_width, half_width)
}

/// A box with rounded corners. The extents given are of the core box; the
/// rounded box extends `radius` beyond them.
pub fn make_rounded_box(half_width: f32, half_height: f32, radius: f32) -> Polygon {
    let mut polygon = make_box(half_width, half_height);
    polygon.radius = radius;
    polygon
}

/// A box whose center and orientation are offset in the local frame.
pub fn make_offset_box(half_width: f32, half_height: f32, center: Vector2<f32>, rotation: Rot) -> Polygon {
    let xf = Transform::new(center, rotation);
    let mut polygon = make_box(half_width, half_height);
    for i in 0..polygon.count {
        polygon.vertices[i] = xf.apply(polygon.vertices[i]);
        polygon.normals[i] = rotation.rotate(polygon.normals[i]);
    }
    polygon.centroid = center;
    polygon
}

/// Represents a capsule as a two vertex polygon, which lets the polygon
/// clipper handle capsules and segments.
pub fn make_capsule(p1: Vector2<f32>, p2: Vector2<f32>, radius: f32) -> Polygon {
    let (length, axis) = length_and_normalize(p2 - p1);
    debug_assert!(length > LINEAR_SLOP, "capsule is too short");
    let normal = right_perp(axis);

    let mut polygon = Polygon {
        vertices: [ZERO2; MAX_POLYGON_VERTICES],
        normals: [ZERO2; MAX_POLYGON_VERTICES],
        centroid: lerp(p1, p2, 0.5),
        radius,
        count: 2,
    };
    polygon.vertices[0] = p1;
    polygon.vertices[1] = p2;
    polygon.normals[0] = normal;
    polygon.normals[1] = -normal;
    polygon
}

impl Capsule {
    pub fn to_polygon(&self) -> Polygon {
        make_capsule(self.center1, self.center2, self.radius)
    }
}
