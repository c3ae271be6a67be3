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

//! Contact manifolds between pairs of shapes.
//!
//! Every function here computes contact points in the frame of shape A and
//! reports them back in world space. Rounded shapes are collided through
//! their core geometry and the radii are applied afterwards along the
//! contact normal. Point ids pack a feature index from each shape so that a
//! contact between the same features keeps its id from one step to the next.

use std::f32;

use cgmath::{InnerSpace, Vector2, Zero};
use serde::{Deserialize, Serialize};

use crate::distance::*;
use crate::geom::*;
use crate::simplex::SimplexCache;

/// Packs two feature indices into a contact point id.
#[inline(always)]
pub fn make_id(a: u8, b: u8) -> u16 {
    (a as u16) << 8 | b as u16
}

/// A contact point. `anchor_a` and `anchor_b` are the contact point relative
/// to the origin of each shape's transform, in world orientation. The impulse
/// fields are scratch space for a solver and are zero when produced here.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifoldPoint {
    pub point: Vector2<f32>,
    pub anchor_a: Vector2<f32>,
    pub anchor_b: Vector2<f32>,
    /// Negative when the shapes overlap.
    pub separation: f32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub total_normal_impulse: f32,
    pub normal_velocity: f32,
    pub id: u16,
    /// Set by `carry_impulses` when a point with the same id existed before.
    pub persisted: bool,
}

impl Default for ManifoldPoint {
    fn default() -> Self {
        ManifoldPoint {
            point: Vector2::zero(),
            anchor_a: Vector2::zero(),
            anchor_b: Vector2::zero(),
            separation: 0.0,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            total_normal_impulse: 0.0,
            normal_velocity: 0.0,
            id: 0,
            persisted: false,
        }
    }
}

/// Up to two contact points sharing a normal that points from A to B.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifold {
    pub points: [ManifoldPoint; 2],
    pub normal: Vector2<f32>,
    pub point_count: usize,
}

impl Default for Manifold {
    fn default() -> Self {
        Manifold {
            points: [ManifoldPoint::default(); 2],
            normal: Vector2::zero(),
            point_count: 0,
        }
    }
}

impl Manifold {
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Adds a point given in the local frame of A.
    fn push_local(
        &mut self,
        xf_a: &Transform, xf_b: &Transform,
        local_point: Vector2<f32>,
        separation: f32,
        id: u16,
    ) {
        debug_assert!(self.point_count < 2);
        let anchor_a = xf_a.q.rotate(local_point);
        self.points[self.point_count] = ManifoldPoint {
            point: xf_a.p + anchor_a,
            anchor_a,
            anchor_b: anchor_a + (xf_a.p - xf_b.p),
            separation,
            id,
            ..ManifoldPoint::default()
        };
        self.point_count += 1;
    }

    /// Turns a manifold for (A, B) into the manifold for (B, A).
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        for mp in self.points_mut() {
            std::mem::swap(&mut mp.anchor_a, &mut mp.anchor_b);
            mp.id = mp.id.rotate_left(8);
        }
    }

    /// Copies accumulated impulses from points of the previous manifold with
    /// matching ids.
    pub fn carry_impulses(&mut self, previous: &Manifold) {
        for mp in self.points_mut() {
            mp.persisted = false;
            if let Some(old) = previous.points().iter().find(|old| old.id == mp.id) {
                mp.normal_impulse = old.normal_impulse;
                mp.tangent_impulse = old.tangent_impulse;
                mp.persisted = true;
            }
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct ClipPoint {
    anchor: Vector2<f32>,
    separation: f32,
    id: u16,
}

/// Builds a manifold from points in the (possibly shifted) frame of A,
/// dropping points beyond the speculative distance.
fn clipped_manifold(
    xf_a: &Transform, xf_b: &Transform,
    origin: Vector2<f32>,
    normal: Vector2<f32>,
    points: &[ClipPoint],
) -> Manifold {
    let mut manifold = Manifold::default();
    manifold.normal = xf_a.q.rotate(normal);
    for cp in points {
        if cp.separation <= SPECULATIVE_DISTANCE {
            manifold.push_local(xf_a, xf_b, cp.anchor + origin, cp.separation, cp.id);
        }
    }
    if manifold.point_count == 0 {
        manifold.normal = Vector2::zero();
    }
    manifold
}

fn single_point(
    xf_a: &Transform, xf_b: &Transform,
    normal: Vector2<f32>,
    local_point: Vector2<f32>,
    separation: f32,
    id: u16,
) -> Manifold {
    let mut manifold = Manifold::default();
    manifold.normal = xf_a.q.rotate(normal);
    manifold.push_local(xf_a, xf_b, local_point, separation, id);
    manifold
}

#[inline(always)]
fn next_index(i: usize, count: usize) -> usize {
    if i + 1 < count { i + 1 } else { 0 }
}

pub fn collide_circles(
    circle_a: &Circle, xf_a: &Transform,
    circle_b: &Circle, xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);
    let point_a = circle_a.center;
    let point_b = xf.apply(circle_b.center);

    let (distance, normal) = length_and_normalize(point_b - point_a);
    let separation = distance - circle_a.radius - circle_b.radius;
    if separation > SPECULATIVE_DISTANCE {
        return Manifold::default();
    }

    let c_a = point_a + normal * circle_a.radius;
    let c_b = point_b - normal * circle_b.radius;
    single_point(xf_a, xf_b, normal, lerp(c_a, c_b, 0.5), separation, 0)
}

pub fn collide_capsule_and_circle(
    capsule_a: &Capsule, xf_a: &Transform,
    circle_b: &Circle, xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);
    let p_b = xf.apply(circle_b.center);

    // Closest point on the capsule core.
    let p1 = capsule_a.center1;
    let p2 = capsule_a.center2;
    let e = p2 - p1;
    let s1 = (p_b - p1).dot(e);
    let s2 = (p2 - p_b).dot(e);
    let p_a = if s1 < 0.0 {
        p1
    } else if s2 < 0.0 {
        p2
    } else {
        p1 + e * (s1 / e.dot(e))
    };

    let (distance, normal) = length_and_normalize(p_b - p_a);
    let separation = distance - capsule_a.radius - circle_b.radius;
    if separation > SPECULATIVE_DISTANCE {
        return Manifold::default();
    }

    let c_a = p_a + normal * capsule_a.radius;
    let c_b = p_b - normal * circle_b.radius;
    single_point(xf_a, xf_b, normal, lerp(c_a, c_b, 0.5), separation, 0)
}

pub fn collide_segment_and_circle(
    segment_a: &Segment, xf_a: &Transform,
    circle_b: &Circle, xf_b: &Transform,
) -> Manifold {
    let capsule_a = Capsule {
        center1: segment_a.point1,
        center2: segment_a.point2,
        radius: 0.0,
    };
    collide_capsule_and_circle(&capsule_a, xf_a, circle_b, xf_b)
}

pub fn collide_polygon_and_circle(
    polygon_a: &Polygon, xf_a: &Transform,
    circle_b: &Circle, xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);
    let c = xf.apply(circle_b.center);
    let radius_a = polygon_a.radius;
    let radius_b = circle_b.radius;
    let radius = radius_a + radius_b;

    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();

    // Edge of minimum penetration.
    let mut normal_index = 0;
    let mut separation = -f32::MAX;
    for (i, (v, n)) in vertices.iter().zip(normals.iter()).enumerate() {
        let s = n.dot(c - v);
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }
    if separation - radius > SPECULATIVE_DISTANCE {
        return Manifold::default();
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[next_index(normal_index, vertices.len())];
    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);

    let vertex_region = if u1 < 0.0 && separation > f32::EPSILON {
        Some(v1)
    } else if u2 < 0.0 && separation > f32::EPSILON {
        Some(v2)
    } else {
        None
    };

    match vertex_region {
        Some(v) => {
            // Center is outside the polygon and closest to a vertex.
            let normal = normalize_or_zero(c - v);
            let separation = (c - v).dot(normal);
            if separation - radius > SPECULATIVE_DISTANCE {
                return Manifold::default();
            }
            let c_a = v + normal * radius_a;
            let c_b = c - normal * radius_b;
            single_point(xf_a, xf_b, normal, lerp(c_a, c_b, 0.5), (c_b - c_a).dot(normal), 0)
        },
        None => {
            // Center is over the face, and possibly inside the polygon.
            let normal = normals[normal_index];
            let c_a = c + normal * (radius_a - (c - v1).dot(normal));
            let c_b = c - normal * radius_b;
            single_point(xf_a, xf_b, normal, lerp(c_a, c_b, 0.5), separation - radius, 0)
        },
    }
}

/// Index of the contact feature at a barycentric position along a segment:
/// 0 and 1 are the end points, 2 is the interior.
fn segment_feature(fraction: f32) -> u8 {
    if fraction <= 0.0 {
        0
    } else if fraction >= 1.0 {
        1
    } else {
        2
    }
}

pub fn collide_capsules(
    capsule_a: &Capsule, xf_a: &Transform,
    capsule_b: &Capsule, xf_b: &Transform,
) -> Manifold {
    // Work relative to the first center of A to limit round-off.
    let origin = capsule_a.center1;
    let sf_a = Transform::new(xf_a.p + xf_a.q.rotate(origin), xf_a.q);
    let xf = sf_a.inv_mul(xf_b);

    let p1 = Vector2::zero();
    let q1 = capsule_a.center2 - origin;
    let p2 = xf.apply(capsule_b.center1);
    let q2 = xf.apply(capsule_b.center2);

    let result = segment_distance(p1, q1, p2, q2);
    let radius_a = capsule_a.radius;
    let radius_b = capsule_b.radius;
    let radius = radius_a + radius_b;
    let max_distance = radius + SPECULATIVE_DISTANCE;
    if result.distance_squared > max_distance * max_distance {
        return Manifold::default();
    }
    let distance = result.distance_squared.sqrt();

    let (length1, u1) = length_and_normalize(q1 - p1);
    let (length2, u2) = length_and_normalize(q2 - p2);

    // Projections of each core onto the other, to detect end regions.
    let fp2 = (p2 - p1).dot(u1);
    let fq2 = (q2 - p1).dot(u1);
    let outside_a = (fp2 <= 0.0 && fq2 <= 0.0) || (fp2 >= length1 && fq2 >= length1);
    let fp1 = (p1 - p2).dot(u2);
    let fq1 = (q1 - p2).dot(u2);
    let outside_b = (fp1 <= 0.0 && fq1 <= 0.0) || (fp1 >= length2 && fq1 >= length2);

    if !outside_a && !outside_b {
        // Clip the core of B to the extent of the core of A.
        let v_lower = if fp2 < 0.0 && fq2 - fp2 > f32::EPSILON {
            lerp(p2, q2, -fp2 / (fq2 - fp2))
        } else if fq2 < 0.0 && fp2 - fq2 > f32::EPSILON {
            lerp(q2, p2, -fq2 / (fp2 - fq2))
        } else if fp2 < fq2 {
            p2
        } else {
            q2
        };

        let v_upper = if fp2 > length1 && fp2 - fq2 > f32::EPSILON {
            lerp(p2, q2, (fp2 - length1) / (fp2 - fq2))
        } else if fq2 > length1 && fq2 - fp2 > f32::EPSILON {
            lerp(q2, p2, (fq2 - length1) / (fq2 - fp2))
        } else if fp2 < fq2 {
            q2
        } else {
            p2
        };

        // Face normal of A on the side of B.
        let mut normal = left_perp(u1);
        let side = if result.distance_squared > f32::EPSILON * f32::EPSILON {
            (result.closest2 - result.closest1).dot(normal)
        } else {
            (lerp(p2, q2, 0.5) - p1).dot(normal)
        };
        if side < 0.0 {
            normal = -normal;
        }

        let separation_lower = (v_lower - p1).dot(normal);
        let separation_upper = (v_upper - p1).dot(normal);

        // Cores that cross fall back to a single point.
        if separation_lower >= 0.0 && separation_upper >= 0.0 {
            let lower_b: u8 = if fp2 < fq2 { 0 } else { 1 };
            let offset = |v: Vector2<f32>, s: f32| v + normal * (0.5 * (radius_a - radius_b - s));
            let points = [
                ClipPoint {
                    anchor: offset(v_lower, separation_lower),
                    separation: separation_lower - radius,
                    id: make_id(0, lower_b),
                },
                ClipPoint {
                    anchor: offset(v_upper, separation_upper),
                    separation: separation_upper - radius,
                    id: make_id(1, 1 - lower_b),
                },
            ];
            let manifold = clipped_manifold(xf_a, xf_b, origin, normal, &points);
            if !manifold.is_empty() {
                return manifold;
            }
        }
    }

    let (length, normal) = length_and_normalize(result.closest2 - result.closest1);
    let normal = if length == 0.0 { left_perp(u1) } else { normal };
    let c_a = result.closest1 + normal * radius_a;
    let c_b = result.closest2 - normal * radius_b;
    let id = make_id(segment_feature(result.fraction1), segment_feature(result.fraction2));
    single_point(xf_a, xf_b, normal, lerp(c_a, c_b, 0.5) + origin, distance - radius, id)
}

pub fn collide_segment_and_capsule(
    segment_a: &Segment, xf_a: &Transform,
    capsule_b: &Capsule, xf_b: &Transform,
) -> Manifold {
    let capsule_a = Capsule {
        center1: segment_a.point1,
        center2: segment_a.point2,
        radius: 0.0,
    };
    collide_capsules(&capsule_a, xf_a, capsule_b, xf_b)
}

pub fn collide_polygon_and_capsule(
    polygon_a: &Polygon, xf_a: &Transform,
    capsule_b: &Capsule, xf_b: &Transform,
) -> Manifold {
    let polygon_b = capsule_b.to_polygon();
    collide_polygons(polygon_a, xf_a, &polygon_b, xf_b)
}

pub fn collide_segment_and_polygon(
    segment_a: &Segment, xf_a: &Transform,
    polygon_b: &Polygon, xf_b: &Transform,
) -> Manifold {
    let polygon_a = make_capsule(segment_a.point1, segment_a.point2, 0.0);
    collide_polygons(&polygon_a, xf_a, polygon_b, xf_b)
}

/// Largest separation of poly2 along the edge normals of poly1, and the edge
/// that achieves it.
fn find_max_separation(poly1: &Polygon, poly2: &Polygon) -> (usize, f32) {
    let mut best_index = 0;
    let mut max_separation = -f32::MAX;
    for (i, (n, v1)) in poly1.normals().iter().zip(poly1.vertices()).enumerate() {
        let si = poly2.vertices()
            .iter()
            .map(|v2| n.dot(v2 - v1))
            .fold(f32::MAX, f32::min);
        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `polygon` whose normal is most anti-parallel to `direction`.
fn find_incident_edge(polygon: &Polygon, direction: Vector2<f32>) -> usize {
    let mut edge = 0;
    let mut min_dot = f32::MAX;
    for (i, n) in polygon.normals().iter().enumerate() {
        let dot = direction.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            edge = i;
        }
    }
    edge
}

/// Clips the incident edge against the side planes of the reference edge.
/// With `flip` set, B holds the reference edge. Returns the normal in the
/// frame of A, pointing from A to B, along with both clipped points.
fn clip_polygons(
    poly_a: &Polygon, poly_b: &Polygon,
    edge_a: usize, edge_b: usize,
    flip: bool,
) -> (Vector2<f32>, [ClipPoint; 2]) {
    let (poly1, i11, poly2, i21) = if flip {
        (poly_b, edge_b, poly_a, edge_a)
    } else {
        (poly_a, edge_a, poly_b, edge_b)
    };
    let i12 = next_index(i11, poly1.count);
    let i22 = next_index(i21, poly2.count);

    let normal = poly1.normals[i11];

    // Reference edge
    let v11 = poly1.vertices[i11];
    let v12 = poly1.vertices[i12];

    // Incident edge
    let v21 = poly2.vertices[i21];
    let v22 = poly2.vertices[i22];

    let tangent = cross_sv(1.0, normal);

    let lower1 = 0.0;
    let upper1 = (v12 - v11).dot(tangent);

    // The incident edge runs against the tangent.
    let upper2 = (v21 - v11).dot(tangent);
    let lower2 = (v22 - v11).dot(tangent);

    let v_lower = if lower2 < lower1 && upper2 - lower2 > f32::EPSILON {
        lerp(v22, v21, (lower1 - lower2) / (upper2 - lower2))
    } else {
        v22
    };

    let v_upper = if upper2 > upper1 && upper2 - lower2 > f32::EPSILON {
        lerp(v22, v21, (upper1 - lower2) / (upper2 - lower2))
    } else {
        v21
    };

    let separation_lower = (v_lower - v11).dot(normal);
    let separation_upper = (v_upper - v11).dot(normal);

    // Midpoint between the two rounded surfaces.
    let v_lower = v_lower + normal * (0.5 * (poly1.radius - poly2.radius - separation_lower));
    let v_upper = v_upper + normal * (0.5 * (poly1.radius - poly2.radius - separation_upper));

    let radius = poly1.radius + poly2.radius;
    let lower = |id| ClipPoint { anchor: v_lower, separation: separation_lower - radius, id };
    let upper = |id| ClipPoint { anchor: v_upper, separation: separation_upper - radius, id };

    if flip {
        (
            -normal,
            [
                upper(make_id(i21 as u8, i12 as u8)),
                lower(make_id(i22 as u8, i11 as u8)),
            ],
        )
    } else {
        (
            normal,
            [
                lower(make_id(i11 as u8, i22 as u8)),
                upper(make_id(i12 as u8, i21 as u8)),
            ],
        )
    }
}

pub fn collide_polygons(
    polygon_a: &Polygon, xf_a: &Transform,
    polygon_b: &Polygon, xf_b: &Transform,
) -> Manifold {
    // Shift A so its first vertex is the origin and put B in that frame.
    let origin = polygon_a.vertices[0];
    let sf_a = Transform::new(xf_a.p + xf_a.q.rotate(origin), xf_a.q);
    let xf = sf_a.inv_mul(xf_b);

    let mut local_a = *polygon_a;
    for v in local_a.vertices[..polygon_a.count].iter_mut() {
        *v -= origin;
    }

    let mut local_b = *polygon_b;
    for i in 0..polygon_b.count {
        local_b.vertices[i] = xf.apply(polygon_b.vertices[i]);
        local_b.normals[i] = xf.q.rotate(polygon_b.normals[i]);
    }

    let (mut edge_a, separation_a) = find_max_separation(&local_a, &local_b);
    let (mut edge_b, separation_b) = find_max_separation(&local_b, &local_a);

    let radius = local_a.radius + local_b.radius;
    if separation_a > SPECULATIVE_DISTANCE + radius || separation_b > SPECULATIVE_DISTANCE + radius {
        return Manifold::default();
    }

    // Prefer A as the reference unless B is clearly better.
    let flip = separation_b > separation_a + 0.1 * LINEAR_SLOP;
    if flip {
        edge_a = find_incident_edge(&local_a, local_b.normals[edge_b]);
    } else {
        edge_b = find_incident_edge(&local_b, local_a.normals[edge_a]);
    }
    let separation = if flip { separation_b } else { separation_a };

    // Separated polygons may be closest at a pair of vertices, which the
    // clipper cannot represent. The slop keeps the normal well defined.
    if separation > 0.1 * LINEAR_SLOP {
        let i11 = edge_a;
        let i12 = next_index(edge_a, local_a.count);
        let i21 = edge_b;
        let i22 = next_index(edge_b, local_b.count);

        let result = segment_distance(
            local_a.vertices[i11], local_a.vertices[i12],
            local_b.vertices[i21], local_b.vertices[i22],
        );

        let end_point = |fraction: f32, first: usize, second: usize| {
            if fraction == 0.0 {
                Some(first)
            } else if fraction == 1.0 {
                Some(second)
            } else {
                None
            }
        };

        if let (Some(ia), Some(ib)) = (
            end_point(result.fraction1, i11, i12),
            end_point(result.fraction2, i21, i22),
        ) {
            let v1 = local_a.vertices[ia];
            let v2 = local_b.vertices[ib];
            let distance = result.distance_squared.sqrt();
            if distance > SPECULATIVE_DISTANCE + radius {
                return Manifold::default();
            }
            let normal = normalize_or_zero(v2 - v1);
            let c1 = v1 + normal * local_a.radius;
            let c2 = v2 - normal * local_b.radius;
            return single_point(
                xf_a, xf_b,
                normal,
                lerp(c1, c2, 0.5) + origin,
                distance - radius,
                make_id(ia as u8, ib as u8),
            );
        }
    }

    let (normal, points) = clip_polygons(&local_a, &local_b, edge_a, edge_b, flip);
    clipped_manifold(xf_a, xf_b, origin, normal, &points)
}

pub fn collide_chain_segment_and_circle(
    chain_a: &ChainSegment, xf_a: &Transform,
    circle_b: &Circle, xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);
    let p_b = xf.apply(circle_b.center);

    let p1 = chain_a.segment.point1;
    let p2 = chain_a.segment.point2;
    let e = p2 - p1;

    // One sided: only the right side collides.
    let offset = right_perp(e).dot(p_b - p1);
    if offset < 0.0 {
        return Manifold::default();
    }

    let u = e.dot(p2 - p_b);
    let v = e.dot(p_b - p1);

    let p_a = if v <= 0.0 {
        // Behind point1, owned by the previous segment unless past its end.
        let prev_edge = p1 - chain_a.ghost1;
        if prev_edge.dot(p_b - p1) <= 0.0 {
            return Manifold::default();
        }
        p1
    } else if u <= 0.0 {
        // Ahead of point2, owned by the next segment when in its region.
        let next_edge = chain_a.ghost2 - p2;
        if next_edge.dot(p_b - p2) > 0.0 {
            return Manifold::default();
        }
        p2
    } else {
        let ee = e.dot(e);
        if ee > 0.0 {
            (p1 * u + p2 * v) / ee
        } else {
            p1
        }
    };

    let (distance, normal) = length_and_normalize(p_b - p_a);
    let separation = distance - circle_b.radius;
    if separation > SPECULATIVE_DISTANCE {
        return Manifold::default();
    }

    let c_b = p_b - normal * circle_b.radius;
    single_point(xf_a, xf_b, normal, lerp(p_a, c_b, 0.5), separation, 0)
}

pub fn collide_chain_segment_and_capsule(
    chain_a: &ChainSegment, xf_a: &Transform,
    capsule_b: &Capsule, xf_b: &Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    let polygon_b = capsule_b.to_polygon();
    collide_chain_segment_and_polygon(chain_a, xf_a, &polygon_b, xf_b, cache)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum NormalType {
    /// The normal belongs to a neighboring segment.
    Skip,
    Admit,
    /// The normal lies in a concave corner and snaps to the segment normal.
    Snap,
}

/// The segment with the directions of its neighbors.
struct ChainParams {
    edge1: Vector2<f32>,
    normal0: Vector2<f32>,
    normal2: Vector2<f32>,
    convex1: bool,
    convex2: bool,
}

impl ChainParams {
    fn new(chain: &ChainSegment) -> Self {
        const CONVEX_TOLERANCE: f32 = 0.01;

        let p1 = chain.segment.point1;
        let p2 = chain.segment.point2;
        let edge1 = normalize_or_zero(p2 - p1);
        let edge0 = normalize_or_zero(p1 - chain.ghost1);
        let edge2 = normalize_or_zero(chain.ghost2 - p2);
        ChainParams {
            edge1,
            normal0: right_perp(edge0),
            normal2: right_perp(edge2),
            convex1: cross(edge0, edge1) >= CONVEX_TOLERANCE,
            convex2: cross(edge1, edge2) >= CONVEX_TOLERANCE,
        }
    }

    /// Decides who owns a candidate contact normal by where it falls on the
    /// Gauss map of the polyline.
    fn classify(&self, normal: Vector2<f32>) -> NormalType {
        const SIN_TOLERANCE: f32 = 0.01;

        if normal.dot(self.edge1) <= 0.0 {
            // Towards the tail of the segment.
            if !self.convex1 {
                NormalType::Snap
            } else if cross(normal, self.normal0) > SIN_TOLERANCE {
                NormalType::Skip
            } else {
                NormalType::Admit
            }
        } else if !self.convex2 {
            NormalType::Snap
        } else if cross(self.normal2, normal) > SIN_TOLERANCE {
            NormalType::Skip
        } else {
            NormalType::Admit
        }
    }
}

/// Clips segment b1-b2 against the extent of the reference segment a1-a2.
/// `normal` is the outward normal of the reference segment. Returns `None`
/// when the segments do not overlap along the reference edge.
fn clip_segments(
    a1: Vector2<f32>, a2: Vector2<f32>,
    b1: Vector2<f32>, b2: Vector2<f32>,
    normal: Vector2<f32>,
    radius_a: f32, radius_b: f32,
    id1: u16, id2: u16,
) -> Option<[ClipPoint; 2]> {
    let tangent = left_perp(normal);

    let lower1 = 0.0;
    let upper1 = (a2 - a1).dot(tangent);

    // The incident segment runs against the tangent.
    let upper2 = (b1 - a1).dot(tangent);
    let lower2 = (b2 - a1).dot(tangent);

    if upper2 < lower1 || upper1 < lower2 {
        return None;
    }

    let v_lower = if lower2 < lower1 && upper2 - lower2 > f32::EPSILON {
        lerp(b2, b1, (lower1 - lower2) / (upper2 - lower2))
    } else {
        b2
    };

    let v_upper = if upper2 > upper1 && upper2 - lower2 > f32::EPSILON {
        lerp(b2, b1, (upper1 - lower2) / (upper2 - lower2))
    } else {
        b1
    };

    let separation_lower = (v_lower - a1).dot(normal);
    let separation_upper = (v_upper - a1).dot(normal);
    let radius = radius_a + radius_b;

    Some([
        ClipPoint {
            anchor: v_lower + normal * (0.5 * (radius_a - radius_b - separation_lower)),
            separation: separation_lower - radius,
            id: id1,
        },
        ClipPoint {
            anchor: v_upper + normal * (0.5 * (radius_a - radius_b - separation_upper)),
            separation: separation_upper - radius,
            id: id2,
        },
    ])
}

/// Collides a polygon with one segment of a chain, rejecting contacts that
/// belong to the neighboring segments. The cache warm starts the distance
/// query between the segment and the polygon and is owned by the caller per
/// (segment, polygon) pair.
pub fn collide_chain_segment_and_polygon(
    chain_a: &ChainSegment, xf_a: &Transform,
    polygon_b: &Polygon, xf_b: &Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);
    let centroid_b = xf.apply(polygon_b.centroid);
    let radius_b = polygon_b.radius;

    let p1 = chain_a.segment.point1;
    let p2 = chain_a.segment.point2;

    let params = ChainParams::new(chain_a);
    let normal1 = right_perp(params.edge1);

    let behind1 = normal1.dot(centroid_b - p1) < 0.0;
    let behind0 = !params.convex1 || params.normal0.dot(centroid_b - p1) < 0.0;
    let behind2 = !params.convex2 || params.normal2.dot(centroid_b - p2) < 0.0;
    if behind1 && behind0 && behind2 {
        return Manifold::default();
    }

    // Polygon B in the frame of A.
    let count = polygon_b.count;
    let mut vertices = [Vector2::zero(); MAX_POLYGON_VERTICES];
    let mut normals = [Vector2::zero(); MAX_POLYGON_VERTICES];
    for i in 0..count {
        vertices[i] = xf.apply(polygon_b.vertices[i]);
        normals[i] = xf.q.rotate(polygon_b.normals[i]);
    }

    let input = DistanceInput {
        proxy_a: make_proxy(&[p1, p2], 0.0),
        proxy_b: make_proxy(&vertices[..count], 0.0),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };
    let output = shape_distance(&input, cache, None);
    if output.distance > radius_b + SPECULATIVE_DISTANCE {
        return Manifold::default();
    }

    // Concave neighbors snap to the segment normal.
    let n0 = if params.convex1 { params.normal0 } else { normal1 };
    let n2 = if params.convex2 { params.normal2 } else { normal1 };

    // Clips the segment against a polygon edge used as the reference.
    let polygon_reference = |ia1: usize, normal: Vector2<f32>| {
        let ia2 = next_index(ia1, count);
        let a1 = vertices[ia1];
        let a2 = vertices[ia2];

        // The neighbor owns the contact when its normal is more aligned.
        let incident_neighbor = if normal.dot(p1 - a1) < normal.dot(p2 - a1) { n0 } else { n2 };
        if incident_neighbor.dot(normal) < normal1.dot(normal) {
            return Manifold::default();
        }

        match clip_segments(
            a1, a2, p1, p2,
            normal,
            radius_b, 0.0,
            make_id(ia1 as u8, 1), make_id(ia2 as u8, 0),
        ) {
            Some(points) => clipped_manifold(xf_a, xf_b, Vector2::zero(), -normal, &points),
            None => Manifold::default(),
        }
    };

    let mut incident_index = None;
    let mut incident_normal = None;

    if !behind1 && output.distance > 0.1 * LINEAR_SLOP {
        // Closest features can be a vertex pair or a vertex and an edge even
        // when two points of contact are wanted.
        if cache.count == 1 {
            let normal = normalize_or_zero(output.point_b - output.point_a);
            match params.classify(normal) {
                NormalType::Skip => return Manifold::default(),
                NormalType::Admit => {
                    let c_b = output.point_b - normal * radius_b;
                    return single_point(
                        xf_a, xf_b,
                        normal,
                        lerp(output.point_a, c_b, 0.5),
                        output.distance - radius_b,
                        make_id(cache.index_a[0], cache.index_b[0]),
                    );
                },
                NormalType::Snap => incident_index = Some(cache.index_b[0] as usize),
            }
        } else {
            let ia1 = cache.index_a[0];
            let ia2 = cache.index_a[1];
            let ib1 = cache.index_b[0] as usize;
            let ib2 = cache.index_b[1] as usize;

            if ia1 == ia2 {
                // A vertex of the segment against an edge of the polygon.
                debug_assert!(ib1 != ib2);
                let direction = output.point_a - output.point_b;
                let ib = if direction.dot(normals[ib1]) > direction.dot(normals[ib2]) { ib1 } else { ib2 };
                let normal_b = normals[ib];
                match params.classify(-normal_b) {
                    NormalType::Skip => return Manifold::default(),
                    NormalType::Admit => return polygon_reference(ib, normal_b),
                    NormalType::Snap => incident_normal = Some(ib),
                }
            } else {
                // An edge of the segment against a vertex of the polygon.
                let dot1 = normal1.dot(vertices[ib1] - p1);
                let dot2 = normal1.dot(vertices[ib2] - p2);
                incident_index = Some(if dot1 < dot2 { ib1 } else { ib2 });
            }
        }
    } else {
        // Overlapping or touching: separating axis test with the segment
        // normal, the convex neighbor normals and the admitted polygon
        // normals.
        let min_separation = |axis: Vector2<f32>, point: Vector2<f32>| {
            let mut best = (f32::MAX, 0);
            for (i, v) in vertices[..count].iter().enumerate() {
                let s = axis.dot(v - point);
                if s < best.0 {
                    best = (s, i);
                }
            }
            best
        };

        let (mut edge_separation, deepest) = min_separation(normal1, p1);
        incident_index = Some(deepest);

        if params.convex1 {
            let (s0, _) = min_separation(params.normal0, p1);
            if s0 > edge_separation {
                edge_separation = s0;
                incident_index = None;
            }
        }

        if params.convex2 {
            let (s2, _) = min_separation(params.normal2, p2);
            if s2 > edge_separation {
                edge_separation = s2;
                incident_index = None;
            }
        }

        let mut polygon_separation = -f32::MAX;
        let mut reference_index = None;
        for i in 0..count {
            let n = normals[i];
            if params.classify(-n) != NormalType::Admit {
                continue;
            }
            let p = vertices[i];
            let s = n.dot(p2 - p).min(n.dot(p1 - p));
            if s > polygon_separation {
                polygon_separation = s;
                reference_index = Some(i);
            }
        }

        if let Some(ia1) = reference_index {
            if polygon_separation > edge_separation {
                return polygon_reference(ia1, normals[ia1]);
            }
        }

        if incident_index.is_none() {
            // A neighboring segment has the separating axis.
            return Manifold::default();
        }
    }

    // The segment normal is the reference. Pick the polygon edge adjacent to
    // the incident vertex that is most anti-parallel to it.
    let (ib1, ib2) = match (incident_normal, incident_index) {
        (Some(ib), _) => (ib, next_index(ib, count)),
        (None, Some(i2)) => {
            let i1 = if i2 > 0 { i2 - 1 } else { count - 1 };
            if normal1.dot(normals[i1]) < normal1.dot(normals[i2]) {
                (i1, i2)
            } else {
                (i2, next_index(i2, count))
            }
        },
        (None, None) => return Manifold::default(),
    };

    match clip_segments(
        p1, p2, vertices[ib1], vertices[ib2],
        normal1,
        0.0, radius_b,
        make_id(0, ib2 as u8), make_id(1, ib1 as u8),
    ) {
        Some(points) => clipped_manifold(xf_a, xf_b, Vector2::zero(), normal1, &points),
        None => Manifold::default(),
    }
}
