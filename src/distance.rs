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

//! Convex distance queries. Every convex shape is reduced to a `ShapeProxy`,
//! a small point cloud with a rounding radius, and GJK runs on pairs of
//! proxies.

use std::f32;

use cgmath::{InnerSpace, Vector2, Zero};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::bounds::CastOutput;
use crate::geom::*;
use crate::simplex::*;

/// Maximum number of support point evaluations in a distance query.
pub const MAX_GJK_ITERATIONS: u32 = 20;

/// A convex point cloud with a rounding radius. One point models a circle,
/// two points a capsule or segment, more points a polygon.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeProxy {
    pub points: [Vector2<f32>; MAX_POLYGON_VERTICES],
    pub count: usize,
    pub radius: f32,
}

impl ShapeProxy {
    pub fn points(&self) -> &[Vector2<f32>] {
        &self.points[..self.count]
    }

    /// Index of the point furthest along direction.
    pub fn find_support(&self, direction: Vector2<f32>) -> usize {
        let mut best_index = 0;
        let mut best_value = self.points[0].dot(direction);
        for (i, p) in self.points().iter().enumerate().skip(1) {
            let value = p.dot(direction);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Builds a proxy from up to `MAX_POLYGON_VERTICES` points.
pub fn make_proxy(points: &[Vector2<f32>], radius: f32) -> ShapeProxy {
    let count = points.len().min(MAX_POLYGON_VERTICES);
    debug_assert!(count > 0 && count == points.len());
    let mut proxy = ShapeProxy {
        points: [Vector2::zero(); MAX_POLYGON_VERTICES],
        count,
        radius,
    };
    proxy.points[..count].copy_from_slice(&points[..count]);
    proxy
}

/// Input to `shape_distance`.
#[derive(Copy, Clone, Debug)]
pub struct DistanceInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Account for the rounding radii of the proxies.
    pub use_radii: bool,
}

/// Result of `shape_distance`. Points are in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on A.
    pub point_a: Vector2<f32>,
    /// Closest point on B.
    pub point_b: Vector2<f32>,
    /// Unit vector from A toward B, zero when the shapes touch.
    pub normal: Vector2<f32>,
    pub distance: f32,
    /// Number of support point evaluations.
    pub iterations: u32,
    /// Number of simplexes written to the recording buffer.
    pub simplex_count: usize,
}

/// Computes the closest points between two convex proxies with GJK.
///
/// The cache warm starts the search and is updated with the final simplex.
/// When `simplexes` is given, the simplex of each iteration is recorded into
/// it until it is full.
///
/// Without radii, overlapping proxies report a distance of zero and no
/// normal; penetration depth comes from the manifold functions.
pub fn shape_distance(
    input: &DistanceInput,
    cache: &mut SimplexCache,
    mut simplexes: Option<&mut [Simplex]>,
) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::from_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);
    let mut simplex_count = 0;
    let mut record = |simplex: &Simplex| {
        if let Some(buffer) = simplexes.as_mut() {
            if simplex_count < buffer.len() {
                buffer[simplex_count] = *simplex;
                simplex_count += 1;
            }
        }
    };
    record(&simplex);

    // Support point indices of the previous simplex, used to detect cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iteration = 0;
    while iteration < MAX_GJK_ITERATIONS {
        let save_count = simplex.count;
        for (i, v) in simplex.vertices().iter().enumerate() {
            save_a[i] = v.index_a;
            save_b[i] = v.index_b;
        }

        simplex.solve();

        // The origin is inside the triangle, so the proxies overlap.
        if simplex.count == 3 {
            break;
        }

        record(&simplex);

        let d = simplex.search_direction();
        if d.magnitude2() < f32::EPSILON * f32::EPSILON {
            // The origin is on the segment or very close to it; the
            // direction is not trustworthy.
            break;
        }

        // support(B, d) - support(A, -d)
        let index_a = proxy_a.find_support(xf_a.q.inv_rotate(-d));
        let index_b = proxy_b.find_support(xf_b.q.inv_rotate(d));

        iteration += 1;

        // A repeated support point means no progress can be made.
        let duplicate = (0..save_count).any(|i| save_a[i] == index_a && save_b[i] == index_b);
        if duplicate {
            break;
        }

        let w_a = xf_a.apply(proxy_a.points[index_a]);
        let w_b = xf_b.apply(proxy_b.points[index_b]);
        simplex.vertices[simplex.count] = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 1.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    if iteration == MAX_GJK_ITERATIONS {
        trace!("shape distance hit the iteration cap with {} vertices", simplex.count);
    }

    record(&simplex);

    let (mut point_a, mut point_b) = simplex.witness_points();
    let (mut distance, normal) = length_and_normalize(point_b - point_a);

    *cache = simplex.to_cache();

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;
        if distance > r_a + r_b {
            distance -= r_a + r_b;
            point_a += normal * r_a;
            point_b -= normal * r_b;
        } else {
            // The rounded surfaces overlap and share a single point. The
            // normal is zero when the cores touch.
            let p = lerp(point_a + normal * r_a, point_b - normal * r_b, 0.5);
            point_a = p;
            point_b = p;
            distance = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        normal,
        distance,
        iterations: iteration,
        simplex_count,
    }
}

/// Closest points between the segments p1-q1 and p2-q2.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentDistanceResult {
    pub closest1: Vector2<f32>,
    pub closest2: Vector2<f32>,
    /// Barycentric position of closest1 along the first segment.
    pub fraction1: f32,
    /// Barycentric position of closest2 along the second segment.
    pub fraction2: f32,
    pub distance_squared: f32,
}

pub fn segment_distance(
    p1: Vector2<f32>, q1: Vector2<f32>,
    p2: Vector2<f32>, q2: Vector2<f32>,
) -> SegmentDistanceResult {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let dd1 = d1.dot(d1);
    let dd2 = d2.dot(d2);
    let rd1 = r.dot(d1);
    let rd2 = r.dot(d2);

    let eps_sqr = f32::EPSILON * f32::EPSILON;
    let clamp = |x: f32| x.max(0.0).min(1.0);

    let (fraction1, fraction2) = if dd1 < eps_sqr || dd2 < eps_sqr {
        if dd1 >= eps_sqr {
            // Second segment is a point.
            (clamp(-rd1 / dd1), 0.0)
        } else if dd2 >= eps_sqr {
            // First segment is a point.
            (0.0, clamp(rd2 / dd2))
        } else {
            (0.0, 0.0)
        }
    } else {
        let d12 = d1.dot(d2);
        let denom = dd1 * dd2 - d12 * d12;

        // Parallel segments start from the first endpoint.
        let mut f1 = if denom != 0.0 {
            clamp((d12 * rd2 - rd1 * dd2) / denom)
        } else {
            0.0
        };

        // Point on the second segment closest to p1 + f1 * d1, clamping
        // the second segment forces a redo on the first.
        let mut f2 = (d12 * f1 + rd2) / dd2;
        if f2 < 0.0 {
            f2 = 0.0;
            f1 = clamp(-rd1 / dd1);
        } else if f2 > 1.0 {
            f2 = 1.0;
            f1 = clamp((d12 - rd1) / dd1);
        }
        (f1, f2)
    };

    let closest1 = p1 + d1 * fraction1;
    let closest2 = p2 + d2 * fraction2;
    SegmentDistanceResult {
        closest1,
        closest2,
        fraction1,
        fraction2,
        distance_squared: (closest2 - closest1).magnitude2(),
    }
}

/// A proxy swept through a dynamic tree.
#[derive(Copy, Clone, Debug)]
pub struct ShapeCastInput {
    pub proxy: ShapeProxy,
    pub translation: Vector2<f32>,
    pub max_fraction: f32,
}

/// Input to `shape_cast`: B moves by `translation_b` while A stays put.
#[derive(Copy, Clone, Debug)]
pub struct ShapeCastPairInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub translation_b: Vector2<f32>,
    pub max_fraction: f32,
}

/// Maximum number of conservative advancement steps in a shape cast.
pub const MAX_SHAPE_CAST_ITERATIONS: u32 = 20;

/// Finds the first fraction of `translation_b` at which B touches A, by
/// conservative advancement on the GJK distance. The output point and normal
/// are in world space, the normal pointing from A toward B. Proxies that
/// already touch or overlap hit at fraction zero.
pub fn shape_cast(input: &ShapeCastPairInput) -> CastOutput {
    let mut output = CastOutput {
        fraction: input.max_fraction,
        ..CastOutput::default()
    };

    let proxy_a = &input.proxy_a;
    let xf_a = input.transform_a;

    // Work in A's frame to limit round-off.
    let xf = xf_a.inv_mul(&input.transform_b);
    let mut proxy_b = input.proxy_b;
    for p in proxy_b.points[..proxy_b.count].iter_mut() {
        *p = xf.apply(*p);
    }

    let radius = proxy_a.radius + proxy_b.radius;
    let r = xf_a.q.inv_rotate(input.translation_b);
    let mut lambda = 0.0;
    let max_fraction = input.max_fraction;

    let mut simplex = Simplex::default();

    let mut index_a = proxy_a.find_support(-r);
    let mut w_a = proxy_a.points[index_a];
    let mut index_b = proxy_b.find_support(r);
    let mut w_b = proxy_b.points[index_b];
    let mut v = w_a - w_b;

    // Target distance between the core shapes.
    let sigma = LINEAR_SLOP.max(radius - LINEAR_SLOP);
    let tolerance = 0.5 * LINEAR_SLOP;

    let mut overlapped = false;
    let mut iteration = 0;
    while iteration < MAX_SHAPE_CAST_ITERATIONS && v.magnitude() > sigma + tolerance {
        debug_assert!(simplex.count < 3);
        output.iterations += 1;

        // Support in direction -v (A - B).
        index_a = proxy_a.find_support(-v);
        w_a = proxy_a.points[index_a];
        index_b = proxy_b.find_support(v);
        w_b = proxy_b.points[index_b];
        let p = w_a - w_b;

        // -v is a normal at p.
        v = normalize_or_zero(v);

        // Intersect the ray with the plane.
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= 0.0 {
                // Moving away.
                return output;
            }
            lambda = (vp - sigma) / vr;
            if lambda > max_fraction {
                return output;
            }
            simplex.count = 0;
        }

        // The simplex works with B - A, so the roles are reversed. The new
        // vertex is shifted by lambda * r to measure from the current clip
        // point; p above stays unshifted so the plane is formed in the
        // original space.
        let shifted_b = w_b + r * lambda;
        simplex.vertices[simplex.count] = SimplexVertex {
            w_a: shifted_b,
            w_b: w_a,
            w: w_a - shifted_b,
            a: 1.0,
            index_a: index_b,
            index_b: index_a,
        };
        simplex.count += 1;

        simplex.solve();

        if simplex.count == 3 {
            overlapped = true;
            break;
        }

        v = simplex.closest_point();
        iteration += 1;
    }

    if lambda == 0.0 || overlapped {
        // Never advanced, or the cores met at the current fraction.
        return contact_at(proxy_a, &proxy_b, &xf_a, r, lambda, output.iterations);
    }

    // The simplex stores B's points as its A side.
    let (_, point_a) = simplex.witness_points();
    let n = normalize_or_zero(-v);
    let point = point_a + n * proxy_a.radius;

    output.point = xf_a.apply(point);
    output.normal = xf_a.q.rotate(n);
    output.fraction = lambda;
    output.iterations = iteration;
    output.hit = true;
    output
}

/// Hit at `fraction` for proxies already within the target distance there.
/// Both proxies are in A's frame and `translation` is B's motion in it.
fn contact_at(
    proxy_a: &ShapeProxy,
    proxy_b: &ShapeProxy,
    xf_a: &Transform,
    translation: Vector2<f32>,
    fraction: f32,
    iterations: u32,
) -> CastOutput {
    let input = DistanceInput {
        proxy_a: *proxy_a,
        proxy_b: *proxy_b,
        transform_a: Transform::IDENTITY,
        transform_b: Transform::from_translation(translation * fraction),
        use_radii: false,
    };
    let output = shape_distance(&input, &mut SimplexCache::default(), None);

    // Overlapping cores have no normal, so B is pushed back along its path.
    let normal = if output.distance > 0.0 {
        output.normal
    } else {
        normalize_or_zero(-translation)
    };
    let point = output.point_a + normal * proxy_a.radius;

    CastOutput {
        normal: xf_a.q.rotate(normal),
        point: xf_a.apply(point),
        fraction,
        iterations,
        hit: true,
    }
}

#[cfg(test)]
mod tests {
    mod distance {
        use crate::distance::*;
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        fn box_proxy() -> ShapeProxy {
            let square = make_square(1.0);
            make_proxy(square.vertices(), 0.0)
        }

        fn segment_proxy() -> ShapeProxy {
            make_proxy(&[Vector2::new(2.0, -1.0), Vector2::new(2.0, 1.0)], 0.0)
        }

        fn input(a: ShapeProxy, b: ShapeProxy) -> DistanceInput {
            DistanceInput {
                proxy_a: a,
                proxy_b: b,
                transform_a: Transform::IDENTITY,
                transform_b: Transform::IDENTITY,
                use_radii: false,
            }
        }

        #[test]
        fn test_box_segment_distance() {
            let mut cache = SimplexCache::EMPTY;
            let output = shape_distance(&input(box_proxy(), segment_proxy()), &mut cache, None);
            assert_relative_eq!(output.distance, 1.0, epsilon = 1e-5);
            assert_relative_eq!(output.normal.x, 1.0, epsilon = 1e-5);
            assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-5);
            assert_relative_eq!(output.point_b.x, 2.0, epsilon = 1e-5);
            assert!(cache.count > 0);
            assert!(output.iterations <= MAX_GJK_ITERATIONS);

            // Symmetric.
            let mut cache = SimplexCache::EMPTY;
            let reversed = shape_distance(&input(segment_proxy(), box_proxy()), &mut cache, None);
            assert_relative_eq!(reversed.distance, output.distance, epsilon = 1e-5);
            assert_relative_eq!(reversed.normal.x, -1.0, epsilon = 1e-5);
        }

        #[test]
        fn test_offset_squares() {
            let mut i = input(box_proxy(), box_proxy());
            i.transform_b = Transform::from_translation(Vector2::new(3.0, 0.0));
            let output = shape_distance(&i, &mut SimplexCache::default(), None);
            assert_relative_eq!(output.distance, 1.0, epsilon = 1e-5);

            i.transform_b = Transform::new(Vector2::new(0.0, 5.0), Rot::from_angle(0.3));
            let mut cache = SimplexCache::EMPTY;
            let ab = shape_distance(&i, &mut cache, None);
            let swapped = DistanceInput {
                proxy_a: i.proxy_b,
                proxy_b: i.proxy_a,
                transform_a: i.transform_b,
                transform_b: i.transform_a,
                use_radii: false,
            };
            let ba = shape_distance(&swapped, &mut SimplexCache::default(), None);
            assert_relative_eq!(ab.distance, ba.distance, epsilon = 1e-5);
        }

        #[test]
        fn test_warm_start() {
            let mut i = input(box_proxy(), box_proxy());
            i.transform_b = Transform::new(Vector2::new(2.5, 0.7), Rot::from_angle(0.4));
            let mut cache = SimplexCache::EMPTY;
            let cold = shape_distance(&i, &mut cache, None);

            // Same configuration, seeded from the cache.
            let warm = shape_distance(&i, &mut cache, None);
            assert_relative_eq!(warm.distance, cold.distance, epsilon = 1e-5);
            assert!(warm.iterations <= cold.iterations);
        }

        #[test]
        fn test_radii() {
            let a = make_proxy(&[Vector2::new(0.0, 0.0)], 0.5);
            let b = make_proxy(&[Vector2::new(3.0, 0.0)], 1.0);
            let mut i = input(a, b);
            i.use_radii = true;
            let output = shape_distance(&i, &mut SimplexCache::default(), None);
            assert_relative_eq!(output.distance, 1.5, epsilon = 1e-5);
            assert_relative_eq!(output.point_a.x, 0.5, epsilon = 1e-5);
            assert_relative_eq!(output.point_b.x, 2.0, epsilon = 1e-5);

            // Overlapping rounded shapes clamp to zero and share the point
            // halfway between the two surfaces.
            let b = make_proxy(&[Vector2::new(1.0, 0.0)], 1.0);
            let mut i = input(a, b);
            i.use_radii = true;
            let output = shape_distance(&i, &mut SimplexCache::default(), None);
            assert_eq!(output.distance, 0.0);
            assert_relative_eq!(output.point_a, Vector2::new(0.25, 0.0), epsilon = 1e-5);
            assert_relative_eq!(output.point_b, output.point_a);
            assert_relative_eq!(output.normal, Vector2::new(1.0, 0.0), epsilon = 1e-5);

            let a = make_proxy(&[Vector2::new(0.0, 0.0)], 1.0);
            let b = make_proxy(&[Vector2::new(1.5, 0.0)], 1.0);
            let mut i = input(a, b);
            i.use_radii = true;
            let output = shape_distance(&i, &mut SimplexCache::default(), None);
            assert_eq!(output.distance, 0.0);
            assert_relative_eq!(output.point_a, Vector2::new(0.75, 0.0), epsilon = 1e-5);
            assert_relative_eq!(output.point_b, Vector2::new(0.75, 0.0), epsilon = 1e-5);

            // Concentric.
            let b = make_proxy(&[Vector2::new(0.0, 0.0)], 0.5);
            let mut i = input(a, b);
            i.use_radii = true;
            let output = shape_distance(&i, &mut SimplexCache::default(), None);
            assert_eq!(output.distance, 0.0);
            assert_relative_eq!(output.point_a, Vector2::new(0.0, 0.0));
            assert_relative_eq!(output.point_b, Vector2::new(0.0, 0.0));
        }

        #[test]
        fn test_overlap_and_recording() {
            let mut i = input(box_proxy(), box_proxy());
            i.transform_b = Transform::from_translation(Vector2::new(0.5, 0.25));
            let mut buffer = [Simplex::default(); 8];
            let output = shape_distance(&i, &mut SimplexCache::default(), Some(&mut buffer));
            assert_relative_eq!(output.distance, 0.0, epsilon = 1e-5);
            assert!(output.simplex_count >= 2);
            assert!(output.simplex_count <= buffer.len());
            assert_eq!(buffer[output.simplex_count - 1].count, 3);
        }

        #[test]
        fn test_segment_distance() {
            let result = segment_distance(
                Vector2::new(-1.0, 0.0), Vector2::new(1.0, 0.0),
                Vector2::new(0.5, 2.0), Vector2::new(0.5, 1.0),
            );
            assert_relative_eq!(result.fraction1, 0.75);
            assert_relative_eq!(result.fraction2, 1.0);
            assert_relative_eq!(result.distance_squared, 1.0);

            // Parallel segments.
            let result = segment_distance(
                Vector2::new(0.0, 0.0), Vector2::new(2.0, 0.0),
                Vector2::new(1.0, 1.0), Vector2::new(3.0, 1.0),
            );
            assert_relative_eq!(result.distance_squared, 1.0);

            // Degenerate first segment.
            let result = segment_distance(
                Vector2::new(0.0, 0.0), Vector2::new(0.0, 0.0),
                Vector2::new(-1.0, 1.0), Vector2::new(1.0, 1.0),
            );
            assert_relative_eq!(result.fraction2, 0.5);
            assert_relative_eq!(result.closest2.y, 1.0);
        }

        #[test]
        fn test_shape_cast() {
            let cast = ShapeCastPairInput {
                proxy_a: box_proxy(),
                proxy_b: segment_proxy(),
                transform_a: Transform::IDENTITY,
                transform_b: Transform::IDENTITY,
                translation_b: Vector2::new(-2.0, 0.0),
                max_fraction: 1.0,
            };
            let output = shape_cast(&cast);
            assert!(output.hit);
            assert_relative_eq!(output.fraction, 0.5, epsilon = 0.005);
            assert_relative_eq!(output.normal.x, 1.0, epsilon = 1e-5);
            assert_relative_eq!(output.point.x, 1.0, epsilon = 1e-5);

            // Too short.
            let short = ShapeCastPairInput { max_fraction: 0.25, ..cast };
            assert!(!shape_cast(&short).hit);

            // Moving away.
            let away = ShapeCastPairInput { translation_b: Vector2::new(2.0, 0.0), ..cast };
            assert!(!shape_cast(&away).hit);

            // Initially overlapping hits right away, pushing B back along
            // its path.
            let overlapped = ShapeCastPairInput {
                transform_b: Transform::from_translation(Vector2::new(-1.5, 0.0)),
                ..cast
            };
            let output = shape_cast(&overlapped);
            assert!(output.hit);
            assert_eq!(output.fraction, 0.0);
            assert_relative_eq!(output.normal, Vector2::new(1.0, 0.0), epsilon = 1e-5);
        }

        #[test]
        fn test_shape_cast_starting_in_contact() {
            // A gap smaller than the slop.
            let cast = ShapeCastPairInput {
                proxy_a: box_proxy(),
                proxy_b: make_proxy(&[Vector2::new(1.002, -1.0), Vector2::new(1.002, 1.0)], 0.0),
                transform_a: Transform::IDENTITY,
                transform_b: Transform::IDENTITY,
                translation_b: Vector2::new(-2.0, 0.0),
                max_fraction: 1.0,
            };
            let output = shape_cast(&cast);
            assert!(output.hit);
            assert_eq!(output.fraction, 0.0);
            assert_relative_eq!(output.normal, Vector2::new(1.0, 0.0), epsilon = 1e-5);
            assert_relative_eq!(output.point.x, 1.0, epsilon = 1e-5);

            // The same contact in a rotated and shifted frame.
            let xf = Transform::new(Vector2::new(3.0, -2.0), Rot::from_angle(0.5 * std::f32::consts::PI));
            let moved = ShapeCastPairInput {
                transform_a: xf,
                transform_b: xf,
                translation_b: xf.q.rotate(cast.translation_b),
                ..cast
            };
            let output = shape_cast(&moved);
            assert!(output.hit);
            assert_eq!(output.fraction, 0.0);
            assert_relative_eq!(output.normal, Vector2::new(0.0, 1.0), epsilon = 1e-5);
            assert_relative_eq!(output.point.y, -1.0, epsilon = 1e-4);

            // Cores overlapping inside the rounded radius.
            let rounded = ShapeCastPairInput {
                proxy_b: make_proxy(&[Vector2::new(1.2, 0.0)], 0.5),
                ..cast
            };
            let output = shape_cast(&rounded);
            assert!(output.hit);
            assert_eq!(output.fraction, 0.0);
            assert_relative_eq!(output.normal, Vector2::new(1.0, 0.0), epsilon = 1e-5);
        }

        #[test]
        fn test_iteration_caps() {
            let ring = |radius: f32| -> Vec<Vector2<f32>> {
                (0..8)
                    .map(|i| {
                        let angle = i as f32 * std::f32::consts::PI / 4.0;
                        Vector2::new(radius * angle.cos(), radius * angle.sin())
                    })
                    .collect()
            };
            let octagon = make_polygon(&ring(1.0), 0.0);
            let proxy = make_proxy(octagon.vertices(), 0.0);

            for step in 0..32 {
                let angle = step as f32 * 0.37;
                let offset = Vector2::new(3.0 * angle.cos(), 3.0 * angle.sin());
                let mut i = input(proxy, proxy);
                i.transform_b = Transform::new(offset, Rot::from_angle(angle * 1.7));
                let output = shape_distance(&i, &mut SimplexCache::default(), None);
                assert!(output.iterations <= MAX_GJK_ITERATIONS);
                assert!(output.distance > 0.0 && output.distance < 3.0);

                let cast = ShapeCastPairInput {
                    proxy_a: proxy,
                    proxy_b: proxy,
                    transform_a: Transform::IDENTITY,
                    transform_b: i.transform_b,
                    translation_b: -offset,
                    max_fraction: 1.0,
                };
                let output = shape_cast(&cast);
                assert!(output.hit);
                assert!(output.iterations <= MAX_SHAPE_CAST_ITERATIONS);
                assert!(output.fraction > 0.0 && output.fraction < 1.0);
            }
        }

        #[test]
        fn test_rounded_shape_cast() {
            // A circle of radius 0.5 falling onto a box.
            let cast = ShapeCastPairInput {
                proxy_a: box_proxy(),
                proxy_b: make_proxy(&[Vector2::new(0.0, 4.0)], 0.5),
                transform_a: Transform::IDENTITY,
                transform_b: Transform::IDENTITY,
                translation_b: Vector2::new(0.0, -4.0),
                max_fraction: 1.0,
            };
            let output = shape_cast(&cast);
            assert!(output.hit);
            // The core point reaches y = 1.5 after 2.5 units of 4.
            assert_relative_eq!(output.fraction, 2.5 / 4.0, epsilon = 0.005);
            assert_relative_eq!(output.normal.y, 1.0, epsilon = 1e-5);
            assert_relative_eq!(output.point.y, 1.0, epsilon = 1e-5);
        }
    }
}
