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

use cgmath::{InnerSpace, Vector2, Zero};
use log::debug;

use crate::distance::*;
use crate::geom::*;
use crate::simplex::SimplexCache;

/// Maximum number of separating axes tried by `time_of_impact`.
pub const MAX_TOI_ITERATIONS: u32 = 20;

/// Maximum number of root finder steps per separating axis.
pub const MAX_ROOT_ITERATIONS: u32 = 50;

/// Input to `time_of_impact`. Sweeps must have normalized rotations.
#[derive(Copy, Clone, Debug)]
pub struct TOIInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the sweep interval, in [0, 1].
    pub max_fraction: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TOIState {
    Unknown,
    /// The root finder gave up. Treat the fraction as a conservative contact.
    Failed,
    /// The shapes overlap at the start of the sweep.
    Overlapped,
    /// The shapes touch at `fraction`.
    Hit,
    /// The shapes stay apart over the whole interval.
    Separated,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TOIOutput {
    pub state: TOIState,
    pub fraction: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

/// Separation of the two proxies along a fixed axis as a function of time.
struct SeparationFunction<'a> {
    proxy_a: &'a ShapeProxy,
    proxy_b: &'a ShapeProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    local_point: Vector2<f32>,
    axis: Vector2<f32>,
    kind: SeparationType,
}

impl<'a> SeparationFunction<'a> {
    /// Builds the axis from the simplex left in the cache at time t1.
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a ShapeProxy, sweep_a: &Sweep,
        proxy_b: &'a ShapeProxy, sweep_b: &Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(cache.count > 0 && cache.count < 3);

        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);
        let mut f = SeparationFunction {
            proxy_a,
            proxy_b,
            sweep_a: *sweep_a,
            sweep_b: *sweep_b,
            local_point: Vector2::zero(),
            axis: Vector2::zero(),
            kind: SeparationType::Points,
        };

        if cache.count == 1 {
            let point_a = xf_a.apply(proxy_a.points[cache.index_a[0] as usize]);
            let point_b = xf_b.apply(proxy_b.points[cache.index_b[0] as usize]);
            f.axis = normalize_or_zero(point_b - point_a);
            return f;
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            f.kind = SeparationType::FaceB;
            let local_b1 = proxy_b.points[cache.index_b[0] as usize];
            let local_b2 = proxy_b.points[cache.index_b[1] as usize];
            f.axis = normalize_or_zero(cross_vs(local_b2 - local_b1, 1.0));
            let normal = xf_b.q.rotate(f.axis);

            f.local_point = lerp(local_b1, local_b2, 0.5);
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.points[cache.index_a[0] as usize]);
            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // Two points on A and one or two points on B.
            f.kind = SeparationType::FaceA;
            let local_a1 = proxy_a.points[cache.index_a[0] as usize];
            let local_a2 = proxy_a.points[cache.index_a[1] as usize];
            f.axis = normalize_or_zero(cross_vs(local_a2 - local_a1, 1.0));
            let normal = xf_a.q.rotate(f.axis);

            f.local_point = lerp(local_a1, local_a2, 0.5);
            let point_a = xf_a.apply(f.local_point);
            let point_b = xf_b.apply(proxy_b.points[cache.index_b[0] as usize]);
            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }
        f
    }

    /// Finds the deepest points along the axis at time t. Returns the
    /// witness indices and the separation.
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationType::Points => {
                let index_a = self.proxy_a.find_support(xf_a.q.inv_rotate(self.axis));
                let index_b = self.proxy_b.find_support(xf_b.q.inv_rotate(-self.axis));
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            },
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let index_b = self.proxy_b.find_support(xf_b.q.inv_rotate(-normal));
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (0, index_b, (point_b - point_a).dot(normal))
            },
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let index_a = self.proxy_a.find_support(xf_a.q.inv_rotate(-normal));
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                (index_a, 0, (point_a - point_b).dot(normal))
            },
        }
    }

    /// Separation of the given witness points at time t.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (point_b - point_a).dot(self.axis)
            },
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (point_b - point_a).dot(normal)
            },
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                (point_a - point_b).dot(normal)
            },
        }
    }
}

/// Computes the upper bound on the time before two swept shapes penetrate.
///
/// Conservative advancement over separating axes: at each stage GJK provides
/// a separating axis and the deepest points along it are pushed back with a
/// secant/bisection root finder until the separation reaches the target.
/// `fraction` is in terms of the sweep interval [0, max_fraction].
pub fn time_of_impact(input: &TOIInput) -> TOIOutput {
    advance_sweeps(input, MAX_TOI_ITERATIONS)
}

fn advance_sweeps(input: &TOIInput, max_iterations: u32) -> TOIOutput {
    let mut output = TOIOutput {
        state: TOIState::Unknown,
        fraction: input.max_fraction,
    };

    let sweep_a = input.sweep_a;
    let sweep_b = input.sweep_b;
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let t_max = input.max_fraction;
    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut cache = SimplexCache::EMPTY;
    let mut distance_input = DistanceInput {
        proxy_a: *proxy_a,
        proxy_b: *proxy_b,
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };

    let mut iteration = 0;
    loop {
        distance_input.transform_a = sweep_a.transform_at(t1);
        distance_input.transform_b = sweep_b.transform_at(t1);

        // The distance query also provides the separating axis.
        let distance_output = shape_distance(&distance_input, &mut cache, None);

        if distance_output.distance <= 0.0 {
            output.state = TOIState::Overlapped;
            output.fraction = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = TOIState::Hit;
            output.fraction = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, &sweep_a, proxy_b, &sweep_b, t1);

        // Resolve the deepest point along the axis until the separation
        // reaches the target. Bounded by the number of vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iterations = 0;
        loop {
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Separated over the whole interval.
            if s2 > target + tolerance {
                output.state = TOIState::Separated;
                output.fraction = t_max;
                done = true;
                break;
            }

            // Reached tolerance, advance the sweeps.
            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Already overlapped at t1. This can happen when the root finder
            // runs out of iterations.
            if s1 < target - tolerance {
                output.state = TOIState::Failed;
                output.fraction = t1;
                done = true;
                break;
            }

            // Touching at t1, which holds the time of impact.
            if s1 <= target + tolerance {
                output.state = TOIState::Hit;
                output.fraction = t1;
                done = true;
                break;
            }

            // 1D root of s(t) - target = 0 on [a1, a2].
            let mut root_iterations = 0;
            let (mut a1, mut a2) = (t1, t2);
            loop {
                let t = if root_iterations & 1 == 1 {
                    // Secant rule for convergence.
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection for progress.
                    0.5 * (a1 + a2)
                };
                root_iterations += 1;

                let s = fcn.evaluate(index_a, index_b, t);
                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                // Keep the root bracketed.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iterations == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iterations += 1;
            if push_back_iterations == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iteration += 1;
        if done {
            break;
        }

        if iteration == max_iterations {
            // The root finder got stuck.
            output.state = TOIState::Failed;
            output.fraction = t1;
            break;
        }
    }

    if output.state == TOIState::Failed {
        debug!("time of impact failed at t = {} after {} iterations", output.fraction, iteration);
    }
    output
}
