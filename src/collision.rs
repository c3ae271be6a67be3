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

//! Shapes as a closed set of variants, contact dispatch between any two of
//! them and a batch of contact tasks that workers share.

use cgmath::{InnerSpace, Vector2};
use serde::{Deserialize, Serialize};

use crate::bounds::*;
use crate::claim::ClaimCounter;
use crate::distance::*;
use crate::geom::*;
use crate::manifold::*;
use crate::simplex::SimplexCache;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeType {
    Circle,
    Capsule,
    Segment,
    Polygon,
    ChainSegment,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(Circle),
    Capsule(Capsule),
    Segment(Segment),
    Polygon(Polygon),
    ChainSegment(ChainSegment),
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

impl From<Capsule> for Shape {
    fn from(capsule: Capsule) -> Self {
        Shape::Capsule(capsule)
    }
}

impl From<Segment> for Shape {
    fn from(segment: Segment) -> Self {
        Shape::Segment(segment)
    }
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Shape::Polygon(polygon)
    }
}

impl From<ChainSegment> for Shape {
    fn from(chain_segment: ChainSegment) -> Self {
        Shape::ChainSegment(chain_segment)
    }
}

impl BoundedBy for Shape {
    fn bounds(&self, xf: &Transform) -> AABB {
        match self {
            Shape::Circle(s) => s.bounds(xf),
            Shape::Capsule(s) => s.bounds(xf),
            Shape::Segment(s) => s.bounds(xf),
            Shape::Polygon(s) => s.bounds(xf),
            Shape::ChainSegment(s) => s.bounds(xf),
        }
    }
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Capsule(_) => ShapeType::Capsule,
            Shape::Segment(_) => ShapeType::Segment,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::ChainSegment(_) => ShapeType::ChainSegment,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(s) => s.radius,
            Shape::Capsule(s) => s.radius,
            Shape::Polygon(s) => s.radius,
            Shape::Segment(_) | Shape::ChainSegment(_) => 0.0,
        }
    }

    /// Tight bounds of the shape under xf.
    pub fn aabb(&self, xf: &Transform) -> AABB {
        self.bounds(xf)
    }

    /// The shape as a point cloud with a radius, for distance queries.
    pub fn proxy(&self) -> ShapeProxy {
        match self {
            Shape::Circle(s) => make_proxy(&[s.center], s.radius),
            Shape::Capsule(s) => make_proxy(&[s.center1, s.center2], s.radius),
            Shape::Segment(s) => make_proxy(&[s.point1, s.point2], 0.0),
            Shape::Polygon(s) => make_proxy(s.vertices(), s.radius),
            Shape::ChainSegment(s) => make_proxy(&[s.segment.point1, s.segment.point2], 0.0),
        }
    }

    /// Whether p lies inside or on the surface of the shape placed at xf.
    pub fn contains_point(&self, xf: &Transform, p: Vector2<f32>) -> bool {
        let input = DistanceInput {
            proxy_a: self.proxy(),
            proxy_b: make_proxy(&[p], 0.0),
            transform_a: *xf,
            transform_b: Transform::IDENTITY,
            use_radii: false,
        };
        let output = shape_distance(&input, &mut SimplexCache::default(), None);
        output.distance <= self.radius()
    }

    /// Casts a ray against the shape placed at xf. Rays starting inside the
    /// shape do not hit, and chain segments can only be hit from their right
    /// side.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> CastOutput {
        if let Shape::ChainSegment(s) = self {
            let origin = xf.apply_inv(input.origin);
            let e = s.segment.point2 - s.segment.point1;
            if right_perp(e).dot(origin - s.segment.point1) < 0.0 {
                return CastOutput::default();
            }
        }

        if self.contains_point(xf, input.origin) {
            return CastOutput::default();
        }

        let cast = ShapeCastPairInput {
            proxy_a: self.proxy(),
            proxy_b: make_proxy(&[input.origin], 0.0),
            transform_a: *xf,
            transform_b: Transform::IDENTITY,
            translation_b: input.translation,
            max_fraction: input.max_fraction,
        };
        shape_cast(&cast)
    }
}

/// Computes the contact manifold between two shapes. The normal points from
/// A to B. Pairs without a contact function (segments against segments, and
/// chain segments against either) produce an empty manifold.
///
/// The cache belongs to the pair and is used by the chain segment functions;
/// other pairs leave it untouched.
pub fn collide(
    shape_a: &Shape, xf_a: &Transform,
    shape_b: &Shape, xf_b: &Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Capsule(a), Shape::Circle(b)) => collide_capsule_and_circle(a, xf_a, b, xf_b),
        (Shape::Capsule(a), Shape::Capsule(b)) => collide_capsules(a, xf_a, b, xf_b),
        (Shape::Segment(a), Shape::Circle(b)) => collide_segment_and_circle(a, xf_a, b, xf_b),
        (Shape::Segment(a), Shape::Capsule(b)) => collide_segment_and_capsule(a, xf_a, b, xf_b),
        (Shape::Segment(a), Shape::Polygon(b)) => collide_segment_and_polygon(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Capsule(b)) => collide_polygon_and_capsule(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::ChainSegment(a), Shape::Circle(b)) => collide_chain_segment_and_circle(a, xf_a, b, xf_b),
        (Shape::ChainSegment(a), Shape::Capsule(b)) => {
            collide_chain_segment_and_capsule(a, xf_a, b, xf_b, cache)
        },
        (Shape::ChainSegment(a), Shape::Polygon(b)) => {
            collide_chain_segment_and_polygon(a, xf_a, b, xf_b, cache)
        },
        (Shape::Segment(_), Shape::Segment(_))
        | (Shape::Segment(_), Shape::ChainSegment(_))
        | (Shape::ChainSegment(_), Shape::Segment(_))
        | (Shape::ChainSegment(_), Shape::ChainSegment(_)) => Manifold::default(),
        // Every remaining pair is the reverse of one above.
        _ => {
            let mut manifold = collide(shape_b, xf_b, shape_a, xf_a, cache);
            manifold.flip();
            manifold
        },
    }
}

/// A pair of shapes to collide. The cache is carried from the previous step
/// of the same pair.
#[derive(Copy, Clone, Debug)]
pub struct ContactTask<'a> {
    pub shape_a: &'a Shape,
    pub transform_a: Transform,
    pub shape_b: &'a Shape,
    pub transform_b: Transform,
    pub cache: SimplexCache,
}

impl<'a> ContactTask<'a> {
    pub fn new(shape_a: &'a Shape, transform_a: Transform, shape_b: &'a Shape, transform_b: Transform) -> Self {
        ContactTask {
            shape_a,
            transform_a,
            shape_b,
            transform_b,
            cache: SimplexCache::default(),
        }
    }
}

/// The manifold of one task along with the cache to store for the next step.
#[derive(Copy, Clone, Debug)]
pub struct ContactResult {
    pub task_index: usize,
    pub manifold: Manifold,
    pub cache: SimplexCache,
}

impl ContactResult {
    pub fn touching(&self) -> bool {
        self.manifold.point_count > 0
    }
}

/// Narrow phase over a fixed batch of tasks. Any number of workers may call
/// `run` on a shared batch; every task is collided exactly once.
pub struct NarrowPhase<'a> {
    tasks: &'a [ContactTask<'a>],
    counter: ClaimCounter,
}

impl<'a> NarrowPhase<'a> {
    pub fn new(tasks: &'a [ContactTask<'a>]) -> Self {
        NarrowPhase {
            tasks,
            counter: ClaimCounter::new(),
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Claims tasks until none are left and returns their results.
    pub fn run(&self) -> Vec<ContactResult> {
        let mut results = Vec::new();
        while let Some(task_index) = self.counter.claim(self.tasks.len()) {
            let task = &self.tasks[task_index];
            let mut cache = task.cache;
            let manifold = collide(task.shape_a, &task.transform_a, task.shape_b, &task.transform_b, &mut cache);
            results.push(ContactResult { task_index, manifold, cache });
        }
        results
    }

    /// Joins the results of every worker, ordered by task.
    pub fn merge<I>(results: I) -> Vec<ContactResult>
    where
        I: IntoIterator<Item = Vec<ContactResult>>,
    {
        let mut merged: Vec<ContactResult> = results.into_iter().flatten().collect();
        merged.sort_unstable_by_key(|result| result.task_index);
        merged
    }
}

/// The ray from p1 to p2.
pub fn ray_between(p1: Vector2<f32>, p2: Vector2<f32>) -> RayCastInput {
    RayCastInput {
        origin: p1,
        translation: p2 - p1,
        max_fraction: 1.0,
    }
}
