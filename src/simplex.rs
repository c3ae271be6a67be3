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
use serde::{Deserialize, Serialize};

use crate::distance::ShapeProxy;
use crate::geom::*;

/// Feature indices of the simplex that ended a distance query. Passing it
/// back in on the next query for the same pair warm starts the search. Reset
/// it (or use `SimplexCache::EMPTY`) whenever either shape's geometry changes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplexCache {
    pub count: u16,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

impl SimplexCache {
    pub const EMPTY: SimplexCache = SimplexCache {
        count: 0,
        index_a: [0; 3],
        index_b: [0; 3],
    };

    /// Forces the next query to start cold.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// A support point of the Minkowski difference B - A.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimplexVertex {
    /// Support point on proxy A.
    pub w_a: Vector2<f32>,
    /// Support point on proxy B.
    pub w_b: Vector2<f32>,
    /// w_b - w_a
    pub w: Vector2<f32>,
    /// Barycentric weight of this vertex.
    pub a: f32,
    pub index_a: usize,
    pub index_b: usize,
}

impl Default for SimplexVertex {
    fn default() -> Self {
        SimplexVertex {
            w_a: Vector2::zero(),
            w_b: Vector2::zero(),
            w: Vector2::zero(),
            a: 0.0,
            index_a: 0,
            index_b: 0,
        }
    }
}

impl SimplexVertex {
    fn new(
        proxy_a: &ShapeProxy, xf_a: &Transform, index_a: usize,
        proxy_b: &ShapeProxy, xf_b: &Transform, index_b: usize,
    ) -> Self {
        let w_a = xf_a.apply(proxy_a.points[index_a]);
        let w_b = xf_b.apply(proxy_b.points[index_b]);
        SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 1.0,
            index_a,
            index_b,
        }
    }
}

/// A point, segment or triangle in Minkowski space. The first `count`
/// vertices are live.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Simplex {
    pub vertices: [SimplexVertex; 3],
    pub count: usize,
}

impl Simplex {
    pub fn vertices(&self) -> &[SimplexVertex] {
        &self.vertices[..self.count]
    }

    /// Seeds a simplex from the cache, or from the first point of each proxy
    /// when the cache is empty.
    pub fn from_cache(
        cache: &SimplexCache,
        proxy_a: &ShapeProxy, xf_a: &Transform,
        proxy_b: &ShapeProxy, xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);
        let mut s = Simplex::default();
        s.count = cache.count as usize;
        for i in 0..s.count {
            let (index_a, index_b) = (cache.index_a[i] as usize, cache.index_b[i] as usize);
            debug_assert!(index_a < proxy_a.count && index_b < proxy_b.count, "stale simplex cache");
            s.vertices[i] = SimplexVertex::new(proxy_a, xf_a, index_a, proxy_b, xf_b, index_b);
            // Weights are recomputed by the solver.
            s.vertices[i].a = -1.0;
        }

        if s.count == 0 {
            s.vertices[0] = SimplexVertex::new(proxy_a, xf_a, 0, proxy_b, xf_b, 0);
            s.count = 1;
        }
        s
    }

    pub fn to_cache(&self) -> SimplexCache {
        let mut cache = SimplexCache::EMPTY;
        cache.count = self.count as u16;
        for (i, v) in self.vertices().iter().enumerate() {
            cache.index_a[i] = v.index_a as u8;
            cache.index_b[i] = v.index_b as u8;
        }
        cache
    }

    /// Reduces the simplex to the sub-simplex closest to the origin and sets
    /// the barycentric weights.
    pub fn solve(&mut self) {
        match self.count {
            1 => (),
            2 => self.solve2(),
            3 => self.solve3(),
            n => unreachable!("simplex with {} vertices", n),
        }
    }

    /// Direction from the simplex toward the origin.
    pub fn search_direction(&self) -> Vector2<f32> {
        let v = &self.vertices;
        match self.count {
            1 => -v[0].w,
            2 => {
                let e12 = v[1].w - v[0].w;
                if cross(e12, -v[0].w) > 0.0 {
                    // Origin is left of e12.
                    left_perp(e12)
                } else {
                    right_perp(e12)
                }
            },
            _ => Vector2::zero(),
        }
    }

    /// Closest point of the simplex to the origin.
    pub fn closest_point(&self) -> Vector2<f32> {
        let v = &self.vertices;
        match self.count {
            1 => v[0].w,
            2 => v[0].w * v[0].a + v[1].w * v[1].a,
            _ => Vector2::zero(),
        }
    }

    /// Closest points on A and B.
    pub fn witness_points(&self) -> (Vector2<f32>, Vector2<f32>) {
        let v = &self.vertices;
        match self.count {
            1 => (v[0].w_a, v[0].w_b),
            2 => (
                v[0].w_a * v[0].a + v[1].w_a * v[1].a,
                v[0].w_b * v[0].a + v[1].w_b * v[1].a,
            ),
            3 => {
                // The origin lies inside the triangle so both points coincide.
                let a = v[0].w_a * v[0].a + v[1].w_a * v[1].a + v[2].w_a * v[2].a;
                (a, a)
            },
            _ => (Vector2::zero(), Vector2::zero()),
        }
    }

    // Voronoi regions of a segment:
    // w1 region: dot(-w1, e12) <= 0
    // w2 region: dot(w2, e12) <= 0
    // otherwise the interior, weighted by the opposite projection.
    fn solve2(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.vertices[1].a = 1.0;
            self.vertices[0] = self.vertices[1];
            self.count = 1;
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.vertices[0].a = d12_1 * inv_d12;
        self.vertices[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    fn solve3(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let w3 = self.vertices[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Signed areas of the sub-triangles, scaled by the orientation.
        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.vertices[0].a = d12_1 * inv_d12;
            self.vertices[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.vertices[0].a = d13_1 * inv_d13;
            self.vertices[2].a = d13_2 * inv_d13;
            self.vertices[1] = self.vertices[2];
            self.count = 2;
            return;
        }

        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.vertices[1].a = 1.0;
            self.vertices[0] = self.vertices[1];
            self.count = 1;
            return;
        }

        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.vertices[2].a = 1.0;
            self.vertices[0] = self.vertices[2];
            self.count = 1;
            return;
        }

        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.vertices[1].a = d23_1 * inv_d23;
            self.vertices[2].a = d23_2 * inv_d23;
            self.vertices[0] = self.vertices[2];
            self.count = 2;
            return;
        }

        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.vertices[0].a = d123_1 * inv_d123;
        self.vertices[1].a = d123_2 * inv_d123;
        self.vertices[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

#[cfg(test)]
mod tests {
    mod simplex {
        use crate::simplex::*;
        use approx::assert_relative_eq;
        use cgmath::Vector2;

        fn vertex(x: f32, y: f32, index: usize) -> SimplexVertex {
            SimplexVertex {
                w: Vector2::new(x, y),
                index_a: index,
                index_b: index,
                ..SimplexVertex::default()
            }
        }

        #[test]
        fn test_solve2_regions() {
            // Origin projects onto the interior of the edge.
            let mut s = Simplex { vertices: [vertex(-1.0, 1.0, 0), vertex(1.0, 1.0, 1), vertex(0.0, 0.0, 2)], count: 2 };
            s.solve();
            assert_eq!(s.count, 2);
            assert_relative_eq!(s.vertices[0].a, 0.5);
            assert_relative_eq!(s.closest_point().y, 1.0);
            assert_relative_eq!(s.search_direction().y, -2.0);

            // Origin is beyond the second vertex.
            let mut s = Simplex { vertices: [vertex(2.0, 1.0, 0), vertex(1.0, 1.0, 1), vertex(0.0, 0.0, 2)], count: 2 };
            s.solve();
            assert_eq!(s.count, 1);
            assert_eq!(s.vertices[0].index_a, 1);
            assert_relative_eq!(s.closest_point().x, 1.0);
        }

        #[test]
        fn test_solve3_regions() {
            // Origin inside the triangle.
            let mut s = Simplex { vertices: [vertex(-1.0, -1.0, 0), vertex(1.0, -1.0, 1), vertex(0.0, 1.0, 2)], count: 3 };
            s.solve();
            assert_eq!(s.count, 3);
            let sum: f32 = s.vertices().iter().map(|v| v.a).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-6);

            // Origin closest to edge 2-3.
            let mut s = Simplex { vertices: [vertex(0.0, 3.0, 0), vertex(1.0, 1.0, 1), vertex(-1.0, 1.0, 2)], count: 3 };
            s.solve();
            assert_eq!(s.count, 2);
            let mut indices = [s.vertices[0].index_a, s.vertices[1].index_a];
            indices.sort();
            assert_eq!(indices, [1, 2]);
            assert_relative_eq!(s.closest_point().y, 1.0, epsilon = 1e-6);
            assert_relative_eq!(s.closest_point().x, 0.0, epsilon = 1e-6);
        }

        #[test]
        fn test_cache_round_trip() {
            let s = Simplex { vertices: [vertex(0.0, 1.0, 4), vertex(1.0, 1.0, 2), vertex(0.0, 0.0, 0)], count: 2 };
            let cache = s.to_cache();
            assert_eq!(cache.count, 2);
            assert_eq!(&cache.index_a[..2], &[4, 2]);
            let mut cache = cache;
            cache.reset();
            assert_eq!(cache.count, 0);
        }
    }
}
