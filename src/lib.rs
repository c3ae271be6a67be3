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

//! A low-level 2D collision detection library intended for use in physics
//! engines and games.
//!
//! # Pipeline overview
//!
//! Collision detection runs in stages, each usable on its own:
//!
//! - `DynamicTree`: a bounding volume hierarchy of fattened AABBs that
//!   supports incremental insertion, removal and movement of proxies.
//! - `BroadPhase`: one tree per body type plus a buffer of moved proxies.
//!   `update_pairs` reports every new pair of overlapping fat boxes exactly
//!   once. Pair finding may be spread across threads with a `PairFinder`.
//! - `shape_distance`: GJK closest points between two convex proxies, warm
//!   started from a `SimplexCache`.
//! - `shape_cast` and `time_of_impact`: linear casts and conservative
//!   advancement of sweeps to find the first time of contact.
//! - `collide`: contact manifolds with up to two points for any pair of
//!   `Shape`s, including one-sided chain segments that avoid ghost
//!   collisions at shared vertices. `NarrowPhase` runs a batch of pairs over
//!   any number of workers.
//!
//! Broad phase behavior is tuned with a `BroadPhaseConfig`, which may be
//! read from RON.

mod bounds;
pub use bounds::*;

mod broad_phase;
pub use broad_phase::*;

mod claim;
pub use claim::*;

mod collision;
pub use collision::*;

mod config;
pub use config::*;

mod distance;
pub use distance::*;

mod dynamic_tree;
pub use dynamic_tree::*;

mod geom;
pub use geom::*;

mod manifold;
pub use manifold::*;

mod pool;
pub use pool::*;

mod simplex;
pub use simplex::*;

mod toi;
pub use toi::*;
