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

//! Broad phase: one dynamic tree per body type, a buffer of moved proxies and
//! the set of shape pairs that already exist.
//!
//! Each step the owner moves or enlarges proxies, which buffers them. Pair
//! finding then queries the trees with every buffered proxy and reports the
//! overlapping shape pairs that are not known yet. Pair finding only reads the
//! broad phase, so it can be spread over workers with a `PairFinder`.

use std::collections::HashSet;

use cgmath::Vector2;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::bounds::AABB;
use crate::claim::ClaimCounter;
use crate::config::{BroadPhaseConfig, ConfigError};
use crate::dynamic_tree::{DynamicTree, DEFAULT_MASK_BITS};
use crate::geom::SPECULATIVE_DISTANCE;

/// The kind of body a proxy belongs to. Each kind has its own tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BodyType {
    Static = 0,
    Kinematic = 1,
    Dynamic = 2,
}

impl BodyType {
    pub const COUNT: usize = 3;

    pub const ALL: [BodyType; 3] = [BodyType::Static, BodyType::Kinematic, BodyType::Dynamic];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: u64) -> Self {
        match index {
            0 => BodyType::Static,
            1 => BodyType::Kinematic,
            2 => BodyType::Dynamic,
            _ => panic!("invalid body type {}", index),
        }
    }
}

/// A proxy in one of the three trees, packed as `(proxy_id << 2) | body_type`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyKey(u64);

impl ProxyKey {
    #[inline(always)]
    pub fn new(body_type: BodyType, proxy_id: usize) -> Self {
        ProxyKey((proxy_id as u64) << 2 | body_type as u64)
    }

    #[inline(always)]
    pub fn body_type(self) -> BodyType {
        BodyType::from_index(self.0 & 3)
    }

    #[inline(always)]
    pub fn proxy_id(self) -> usize {
        (self.0 >> 2) as usize
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// An unordered pair of shape indices, stored smallest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapePair {
    pub shape_a: u32,
    pub shape_b: u32,
}

impl ShapePair {
    pub fn new(a: u32, b: u32) -> Self {
        if a < b {
            ShapePair { shape_a: a, shape_b: b }
        } else {
            ShapePair { shape_a: b, shape_b: a }
        }
    }

    #[inline(always)]
    pub fn key(self) -> u64 {
        (self.shape_a as u64) << 32 | self.shape_b as u64
    }
}

/// The candidate pairs found for one buffered move.
#[derive(Clone, Debug)]
pub struct MoveResult {
    /// Position of the query proxy in the move buffer.
    pub move_index: usize,
    pub pairs: SmallVec<[ShapePair; 4]>,
}

#[derive(Clone, Debug)]
pub struct BroadPhase {
    trees: [DynamicTree; BodyType::COUNT],
    move_set: HashSet<ProxyKey>,
    move_array: Vec<ProxyKey>,
    pair_set: HashSet<u64>,
    config: BroadPhaseConfig,
    static_dirty: bool,
}

impl Default for BroadPhase {
    fn default() -> Self {
        BroadPhase::new()
    }
}

impl BroadPhase {
    pub fn new() -> Self {
        BroadPhase::build(BroadPhaseConfig::default())
    }

    pub fn with_config(config: BroadPhaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(BroadPhase::build(config))
    }

    fn build(config: BroadPhaseConfig) -> Self {
        let capacity = config.initial_proxy_capacity;
        BroadPhase {
            trees: [
                DynamicTree::with_capacity(capacity),
                DynamicTree::with_capacity(capacity),
                DynamicTree::with_capacity(capacity),
            ],
            move_set: HashSet::with_capacity(capacity),
            move_array: Vec::with_capacity(capacity),
            pair_set: HashSet::with_capacity(config.initial_pair_capacity),
            config,
            static_dirty: false,
        }
    }

    pub fn config(&self) -> &BroadPhaseConfig {
        &self.config
    }

    /// Static proxies rarely move and get a thinner margin.
    fn margin(&self, body_type: BodyType) -> f32 {
        match body_type {
            BodyType::Static => SPECULATIVE_DISTANCE,
            BodyType::Kinematic | BodyType::Dynamic => self.config.aabb_margin,
        }
    }

    /// Creates a proxy for a shape from its tight AABB. Static proxies are
    /// only buffered for pair finding when `force_pair_creation` is set.
    pub fn create_proxy(
        &mut self,
        aabb: AABB,
        category_bits: u64,
        shape_index: u32,
        body_type: BodyType,
        force_pair_creation: bool,
    ) -> ProxyKey {
        let fat_aabb = aabb.fattened(self.margin(body_type));
        let proxy_id = self.trees[body_type.index()].create_proxy(fat_aabb, category_bits, shape_index as u64);
        let key = ProxyKey::new(body_type, proxy_id);
        trace!("created proxy {:?} for shape {}", key, shape_index);

        if body_type != BodyType::Static || force_pair_creation {
            self.buffer_move(key);
        }
        key
    }

    pub fn destroy_proxy(&mut self, key: ProxyKey) {
        self.unbuffer_move(key);
        self.trees[key.body_type().index()].destroy_proxy(key.proxy_id());
        trace!("destroyed proxy {:?}", key);
    }

    /// Replaces the fat AABB of a proxy, reinserting it into its tree.
    pub fn move_proxy(&mut self, key: ProxyKey, fat_aabb: AABB) {
        self.trees[key.body_type().index()].move_proxy(key.proxy_id(), fat_aabb);
        self.buffer_move(key);
    }

    /// Grows the fat AABB of a proxy in place. The tree is repaired by the next
    /// `rebuild_trees`.
    pub fn enlarge_proxy(&mut self, key: ProxyKey, fat_aabb: AABB) {
        let body_type = key.body_type();
        self.trees[body_type.index()].enlarge_proxy(key.proxy_id(), fat_aabb);
        if body_type == BodyType::Static {
            self.static_dirty = true;
        }
        self.buffer_move(key);
    }

    /// Enlarges the proxy when the tight AABB has escaped its fat AABB.
    /// Returns true when the proxy was enlarged.
    pub fn update_proxy(&mut self, key: ProxyKey, aabb: AABB) -> bool {
        let body_type = key.body_type();
        if self.trees[body_type.index()].fat_aabb(key.proxy_id()).contains(&aabb) {
            return false;
        }
        let fat_aabb = aabb.fattened(self.margin(body_type));
        self.enlarge_proxy(key, fat_aabb);
        true
    }

    /// Buffers a proxy for the next pair finding pass. Buffering twice is a
    /// no-op.
    pub fn buffer_move(&mut self, key: ProxyKey) {
        if self.move_set.insert(key) {
            self.move_array.push(key);
        }
    }

    pub fn unbuffer_move(&mut self, key: ProxyKey) {
        if self.move_set.remove(&key) {
            if let Some(index) = self.move_array.iter().position(|&k| k == key) {
                self.move_array.swap_remove(index);
            }
        }
        debug_assert_eq!(self.move_set.len(), self.move_array.len());
    }

    pub fn move_count(&self) -> usize {
        self.move_array.len()
    }

    pub fn is_buffered(&self, key: ProxyKey) -> bool {
        self.move_set.contains(&key)
    }

    pub fn tree(&self, body_type: BodyType) -> &DynamicTree {
        &self.trees[body_type.index()]
    }

    pub fn proxy_count(&self) -> usize {
        self.trees.iter().map(DynamicTree::proxy_count).sum()
    }

    pub fn fat_aabb(&self, key: ProxyKey) -> AABB {
        self.trees[key.body_type().index()].fat_aabb(key.proxy_id())
    }

    pub fn shape_index(&self, key: ProxyKey) -> u32 {
        self.trees[key.body_type().index()].user_data(key.proxy_id()) as u32
    }

    pub fn test_overlap(&self, key_a: ProxyKey, key_b: ProxyKey) -> bool {
        self.fat_aabb(key_a).overlaps(&self.fat_aabb(key_b))
    }

    pub fn contains_pair(&self, shape_a: u32, shape_b: u32) -> bool {
        self.pair_set.contains(&ShapePair::new(shape_a, shape_b).key())
    }

    /// Forgets a pair so that pair finding can report it again. Returns false
    /// when the pair was not known.
    pub fn remove_pair(&mut self, shape_a: u32, shape_b: u32) -> bool {
        self.pair_set.remove(&ShapePair::new(shape_a, shape_b).key())
    }

    pub fn pair_count(&self) -> usize {
        self.pair_set.len()
    }

    /// Rebuilds the enlarged parts of the moving trees, and the static tree
    /// when it was enlarged. A full rebuild configuration rebuilds everything.
    pub fn rebuild_trees(&mut self) {
        let full = self.config.full_rebuild;
        self.trees[BodyType::Dynamic.index()].rebuild(full);
        self.trees[BodyType::Kinematic.index()].rebuild(full);
        if self.static_dirty || full {
            self.trees[BodyType::Static.index()].rebuild(full);
            self.static_dirty = false;
        }
    }

    pub fn shift_origin(&mut self, new_origin: Vector2<f32>) {
        for tree in self.trees.iter_mut() {
            tree.shift_origin(new_origin);
        }
    }

    /// Starts a pair finding pass over the current move buffer.
    pub fn pair_finder(&self) -> PairFinder<'_> {
        PairFinder {
            broad_phase: self,
            counter: ClaimCounter::new(),
        }
    }

    /// Finds new pairs for the proxy buffered at move_index.
    fn find_pairs<F>(&self, move_index: usize, filter: &F) -> SmallVec<[ShapePair; 4]>
    where
        F: Fn(u32, u32) -> bool,
    {
        let query_key = self.move_array[move_index];
        let query_type = query_key.body_type();
        let query_tree = &self.trees[query_type.index()];
        let fat_aabb = query_tree.fat_aabb(query_key.proxy_id());
        let query_shape = query_tree.user_data(query_key.proxy_id()) as u32;

        let mut pairs = SmallVec::new();
        let mut query = |tree_type: BodyType| {
            self.trees[tree_type.index()].query(&fat_aabb, DEFAULT_MASK_BITS, |proxy_id, user_data| {
                let proxy_key = ProxyKey::new(tree_type, proxy_id);
                if proxy_key == query_key {
                    return true;
                }

                // When both proxies moved, only one of them reports the pair.
                let both_moved = self.move_set.contains(&proxy_key);
                if both_moved {
                    if query_type != BodyType::Dynamic {
                        return true;
                    }
                    if tree_type == BodyType::Dynamic && proxy_key > query_key {
                        return true;
                    }
                }

                let pair = ShapePair::new(query_shape, user_data as u32);
                if pair.shape_a == pair.shape_b || self.pair_set.contains(&pair.key()) {
                    return true;
                }
                if filter(pair.shape_a, pair.shape_b) {
                    pairs.push(pair);
                }
                true
            });
        };

        if query_type == BodyType::Dynamic {
            query(BodyType::Kinematic);
            query(BodyType::Static);
        }
        query(BodyType::Dynamic);
        pairs
    }

    /// Records the results of a pair finding pass and clears the move buffer.
    /// Returns the pairs that were not known before, in move buffer order no
    /// matter how the work was split between workers.
    pub fn commit_pairs(&mut self, mut results: Vec<MoveResult>) -> Vec<ShapePair> {
        results.sort_unstable_by_key(|result| result.move_index);

        let mut new_pairs = Vec::new();
        for result in results {
            for pair in result.pairs {
                if self.pair_set.insert(pair.key()) {
                    new_pairs.push(pair);
                }
            }
        }

        debug!(
            "broad phase: {} moved proxies, {} new pairs, {} pairs total",
            self.move_array.len(),
            new_pairs.len(),
            self.pair_set.len()
        );

        self.move_set.clear();
        self.move_array.clear();
        new_pairs
    }

    /// Single threaded pair finding followed by a commit.
    pub fn update_pairs<F>(&mut self, filter: F) -> Vec<ShapePair>
    where
        F: Fn(u32, u32) -> bool,
    {
        let results = self.pair_finder().run(&filter);
        self.commit_pairs(results)
    }
}

/// One pair finding pass over the move buffer. Any number of workers may call
/// `run` on a shared finder; every buffered move is processed exactly once.
pub struct PairFinder<'a> {
    broad_phase: &'a BroadPhase,
    counter: ClaimCounter,
}

impl<'a> PairFinder<'a> {
    /// Claims buffered moves until none are left. The filter may veto a
    /// candidate pair of shape indices.
    pub fn run<F>(&self, filter: &F) -> Vec<MoveResult>
    where
        F: Fn(u32, u32) -> bool,
    {
        let move_count = self.broad_phase.move_array.len();
        let mut results = Vec::new();
        while let Some(move_index) = self.counter.claim(move_count) {
            let pairs = self.broad_phase.find_pairs(move_index, filter);
            if !pairs.is_empty() {
                results.push(MoveResult { move_index, pairs });
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    mod broad_phase {
        use crate::bounds::AABB;
        use crate::broad_phase::*;
        use crate::config::{BroadPhaseConfig, ConfigError};
        use crate::dynamic_tree::DEFAULT_CATEGORY_BITS;
        use cgmath::Vector2;
        use std::collections::HashSet;

        fn square(x: f32, y: f32, half: f32) -> AABB {
            AABB::new(Vector2::new(x - half, y - half), Vector2::new(x + half, y + half))
        }

        fn accept(_: u32, _: u32) -> bool {
            true
        }

        #[test]
        fn test_proxy_key() {
            let key = ProxyKey::new(BodyType::Kinematic, 37);
            assert_eq!(key.body_type(), BodyType::Kinematic);
            assert_eq!(key.proxy_id(), 37);
            assert_eq!(key.raw(), 37 << 2 | 1);
            assert_eq!(ShapePair::new(9, 4), ShapePair::new(4, 9));
            assert_eq!(ShapePair::new(9, 4).key(), 4u64 << 32 | 9);
        }

        #[test]
        fn test_new_pairs_once() {
            let mut bp = BroadPhase::new();
            bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            bp.create_proxy(square(1.5, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1, BodyType::Dynamic, false);
            assert_eq!(bp.move_count(), 2);

            let pairs = bp.update_pairs(accept);
            assert_eq!(pairs, vec![ShapePair::new(0, 1)]);
            assert_eq!(bp.move_count(), 0);
            assert!(bp.contains_pair(1, 0));

            assert!(bp.update_pairs(accept).is_empty());
            assert_eq!(bp.pair_count(), 1);
        }

        #[test]
        fn test_static_pairs() {
            let mut bp = BroadPhase::new();
            bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Static, true);
            bp.create_proxy(square(1.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1, BodyType::Static, true);
            assert!(bp.update_pairs(accept).is_empty());

            // A dynamic proxy finds both static proxies.
            bp.create_proxy(square(0.5, 0.5, 1.0), DEFAULT_CATEGORY_BITS, 2, BodyType::Dynamic, false);
            let mut pairs = bp.update_pairs(accept);
            pairs.sort();
            assert_eq!(pairs, vec![ShapePair::new(0, 2), ShapePair::new(1, 2)]);

            // A kinematic proxy pairs with the dynamic one but not the statics.
            bp.create_proxy(square(0.5, 0.5, 0.5), DEFAULT_CATEGORY_BITS, 3, BodyType::Kinematic, false);
            assert_eq!(bp.update_pairs(accept), vec![ShapePair::new(2, 3)]);
        }

        #[test]
        fn test_both_moved_reported_once() {
            let mut bp = BroadPhase::new();
            let a = bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            let k = bp.create_proxy(square(5.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1, BodyType::Kinematic, false);
            let s = bp.create_proxy(square(-5.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 2, BodyType::Static, false);
            assert!(bp.update_pairs(accept).is_empty());

            bp.move_proxy(k, square(1.0, 0.0, 1.1));
            bp.move_proxy(s, square(-1.0, 0.0, 1.1));
            bp.move_proxy(a, square(0.0, 0.0, 1.1));
            let finder = bp.pair_finder();
            let results = finder.run(&accept);
            let found: usize = results.iter().map(|r| r.pairs.len()).sum();
            assert_eq!(found, 2);
            drop(finder);

            let mut pairs = bp.commit_pairs(results);
            pairs.sort();
            assert_eq!(pairs, vec![ShapePair::new(0, 1), ShapePair::new(0, 2)]);
        }

        #[test]
        fn test_filter() {
            let mut bp = BroadPhase::new();
            for i in 0..3 {
                bp.create_proxy(square(0.1 * i as f32, 0.0, 1.0), DEFAULT_CATEGORY_BITS, i, BodyType::Dynamic, false);
            }
            let pairs = bp.update_pairs(|a, b| a != 0 && b != 0);
            assert_eq!(pairs, vec![ShapePair::new(1, 2)]);
            // Vetoed pairs are not remembered.
            assert!(!bp.contains_pair(0, 1));
        }

        #[test]
        fn test_destroy_unbuffers() {
            let mut bp = BroadPhase::new();
            let a = bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            let b = bp.create_proxy(square(0.5, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1, BodyType::Dynamic, false);
            bp.destroy_proxy(a);
            assert_eq!(bp.move_count(), 1);
            assert!(!bp.is_buffered(a));
            assert!(bp.is_buffered(b));
            assert!(bp.update_pairs(accept).is_empty());
            assert_eq!(bp.proxy_count(), 1);
        }

        #[test]
        fn test_update_proxy() {
            let mut bp = BroadPhase::new();
            let key = bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            bp.update_pairs(accept);

            // Small motions stay inside the fat box.
            assert!(!bp.update_proxy(key, square(0.05, 0.0, 1.0)));
            assert_eq!(bp.move_count(), 0);

            let moved = square(0.5, 0.0, 1.0);
            assert!(bp.update_proxy(key, moved));
            assert_eq!(bp.move_count(), 1);
            assert!(bp.fat_aabb(key).contains(&moved));
            bp.rebuild_trees();
            bp.tree(BodyType::Dynamic).validate();
        }

        #[test]
        fn test_remove_pair() {
            let mut bp = BroadPhase::new();
            let a = bp.create_proxy(square(0.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            bp.create_proxy(square(0.5, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1, BodyType::Dynamic, false);
            assert_eq!(bp.update_pairs(accept).len(), 1);
            assert!(bp.remove_pair(0, 1));
            assert!(!bp.remove_pair(0, 1));

            bp.buffer_move(a);
            bp.buffer_move(a);
            assert_eq!(bp.move_count(), 1);
            assert_eq!(bp.update_pairs(accept), vec![ShapePair::new(0, 1)]);
        }

        fn grid(bp: &mut BroadPhase) {
            let mut shape_index = 0;
            for i in 0..20 {
                for j in 0..20 {
                    let body_type = match (i + j) % 5 {
                        0 => BodyType::Static,
                        1 => BodyType::Kinematic,
                        _ => BodyType::Dynamic,
                    };
                    let aabb = square(i as f32, j as f32, 0.6);
                    bp.create_proxy(aabb, DEFAULT_CATEGORY_BITS, shape_index, body_type, false);
                    shape_index += 1;
                }
            }
        }

        #[test]
        fn test_parallel_matches_serial() {
            let mut serial = BroadPhase::new();
            grid(&mut serial);
            let expected = serial.update_pairs(accept);

            let mut parallel = BroadPhase::new();
            grid(&mut parallel);
            let results = {
                let finder = parallel.pair_finder();
                let chunks: Vec<Vec<MoveResult>> = std::thread::scope(|s| {
                    let workers: Vec<_> = (0..4).map(|_| s.spawn(|| finder.run(&accept))).collect();
                    workers.into_iter().map(|w| w.join().unwrap()).collect()
                });
                chunks.into_iter().flatten().collect::<Vec<_>>()
            };
            let pairs = parallel.commit_pairs(results);
            assert_eq!(pairs, expected);

            // Every pair that should exist does, once.
            let unique: HashSet<ShapePair> = pairs.iter().cloned().collect();
            assert_eq!(unique.len(), pairs.len());
            for pair in &pairs {
                let (a, b) = (pair.shape_a as i32, pair.shape_b as i32);
                let (ai, aj, bi, bj) = (a / 20, a % 20, b / 20, b % 20);
                assert!((ai - bi).abs() <= 1 && (aj - bj).abs() <= 1);
                // Static pairs never form.
                let is_static = |i: i32, j: i32| (i + j) % 5 == 0;
                assert!(!(is_static(ai, aj) && is_static(bi, bj)));
            }
            assert!(!pairs.is_empty());
        }

        #[test]
        fn test_config() {
            let config = BroadPhaseConfig { aabb_margin: f32::NAN, ..BroadPhaseConfig::default() };
            match BroadPhase::with_config(config) {
                Err(ConfigError::InvalidMargin(_)) => (),
                other => panic!("unexpected {:?}", other.map(|_| ())),
            }

            let config = BroadPhaseConfig { aabb_margin: 0.0, ..BroadPhaseConfig::default() };
            let mut bp = BroadPhase::with_config(config).unwrap();
            let tight = square(0.0, 0.0, 1.0);
            let key = bp.create_proxy(tight, DEFAULT_CATEGORY_BITS, 0, BodyType::Dynamic, false);
            assert_eq!(bp.fat_aabb(key), tight);
        }
    }
}
