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

use std::cmp::{self, Ordering};

use cgmath::{InnerSpace, Vector2};
use log::debug;
use smallvec::SmallVec;

use crate::bounds::{AABB, RayCastInput};
use crate::distance::ShapeCastInput;
use crate::geom::*;
use crate::pool::Pool;

/// Category bits given to proxies that do not care about filtering.
pub const DEFAULT_CATEGORY_BITS: u64 = 1;

/// A mask that accepts every category.
pub const DEFAULT_MASK_BITS: u64 = u64::MAX;

/// Work done by a single traversal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub node_visits: usize,
    pub leaf_visits: usize,
}

impl std::ops::AddAssign for TreeStats {
    fn add_assign(&mut self, other: TreeStats) {
        self.node_visits += other.node_visits;
        self.leaf_visits += other.leaf_visits;
    }
}

#[derive(Clone, Debug)]
struct TreeNode {
    aabb: AABB,
    /// For parents, the union of the children's categories.
    category_bits: u64,
    parent: Option<usize>,
    /// Leaves have height 0.
    height: u32,
    /// Set when this node's box grew in place and the region needs a rebuild.
    enlarged: bool,
    node_type: TreeNodeType,
}

#[derive(Copy, Clone, Debug)]
enum TreeNodeType {
    Leaf(u64),
    Parent(usize, usize),
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        match self.node_type {
            TreeNodeType::Leaf(_) => true,
            TreeNodeType::Parent(..) => false,
        }
    }
}

/// A dynamic AABB tree. Leaves are proxies holding a fat AABB, category bits
/// and 64 bits of user data. Proxy ids are stable until destroyed.
///
/// The tree is not safe for concurrent mutation, but any number of queries may
/// run at once while nobody mutates it.
#[derive(Clone, Debug, Default)]
pub struct DynamicTree {
    root: Option<usize>,
    proxy_count: usize,
    nodes: Pool<TreeNode>,
}

impl DynamicTree {
    pub fn new() -> Self {
        DynamicTree {
            root: None,
            proxy_count: 0,
            nodes: Pool::new(),
        }
    }

    pub fn with_capacity(proxy_capacity: usize) -> Self {
        DynamicTree {
            root: None,
            proxy_count: 0,
            nodes: Pool::with_capacity(2 * proxy_capacity),
        }
    }

    /// Creates a leaf for aabb and returns its proxy id.
    pub fn create_proxy(&mut self, aabb: AABB, category_bits: u64, user_data: u64) -> usize {
        debug_assert!(aabb.is_valid());
        debug_assert!(aabb.lower_bound.x > -HUGE && aabb.upper_bound.x < HUGE);
        debug_assert!(aabb.lower_bound.y > -HUGE && aabb.upper_bound.y < HUGE);

        let proxy_id = self.nodes.push(TreeNode {
            aabb,
            category_bits,
            parent: None,
            height: 0,
            enlarged: false,
            node_type: TreeNodeType::Leaf(user_data),
        });
        self.insert_leaf(proxy_id);
        self.proxy_count += 1;
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.remove_leaf(proxy_id);
        self.nodes.remove(proxy_id);
        self.proxy_count -= 1;
    }

    /// Replaces the fat AABB of a proxy and reinserts it.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: AABB) {
        debug_assert!(aabb.is_valid());
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.remove_leaf(proxy_id);
        let node = &mut self.nodes[proxy_id];
        node.aabb = aabb;
        node.enlarged = false;
        self.insert_leaf(proxy_id);
    }

    /// Grows the fat AABB of a proxy in place. Ancestors are enlarged to keep
    /// containing it and are marked for the next partial rebuild.
    pub fn enlarge_proxy(&mut self, proxy_id: usize, aabb: AABB) {
        debug_assert!(aabb.is_valid());
        debug_assert!(self.nodes[proxy_id].is_leaf());
        debug_assert!(!self.nodes[proxy_id].aabb.contains(&aabb));

        let node = &mut self.nodes[proxy_id];
        node.aabb = aabb;
        node.enlarged = true;

        let mut index = node.parent;
        while let Some(i) = index {
            let node = &mut self.nodes[i];
            let changed = node.aabb.enlarge(&aabb);
            let was_enlarged = node.enlarged;
            node.enlarged = true;
            // Marks propagate to the root, so an already marked ancestor that
            // did not grow ends the walk.
            if !changed && was_enlarged {
                break;
            }
            index = node.parent;
        }
    }

    pub fn set_category_bits(&mut self, proxy_id: usize, category_bits: u64) {
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.nodes[proxy_id].category_bits = category_bits;
        let mut index = self.nodes[proxy_id].parent;
        while let Some(i) = index {
            if let TreeNodeType::Parent(child1, child2) = self.nodes[i].node_type {
                self.nodes[i].category_bits =
                    self.nodes[child1].category_bits | self.nodes[child2].category_bits;
            }
            index = self.nodes[i].parent;
        }
    }

    pub fn category_bits(&self, proxy_id: usize) -> u64 {
        self.nodes[proxy_id].category_bits
    }

    pub fn user_data(&self, proxy_id: usize) -> u64 {
        match self.nodes[proxy_id].node_type {
            TreeNodeType::Leaf(user_data) => user_data,
            TreeNodeType::Parent(..) => panic!("node {} is not a proxy", proxy_id),
        }
    }

    pub fn fat_aabb(&self, proxy_id: usize) -> AABB {
        self.nodes[proxy_id].aabb
    }

    pub fn contains_proxy(&self, proxy_id: usize) -> bool {
        self.nodes.get(proxy_id).map_or(false, TreeNode::is_leaf)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Number of allocated nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the root. An empty tree and a single leaf both have height 0.
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    pub fn root_bounds(&self) -> Option<AABB> {
        self.root.map(|root| self.nodes[root].aabb)
    }

    /// Ratio of the summed perimeters of the internal nodes to the perimeter
    /// of the root. Lower is better.
    pub fn area_ratio(&self) -> f32 {
        let root = match self.root {
            Some(root) => root,
            None => return 0.0,
        };
        let root_area = self.nodes[root].aabb.perimeter();
        let total_area: f32 = self.nodes
            .iter()
            .filter(|&(i, node)| i != root && !node.is_leaf())
            .map(|(_, node)| node.aabb.perimeter())
            .sum();
        if root_area > 0.0 {
            total_area / root_area
        } else {
            0.0
        }
    }

    /// Translates every box by -new_origin.
    pub fn shift_origin(&mut self, new_origin: Vector2<f32>) {
        for (_, node) in self.nodes.iter_mut() {
            node.aabb = node.aabb.translate(-new_origin);
        }
    }

    /// Calls callback with the id and user data of every proxy whose fat AABB
    /// overlaps aabb and whose category bits intersect mask_bits. The traversal
    /// stops when the callback returns false.
    pub fn query<F>(&self, aabb: &AABB, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(usize, u64) -> bool,
    {
        let mut stats = TreeStats::default();
        let root = match self.root {
            Some(root) => root,
            None => return stats,
        };

        let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
        stack.push(root);
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            stats.node_visits += 1;
            if node.category_bits & mask_bits == 0 || !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.node_type {
                TreeNodeType::Leaf(user_data) => {
                    stats.leaf_visits += 1;
                    if !callback(i, user_data) {
                        return stats;
                    }
                },
                TreeNodeType::Parent(child1, child2) => {
                    stack.push(child1);
                    stack.push(child2);
                },
            }
        }
        stats
    }

    /// Returns the ids of every proxy `query` would visit.
    pub fn query_all(&self, aabb: &AABB, mask_bits: u64) -> Vec<usize> {
        let mut found = Vec::new();
        self.query(aabb, mask_bits, |proxy_id, _| {
            found.push(proxy_id);
            true
        });
        found
    }

    /// Casts a ray against the proxies of the tree.
    ///
    /// The callback receives the input clipped to the closest hit reported so
    /// far. Its return value controls the traversal:
    /// - `0` terminates the cast,
    /// - a value in `(0, max_fraction]` clips the ray to that fraction,
    /// - a negative value ignores the proxy.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(&RayCastInput, usize, u64) -> f32,
    {
        let mut stats = TreeStats::default();
        let root = match self.root {
            Some(root) => root,
            None => return stats,
        };

        let p1 = input.origin;
        let d = input.translation;
        // The separating axis perpendicular to the ray.
        let v = cross_sv(1.0, normalize_or_zero(d));
        let abs_v = Vector2::new(v.x.abs(), v.y.abs());

        let mut max_fraction = input.max_fraction;
        let mut p2 = p1 + d * max_fraction;
        let mut segment_aabb = AABB::new(vmin(p1, p2), vmax(p1, p2));
        let mut sub_input = *input;

        let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
        stack.push(root);
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            stats.node_visits += 1;
            if node.category_bits & mask_bits == 0 || !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            // |dot(v, p1 - c)| > dot(|v|, h) means the ray misses the box.
            let c = node.aabb.center();
            let h = node.aabb.extents();
            if abs_v.dot(h) < v.dot(p1 - c).abs() {
                continue;
            }

            match node.node_type {
                TreeNodeType::Leaf(user_data) => {
                    stats.leaf_visits += 1;
                    sub_input.max_fraction = max_fraction;
                    let value = callback(&sub_input, i, user_data);
                    if value == 0.0 {
                        return stats;
                    }
                    if 0.0 < value && value <= max_fraction {
                        max_fraction = value;
                        p2 = p1 + d * max_fraction;
                        segment_aabb = AABB::new(vmin(p1, p2), vmax(p1, p2));
                    }
                },
                TreeNodeType::Parent(child1, child2) => {
                    stack.push(child1);
                    stack.push(child2);
                },
            }
        }
        stats
    }

    /// Sweeps a shape proxy through the tree. The callback follows the same
    /// conventions as `ray_cast`.
    pub fn shape_cast<F>(&self, input: &ShapeCastInput, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(&ShapeCastInput, usize, u64) -> f32,
    {
        let mut stats = TreeStats::default();
        let root = match self.root {
            Some(root) => root,
            None => return stats,
        };
        let points = input.proxy.points();
        if points.is_empty() {
            return stats;
        }

        let mut origin_aabb = AABB::new(points[0], points[0]);
        for p in &points[1..] {
            origin_aabb = origin_aabb.union(&AABB::new(*p, *p));
        }
        let origin_aabb = origin_aabb.fattened(input.proxy.radius);

        let p1 = origin_aabb.center();
        let extension = origin_aabb.extents();
        let d = input.translation;
        let v = cross_sv(1.0, normalize_or_zero(d));
        let abs_v = Vector2::new(v.x.abs(), v.y.abs());

        let swept = |fraction: f32| {
            let t = d * fraction;
            AABB::new(
                vmin(origin_aabb.lower_bound, origin_aabb.lower_bound + t),
                vmax(origin_aabb.upper_bound, origin_aabb.upper_bound + t),
            )
        };

        let mut max_fraction = input.max_fraction;
        let mut total_aabb = swept(max_fraction);
        let mut sub_input = *input;

        let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
        stack.push(root);
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            stats.node_visits += 1;
            if node.category_bits & mask_bits == 0 || !node.aabb.overlaps(&total_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents() + extension;
            if abs_v.dot(h) < v.dot(p1 - c).abs() {
                continue;
            }

            match node.node_type {
                TreeNodeType::Leaf(user_data) => {
                    stats.leaf_visits += 1;
                    sub_input.max_fraction = max_fraction;
                    let value = callback(&sub_input, i, user_data);
                    if value == 0.0 {
                        return stats;
                    }
                    if 0.0 < value && value <= max_fraction {
                        max_fraction = value;
                        total_aabb = swept(max_fraction);
                    }
                },
                TreeNodeType::Parent(child1, child2) => {
                    stack.push(child1);
                    stack.push(child2);
                },
            }
        }
        stats
    }

    /// Rebuilds the tree top down. A full rebuild considers every proxy; a
    /// partial rebuild keeps subtrees untouched by `enlarge_proxy` intact and
    /// only reorganizes the enlarged regions. Returns the number of subtrees
    /// and leaves that were rebuilt over.
    pub fn rebuild(&mut self, full_build: bool) -> usize {
        let root = match self.root {
            Some(root) => root,
            None => return 0,
        };

        let mut leaves: Vec<usize> = Vec::with_capacity(self.proxy_count);
        let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
        stack.push(root);
        while let Some(i) = stack.pop() {
            let (node_type, enlarged) = (self.nodes[i].node_type, self.nodes[i].enlarged);
            match node_type {
                TreeNodeType::Leaf(_) => leaves.push(i),
                TreeNodeType::Parent(..) if !full_build && !enlarged => leaves.push(i),
                TreeNodeType::Parent(child1, child2) => {
                    stack.push(child1);
                    stack.push(child2);
                    self.nodes.remove(i);
                },
            }
        }

        for &i in &leaves {
            let node = &mut self.nodes[i];
            node.parent = None;
            if node.is_leaf() {
                node.enlarged = false;
            }
        }

        let root = self.build_subtree(&mut leaves);
        self.nodes[root].parent = None;
        self.root = Some(root);

        debug!(
            "rebuilt tree over {} nodes ({} proxies), height {}",
            leaves.len(), self.proxy_count, self.nodes[root].height
        );
        leaves.len()
    }

    /// Median split on the axis with the largest spread of centers.
    fn build_subtree(&mut self, leaves: &mut [usize]) -> usize {
        if leaves.len() == 1 {
            return leaves[0];
        }

        let mid = leaves.len() / 2;
        if leaves.len() > 2 {
            let nodes = &self.nodes;
            let first = nodes[leaves[0]].aabb.center();
            let (lower, upper) = leaves[1..].iter().fold((first, first), |(lower, upper), &i| {
                let c = nodes[i].aabb.center();
                (vmin(lower, c), vmax(upper, c))
            });
            let spread = upper - lower;
            let key = |i: usize| {
                let c = nodes[i].aabb.center();
                if spread.x >= spread.y { c.x } else { c.y }
            };
            leaves.select_nth_unstable_by(mid, |&a, &b| {
                key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal)
            });
        }

        let (left, right) = leaves.split_at_mut(mid);
        let child1 = self.build_subtree(left);
        let child2 = self.build_subtree(right);
        let aabb = self.nodes[child1].aabb;
        let parent = self.nodes.push(TreeNode {
            aabb,
            category_bits: 0,
            parent: None,
            height: 0,
            enlarged: false,
            node_type: TreeNodeType::Parent(child1, child2),
        });
        self.nodes[child1].parent = Some(parent);
        self.nodes[child2].parent = Some(parent);
        self.refit(parent);
        parent
    }

    /// Checks the structure of the tree, panicking on the first violation.
    pub fn validate(&self) {
        match self.root {
            Some(root) => {
                assert!(self.nodes[root].parent.is_none());
                assert_eq!(self.validate_node(root), self.proxy_count);
                assert_eq!(self.nodes.len(), 2 * self.proxy_count - 1);
            },
            None => {
                assert_eq!(self.proxy_count, 0);
                assert!(self.nodes.is_empty());
            },
        }
    }

    fn validate_node(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        match node.node_type {
            TreeNodeType::Leaf(_) => {
                assert_eq!(node.height, 0);
                1
            },
            TreeNodeType::Parent(child1, child2) => {
                let (n1, n2) = (&self.nodes[child1], &self.nodes[child2]);
                assert_eq!(n1.parent, Some(index));
                assert_eq!(n2.parent, Some(index));
                assert_eq!(node.height, 1 + cmp::max(n1.height, n2.height));
                assert!(node.aabb.contains(&n1.aabb));
                assert!(node.aabb.contains(&n2.aabb));
                assert_eq!(node.category_bits, n1.category_bits | n2.category_bits);
                assert!(node.enlarged || !(n1.enlarged || n2.enlarged));
                self.validate_node(child1) + self.validate_node(child2)
            },
        }
    }

    /// Recomputes a parent's box, height, categories and enlarged mark from
    /// its children.
    fn refit(&mut self, i: usize) {
        if let TreeNodeType::Parent(child1, child2) = self.nodes[i].node_type {
            let (aabb, height, category_bits, enlarged) = {
                let (n1, n2) = (&self.nodes[child1], &self.nodes[child2]);
                (
                    n1.aabb.union(&n2.aabb),
                    1 + cmp::max(n1.height, n2.height),
                    n1.category_bits | n2.category_bits,
                    n1.enlarged || n2.enlarged,
                )
            };
            let node = &mut self.nodes[i];
            node.aabb = aabb;
            node.height = height;
            node.category_bits = category_bits;
            node.enlarged = enlarged;
        }
    }

    fn replace_child(&mut self, parent: usize, old_child: usize, new_child: usize) {
        if let TreeNodeType::Parent(child1, child2) = self.nodes[parent].node_type {
            self.nodes[parent].node_type = if child1 == old_child {
                TreeNodeType::Parent(new_child, child2)
            } else {
                debug_assert_eq!(child2, old_child);
                TreeNodeType::Parent(child1, new_child)
            };
        }
    }

    /// Balances and refits every node from index up to the root.
    fn fix_upwards(&mut self, mut index: Option<usize>) {
        while let Some(i) = index {
            let i = self.balance(i);
            self.refit(i);
            index = self.nodes[i].parent;
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        let root = match self.root {
            Some(root) => root,
            None => {
                self.root = Some(leaf);
                self.nodes[leaf].parent = None;
                return;
            },
        };

        // Descend by minimum perimeter cost.
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut best = root;
        while let TreeNodeType::Parent(child1, child2) = self.nodes[best].node_type {
            let area = self.nodes[best].aabb.perimeter();
            let combined_area = self.nodes[best].aabb.union(&leaf_aabb).perimeter();

            // Cost of pairing the leaf with this node under a new parent.
            let no_descent_cost = 2.0 * combined_area;
            // Minimum cost pushed down to the children.
            let inheritance_cost = 2.0 * (combined_area - area);

            let child_cost = |child: usize| -> f32 {
                let node = &self.nodes[child];
                let new_area = node.aabb.union(&leaf_aabb).perimeter();
                if node.is_leaf() {
                    new_area + inheritance_cost
                } else {
                    new_area - node.aabb.perimeter() + inheritance_cost
                }
            };
            let child1_cost = child_cost(child1);
            let child2_cost = child_cost(child2);

            if no_descent_cost < child1_cost && no_descent_cost < child2_cost {
                break;
            }
            best = if child1_cost < child2_cost { child1 } else { child2 };
        }

        let sibling = best;
        let old_parent = self.nodes[sibling].parent;
        let aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        let new_parent = self.nodes.push(TreeNode {
            aabb,
            category_bits: 0,
            parent: old_parent,
            height: 0,
            enlarged: false,
            node_type: TreeNodeType::Parent(sibling, leaf),
        });
        self.refit(new_parent);

        match old_parent {
            Some(old_parent) => self.replace_child(old_parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        self.fix_upwards(Some(new_parent));
    }

    /// Unlinks a leaf from the tree without freeing it. The sibling takes the
    /// place of the removed parent.
    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = match self.nodes[leaf].parent {
            Some(parent) => parent,
            None => panic!("proxy {} is not linked into the tree", leaf),
        };
        let sibling = match self.nodes[parent].node_type {
            TreeNodeType::Parent(child1, child2) => if child1 == leaf { child2 } else { child1 },
            TreeNodeType::Leaf(_) => unreachable!(),
        };
        let grand_parent = self.nodes[parent].parent;

        self.nodes.remove(parent);
        self.nodes[leaf].parent = None;
        self.nodes[sibling].parent = grand_parent;
        match grand_parent {
            Some(grand_parent) => {
                self.replace_child(grand_parent, parent, sibling);
                self.fix_upwards(Some(grand_parent));
            },
            None => self.root = Some(sibling),
        }
    }

    /// Performs a rotation if the subtree rooted at a is unbalanced. Returns
    /// the new root of the subtree.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].height < 2 {
            return a;
        }
        let (b, c) = match self.nodes[a].node_type {
            TreeNodeType::Parent(b, c) => (b, c),
            TreeNodeType::Leaf(_) => return a,
        };
        let (hb, hc) = (self.nodes[b].height, self.nodes[c].height);
        if hc > hb + 1 {
            self.rotate_up(a, c, b)
        } else if hb > hc + 1 {
            self.rotate_up(a, b, c)
        } else {
            a
        }
    }

    /// Promotes high, the taller child of a, into a's place. The taller of
    /// high's children stays with it and the shorter one moves under a.
    fn rotate_up(&mut self, a: usize, high: usize, low: usize) -> usize {
        let (f, g) = match self.nodes[high].node_type {
            TreeNodeType::Parent(f, g) => (f, g),
            TreeNodeType::Leaf(_) => unreachable!("rotating a leaf"),
        };

        let a_parent = self.nodes[a].parent;
        self.nodes[high].parent = a_parent;
        self.nodes[a].parent = Some(high);
        match a_parent {
            Some(p) => self.replace_child(p, a, high),
            None => self.root = Some(high),
        }

        let (keep, give) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[high].node_type = TreeNodeType::Parent(a, keep);
        self.nodes[a].node_type = TreeNodeType::Parent(low, give);
        self.nodes[give].parent = Some(a);

        self.refit(a);
        self.refit(high);
        high
    }
}

#[cfg(test)]
mod tests {
    mod dynamic_tree {
        use crate::bounds::*;
        use crate::dynamic_tree::*;
        use approx::assert_relative_eq;
        use cgmath::Vector2;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        fn square(x: f32, y: f32, h: f32) -> AABB {
            AABB::new(Vector2::new(x - h, y - h), Vector2::new(x + h, y + h))
        }

        /// Parents exactly bound their children.
        fn assert_tight(tree: &DynamicTree) {
            tree.validate();
            for (_, node) in tree.nodes.iter() {
                if let TreeNodeType::Parent(c1, c2) = node.node_type {
                    assert_eq!(node.aabb, tree.nodes[c1].aabb.union(&tree.nodes[c2].aabb));
                }
            }
        }

        fn log2(n: usize) -> f32 {
            (n as f32).log2()
        }

        #[test]
        fn test_grid_height() {
            let mut tree = DynamicTree::new();
            let mut n = 0;
            for i in 0..20 {
                for j in 0..20 {
                    tree.create_proxy(square(i as f32, j as f32, 0.4), DEFAULT_CATEGORY_BITS, n);
                    n += 1;
                }
            }
            assert_tight(&tree);
            assert_eq!(tree.proxy_count(), 400);
            assert!((tree.height() as f32) < 2.0 * log2(400));
            assert!(tree.area_ratio() > 0.0);

            assert_eq!(tree.rebuild(true), 400);
            assert_tight(&tree);
            assert!(tree.height() as f32 <= log2(400).ceil());
        }

        #[test]
        fn test_random_mutations() {
            let mut rng = StdRng::seed_from_u64(17);
            let mut tree = DynamicTree::new();
            let mut live: Vec<(usize, AABB)> = Vec::new();

            for step in 0..2000u64 {
                let op = rng.gen_range(0..10);
                if op < 4 || live.is_empty() {
                    let aabb = square(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0),
                                      rng.gen_range(0.1..2.0));
                    let id = tree.create_proxy(aabb, DEFAULT_CATEGORY_BITS, step);
                    live.push((id, aabb));
                } else if op < 7 {
                    let k = rng.gen_range(0..live.len());
                    let aabb = square(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0),
                                      rng.gen_range(0.1..2.0));
                    tree.move_proxy(live[k].0, aabb);
                    live[k].1 = aabb;
                } else if op < 9 {
                    let k = rng.gen_range(0..live.len());
                    let (id, _) = live.swap_remove(k);
                    tree.destroy_proxy(id);
                } else {
                    tree.rebuild(rng.gen_bool(0.5));
                }
                if step % 100 == 0 {
                    assert_tight(&tree);
                }
            }
            assert_tight(&tree);
            for &(id, aabb) in &live {
                assert_eq!(tree.fat_aabb(id), aabb);
            }

            tree.rebuild(true);
            assert_tight(&tree);
            assert!((tree.height() as f32) < 2.0 * log2(live.len()));
        }

        #[test]
        fn test_enlarge_and_partial_rebuild() {
            let mut tree = DynamicTree::new();
            let mut ids = Vec::new();
            for i in 0..64 {
                ids.push(tree.create_proxy(square(i as f32 * 3.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, i));
            }

            // Grow a few proxies far out of place.
            for (k, &id) in ids.iter().enumerate().step_by(9) {
                let grown = square(k as f32 * 3.0, 10.0, 12.0);
                tree.enlarge_proxy(id, grown);
                assert_eq!(tree.fat_aabb(id), grown);
                let root = tree.root_bounds().unwrap();
                assert!(root.contains(&grown));
            }
            tree.validate();

            let rebuilt = tree.rebuild(false);
            assert!(rebuilt > 0 && rebuilt <= 64);
            assert_tight(&tree);
            for (_, node) in tree.nodes.iter() {
                assert!(!node.enlarged);
            }

            // Every grown proxy is still found.
            let found = tree.query_all(&square(0.0, 20.0, 1.0), DEFAULT_MASK_BITS);
            assert!(found.contains(&ids[0]));
        }

        #[test]
        fn test_query_matches_brute_force() {
            let mut rng = StdRng::seed_from_u64(3);
            let mut tree = DynamicTree::new();
            let mut boxes = Vec::new();
            for i in 0..300u64 {
                let aabb = square(rng.gen_range(-30.0..30.0), rng.gen_range(-30.0..30.0),
                                  rng.gen_range(0.2..1.5));
                let category = 1u64 << rng.gen_range(0..3u32);
                let id = tree.create_proxy(aabb, category, i);
                boxes.push((id, aabb, category));
            }

            for _ in 0..50 {
                let query = square(rng.gen_range(-30.0..30.0), rng.gen_range(-30.0..30.0),
                                   rng.gen_range(0.5..8.0));
                let mask = rng.gen_range(1..8u64);
                let mut found = tree.query_all(&query, mask);
                found.sort();
                let mut expected: Vec<usize> = boxes
                    .iter()
                    .filter(|&&(_, aabb, category)| category & mask != 0 && aabb.overlaps(&query))
                    .map(|&(id, _, _)| id)
                    .collect();
                expected.sort();
                assert_eq!(found, expected);
            }

            // Early termination.
            let mut visits = 0;
            tree.query(&square(0.0, 0.0, 100.0), DEFAULT_MASK_BITS, |_, _| {
                visits += 1;
                visits < 5
            });
            assert_eq!(visits, 5);
        }

        #[test]
        fn test_category_bits() {
            let mut tree = DynamicTree::new();
            let a = tree.create_proxy(square(0.0, 0.0, 1.0), 0b01, 10);
            let b = tree.create_proxy(square(0.5, 0.0, 1.0), 0b10, 20);
            let query = square(0.0, 0.0, 2.0);
            assert_eq!(tree.query_all(&query, 0b01), vec![a]);
            assert_eq!(tree.query_all(&query, 0b10), vec![b]);
            tree.set_category_bits(a, 0b10);
            assert_eq!(tree.category_bits(a), 0b10);
            assert!(tree.query_all(&query, 0b01).is_empty());
            assert_eq!(tree.user_data(b), 20);
            tree.validate();
        }

        #[test]
        fn test_ray_cast() {
            let mut tree = DynamicTree::new();
            let near = tree.create_proxy(square(5.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 1);
            let far = tree.create_proxy(square(10.0, 0.0, 1.0), DEFAULT_CATEGORY_BITS, 2);
            tree.create_proxy(square(5.0, 10.0, 1.0), DEFAULT_CATEGORY_BITS, 3);

            let input = RayCastInput {
                origin: Vector2::new(0.0, 0.0),
                translation: Vector2::new(20.0, 0.0),
                max_fraction: 1.0,
            };

            // Clip to the closest hit.
            let mut closest = None;
            let mut closest_fraction = 1.0;
            tree.ray_cast(&input, DEFAULT_MASK_BITS, |sub, id, _| {
                let p1 = sub.origin;
                let p2 = sub.origin + sub.translation * sub.max_fraction;
                let out = tree.fat_aabb(id).ray_cast(p1, p2);
                if out.hit {
                    let fraction = out.fraction * sub.max_fraction;
                    closest = Some(id);
                    closest_fraction = fraction;
                    fraction
                } else {
                    -1.0
                }
            });
            assert_eq!(closest, Some(near));
            assert_relative_eq!(closest_fraction, 0.2, epsilon = 1e-6);

            // Ignore everything: all proxies along the ray are reported.
            let mut hits = Vec::new();
            tree.ray_cast(&input, DEFAULT_MASK_BITS, |_, id, _| {
                hits.push(id);
                -1.0
            });
            hits.sort();
            let mut expected = vec![near, far];
            expected.sort();
            assert_eq!(hits, expected);

            // Terminate on the first hit.
            let mut count = 0;
            tree.ray_cast(&input, DEFAULT_MASK_BITS, |_, _, _| {
                count += 1;
                0.0
            });
            assert_eq!(count, 1);
        }

        #[test]
        fn test_destroy_all() {
            let mut tree = DynamicTree::new();
            let ids: Vec<usize> = (0..10)
                .map(|i| tree.create_proxy(square(i as f32, 0.0, 0.5), DEFAULT_CATEGORY_BITS, i))
                .collect();
            for id in ids {
                assert!(tree.contains_proxy(id));
                tree.destroy_proxy(id);
                tree.validate();
            }
            assert_eq!(tree.node_count(), 0);
            assert_eq!(tree.root_bounds(), None);
            assert_eq!(tree.rebuild(true), 0);
        }
    }
}
