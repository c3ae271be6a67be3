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

use std::mem;
use std::ops::{Index, IndexMut};

/// Internal storage type used by Pool.
#[derive(Clone, Debug)]
enum Slot<T> {
    Vacant { next_free: Option<usize> },
    Occupied(T),
}

/// Growable arena that allows items to be removed and inserted without
/// changing the indices of other entries. Removed slots are threaded onto a
/// free list and reused by later pushes.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    len: usize,
    free_list: Option<usize>,
    slots: Vec<Slot<T>>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool::new()
    }
}

impl<T> Pool<T> {
    /// Create an empty Pool.
    pub fn new() -> Self {
        Pool {
            len: 0,
            free_list: None,
            slots: Vec::new(),
        }
    }

    /// Create an empty Pool large enough to fit cap items.
    pub fn with_capacity(cap: usize) -> Self {
        Pool {
            len: 0,
            free_list: None,
            slots: Vec::with_capacity(cap),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of slots, occupied or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Push a new item to the Pool. Reuses slots left empty by removed items
    /// before growing.
    pub fn push(&mut self, item: T) -> usize {
        self.len += 1;
        match self.free_list {
            Some(free) => {
                self.free_list = match self.slots[free] {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(_) => unreachable!("free list points at occupied slot {}", free),
                };
                self.slots[free] = Slot::Occupied(item);
                free
            },
            None => {
                self.slots.push(Slot::Occupied(item));
                self.slots.len() - 1
            },
        }
    }

    /// Vacates a slot and returns its item. Panics if the slot is not
    /// occupied.
    pub fn remove(&mut self, i: usize) -> T {
        let vacant = Slot::Vacant { next_free: self.free_list };
        match mem::replace(&mut self.slots[i], vacant) {
            Slot::Occupied(item) => {
                self.free_list = Some(i);
                self.len -= 1;
                item
            },
            old @ Slot::Vacant { .. } => {
                self.slots[i] = old;
                panic!("index {} is not occupied", i);
            },
        }
    }

    pub fn contains(&self, i: usize) -> bool {
        self.get(i).is_some()
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        match self.slots.get(i) {
            Some(Slot::Occupied(item)) => Some(item),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        match self.slots.get_mut(i) {
            Some(Slot::Occupied(item)) => Some(item),
            _ => None,
        }
    }

    /// Removes every item, keeping the allocation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list = None;
        self.len = 0;
    }

    /// Iterates occupied slots along with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(item) => Some((i, item)),
            Slot::Vacant { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(item) => Some((i, item)),
            Slot::Vacant { .. } => None,
        })
    }
}

impl<T> Index<usize> for Pool<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        match self.slots[i] {
            Slot::Occupied(ref item) => item,
            Slot::Vacant { .. } => panic!("index {} is not occupied", i),
        }
    }
}

impl<T> IndexMut<usize> for Pool<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        match self.slots[i] {
            Slot::Occupied(ref mut item) => item,
            Slot::Vacant { .. } => panic!("index {} is not occupied", i),
        }
    }
}

#[cfg(test)]
mod tests {
    mod pool {
        use crate::pool::*;

        fn items(pool: &Pool<usize>) -> Vec<usize> {
            pool.iter().map(|(_, &u)| u).collect()
        }

        #[test]
        fn test_reuse_free_slots() {
            let mut pool: Pool<usize> = Pool::new();

            let id0 = pool.push(0);
            let id1 = pool.push(1);
            let id2 = pool.push(2);
            let id3 = pool.push(3);
            assert_eq!((id0, id3), (0, 3));

            assert_eq!(pool.remove(id1), 1);
            assert_eq!(pool.remove(id2), 2);
            assert_eq!(pool.len(), 2);
            assert_eq!(pool[id0], 0);
            assert_eq!(pool[id3], 3);
            assert!(!pool.contains(id1));
            assert_eq!(items(&pool), vec![0, 3]);

            // Most recently freed slot is reused first.
            assert_eq!(pool.push(10), id2);
            assert_eq!(pool.push(11), id1);
            assert_eq!(pool.push(12), 4);
            assert_eq!(pool.capacity(), 5);
            assert_eq!(items(&pool), vec![0, 11, 10, 3, 12]);
        }

        #[test]
        fn test_remove_patterns() {
            let mut pool: Pool<usize> = Pool::new();
            for i in 0..24 {
                pool.push(i);
            }
            for i in 8..16 {
                pool.remove(i);
            }
            assert_eq!(items(&pool), (0..8).chain(16..24).collect::<Vec<_>>());

            pool.remove(23);
            pool.remove(18);
            pool.remove(19);
            assert_eq!(items(&pool), vec![0, 1, 2, 3, 4, 5, 6, 7, 16, 17, 20, 21, 22]);

            for (i, item) in pool.iter_mut() {
                *item = i * 2;
            }
            assert_eq!(pool.get(16), Some(&32));
            assert_eq!(pool.get(18), None);
            assert_eq!(pool.get(100), None);

            pool.clear();
            assert!(pool.is_empty());
            assert_eq!(pool.push(7), 0);
        }

        #[test]
        #[should_panic]
        fn test_double_remove() {
            let mut pool: Pool<usize> = Pool::new();
            let id = pool.push(1);
            pool.remove(id);
            pool.remove(id);
        }
    }
}
