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

use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out indices into a fixed length work array to any number of
/// workers. Each index is handed out exactly once until the counter is reset.
#[derive(Debug, Default)]
pub struct ClaimCounter {
    next: AtomicUsize,
}

impl ClaimCounter {
    pub fn new() -> Self {
        ClaimCounter {
            next: AtomicUsize::new(0),
        }
    }

    /// Claims the next index below `len`, or `None` when the work is used up.
    #[inline]
    pub fn claim(&self, len: usize) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if index < len {
            Some(index)
        } else {
            None
        }
    }

    /// Number of indices handed out so far, including failed claims.
    pub fn claimed(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    pub fn reset(&mut self) {
        *self.next.get_mut() = 0;
    }
}
