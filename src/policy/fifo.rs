// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! FIFO replacement policy: evict whichever resident page was mapped
//! longest ago, regardless of how recently it was touched.
//!
//! Ported from `vmpolicy_fifo.c`. The C version keeps a singly-linked
//! queue built from hand-rolled `page_node` structs; a `VecDeque` gives
//! the same append-tail/pop-front behavior without the manual list
//! bookkeeping.

use std::collections::VecDeque;

use crate::page_table::PageTable;
use crate::types::PageId;

use super::{Policy, ProtectionSink};

pub struct Fifo {
    queue: VecDeque<PageId>,
}

impl Fifo {
    pub fn new() -> Self {
        log::info!("using FIFO eviction policy");
        Fifo {
            queue: VecDeque::new(),
        }
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for Fifo {
    fn on_page_mapped(&mut self, page: PageId) {
        self.queue.push_back(page);
    }

    fn on_page_unmapped(&mut self, page: PageId) {
        self.queue.retain(|&p| p != page);
    }

    fn on_timer_tick(&mut self, _table: &PageTable, _sink: &mut dyn ProtectionSink) {
        // No-op: FIFO ordering depends only on mapping order, never on
        // time-sliced access tracking. Matches `policy_timer_tick`'s empty
        // body in `vmpolicy_fifo.c`.
    }

    fn choose_victim(&mut self) -> PageId {
        self.queue
            .pop_front()
            .expect("choose_victim called with no resident pages")
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_in_mapping_order() {
        let mut p = Fifo::new();
        p.on_page_mapped(3);
        p.on_page_mapped(1);
        p.on_page_mapped(7);
        assert_eq!(p.choose_victim(), 3);
        assert_eq!(p.choose_victim(), 1);
        assert_eq!(p.choose_victim(), 7);
    }

    #[test]
    fn unmapping_removes_from_queue_without_reordering_rest() {
        let mut p = Fifo::new();
        p.on_page_mapped(1);
        p.on_page_mapped(2);
        p.on_page_mapped(3);
        p.on_page_unmapped(2);
        assert_eq!(p.choose_victim(), 1);
        assert_eq!(p.choose_victim(), 3);
    }
}
