// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! CLOCK (second-chance) approximation of LRU.
//!
//! Ported from `vmpolicy_clru.c`. The original keeps a doubly-linked list
//! of `page_node`s and walks exactly `num_loaded` of them per timer tick,
//! snapshotting each node's successor before it might be relinked. A
//! `VecDeque` has no node identity to invalidate, so the same "exactly one
//! bounded pass per tick" behavior is reproduced by fully draining the
//! queue once per tick and only re-admitting pages that were not
//! recently accessed at their original relative position; pages that were
//! accessed are cleared and appended to the tail, giving them a fresh
//! "second chance" before they can become a victim.

use std::collections::VecDeque;

use crate::page_table::PageTable;
use crate::types::PageId;

use super::{Policy, ProtectionSink};

pub struct ClockLru {
    queue: VecDeque<PageId>,
}

impl ClockLru {
    pub fn new() -> Self {
        log::info!("using CLOCK/LRU eviction policy");
        ClockLru {
            queue: VecDeque::new(),
        }
    }
}

impl Default for ClockLru {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ClockLru {
    fn on_page_mapped(&mut self, page: PageId) {
        self.queue.push_back(page);
    }

    fn on_page_unmapped(&mut self, page: PageId) {
        self.queue.retain(|&p| p != page);
    }

    fn on_timer_tick(&mut self, table: &PageTable, sink: &mut dyn ProtectionSink) {
        let num_loaded = self.queue.len();
        if num_loaded <= 1 {
            // Nothing to age with zero or one resident page: there's no
            // ordering to maintain, so leave the lone page's accessed bit
            // and permission untouched. Matches `vmpolicy_clru.c`'s
            // `policy_timer_tick` early return on `num_loaded == 0 || 1`.
            return;
        }
        let mut unchanged = VecDeque::with_capacity(num_loaded);

        for _ in 0..num_loaded {
            let page = self
                .queue
                .pop_front()
                .expect("queue shrank during its own bounded walk");

            if table.is_accessed(page) {
                table.clear_accessed(page);
                sink.drop_to_none(page);
                self.queue.push_back(page);
            } else {
                unchanged.push_back(page);
            }
        }

        while let Some(page) = unchanged.pop_back() {
            self.queue.push_front(page);
        }
    }

    fn choose_victim(&mut self) -> PageId {
        self.queue
            .pop_front()
            .expect("choose_victim called with no resident pages")
    }

    fn name(&self) -> &'static str {
        "clock"
    }
}
