// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Pluggable page replacement policies.
//!
//! The trait here is the Rust shape of `vmpolicy.h`'s function-pointer
//! table (`policy_init` / `policy_cleanup` / `policy_page_mapped` /
//! `policy_timer_tick` / `policy_choose_and_evict_victim_page`).
//! `policy_init`/`policy_cleanup` become `Policy::new` and `Drop`, which
//! costs nothing: the original split them out only because C has no
//! destructors.

mod clock;
mod fifo;

pub use clock::ClockLru;
pub use fifo::Fifo;

use crate::page_table::PageTable;
use crate::types::PageId;

/// The narrow callback a policy uses to ask the pager to drop a page's
/// permission without evicting it. Only [`ClockLru`] uses this, to lower a
/// page back to `Permission::None` so the next access re-sets its accessed
/// bit; it exists so policies never need direct access to the pager or to
/// the host's `mprotect` call.
pub trait ProtectionSink {
    fn drop_to_none(&mut self, page: PageId);
}

pub trait Policy {
    /// Record that `page` has just become resident.
    fn on_page_mapped(&mut self, page: PageId);

    /// Record that `page` has just become non-resident (evicted or
    /// otherwise unmapped), so the policy can drop any bookkeeping for it.
    fn on_page_unmapped(&mut self, page: PageId);

    /// Called once per timer tick. `table` is read-only so the policy can
    /// inspect accessed/dirty bits; `sink` is how it asks for a permission
    /// change. FIFO ignores both arguments, matching the empty body of
    /// `policy_timer_tick` in `vmpolicy_fifo.c`.
    fn on_timer_tick(&mut self, table: &PageTable, sink: &mut dyn ProtectionSink);

    /// Pick a resident page to evict and stop tracking it. Panics if no
    /// page is tracked — callers never call this with zero resident pages.
    fn choose_victim(&mut self) -> PageId;

    fn name(&self) -> &'static str;
}

/// Build the policy selected at compile time via Cargo features.
///
/// Exactly one of `policy-fifo` / `policy-clock` is expected to be active;
/// `policy-fifo` is the crate default.
pub fn default_policy() -> Box<dyn Policy + Send> {
    #[cfg(feature = "policy-clock")]
    {
        Box::new(ClockLru::new())
    }
    #[cfg(not(feature = "policy-clock"))]
    {
        Box::new(Fifo::new())
    }
}
