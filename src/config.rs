// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Compile-time constants for the simulated virtual memory pool.
//!
//! Mirrors `virtualmem.c`'s `PAGE_SIZE` / `NUM_PAGES` / `VIRTUALMEM_ADDR_START`
//! constants: the pool's size and location are fixed at build time, while
//! the resident-page budget is a runtime parameter to [`crate::vmem_init`].

/// Size in bytes of a single page. Matches the host's real page size on the
/// lab machines this design was adapted from; kept as a plain constant here
/// since the pool is a simulation layered over anonymous memory, not real
/// physical pages.
pub const PAGE_SIZE: usize = 4096;

/// Number of pages in the simulated address space.
pub const NUM_PAGES: usize = 1024;

/// Base address of the reserved virtual memory region.
///
/// Chosen low enough to avoid colliding with the default mmap arena on
/// every architecture we target, high enough to stand out in a debugger.
pub const VIRTUALMEM_ADDR_START: usize = 0x2000_0000;

/// Total size in bytes of the reserved region.
pub const VIRTUALMEM_SIZE: usize = PAGE_SIZE * NUM_PAGES;

/// Timer tick period used to drive [`crate::policy::Policy::on_timer_tick`].
pub const TIMESLICE_SEC: i64 = 0;
pub const TIMESLICE_USEC: i64 = 10_000;
