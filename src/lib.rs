// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A user-space demand-paged virtual memory simulator.
//!
//! Reserves a fixed virtual address range, serves page faults against it
//! with `SIGSEGV`, and ages residency with a periodic `SIGALRM` tick. Two
//! replacement policies are available behind Cargo features: `policy-fifo`
//! (default) and `policy-clock`.
//!
//! ```no_run
//! let base = userpager::vmem_init(8).expect("vmem_init");
//! let slice = unsafe { std::slice::from_raw_parts_mut(base as *mut u8, 4096) };
//! slice[0] = 42;
//! assert_eq!(slice[0], 42);
//! userpager::vmem_cleanup();
//! ```

pub mod config;
pub mod error;
pub mod page_table;
pub mod pager;
pub mod policy;
mod signal;
pub mod swap;
pub mod types;

pub use error::PagerError;
pub use types::{FaultKind, PageId, Permission};

use pager::Pager;

/// Reserve the simulated address range and install the fault and timer
/// handlers. `max_resident` bounds how many pages may be resident at
/// once; exceeding it triggers an eviction on the next fault.
///
/// Returns the base address of the reserved range, as `vmem_init` does in
/// the original design.
pub fn vmem_init(max_resident: u32) -> Result<usize, PagerError> {
    let (pager, base) = Pager::init(max_resident)?;
    signal::install(pager)?;
    Ok(base)
}

/// Unmap every resident page (writing back dirty ones), release the
/// reserved range, and uninstall the handlers.
///
/// Any failure here is fatal: there is no well-defined way to continue
/// once teardown can't complete, so this never returns a `Result`.
pub fn vmem_cleanup() {
    if let Err(e) = signal::teardown() {
        error::fatal(e);
    }
}

pub fn get_vmem_start() -> usize {
    signal::with_pager(|p| p.vmem_start()).unwrap_or(config::VIRTUALMEM_ADDR_START)
}

pub fn get_vmem_end() -> usize {
    signal::with_pager(|p| p.vmem_end())
        .unwrap_or(config::VIRTUALMEM_ADDR_START + config::VIRTUALMEM_SIZE)
}

pub fn page_to_addr(page: PageId) -> usize {
    types::page_to_addr(page)
}

/// Asserts (fails hard) if `addr` falls outside the reserved range.
pub fn addr_to_page(addr: usize) -> PageId {
    types::addr_to_page(addr)
}

pub fn get_num_faults() -> u64 {
    signal::with_pager(|p| p.num_faults()).unwrap_or(0)
}

pub fn get_num_loads() -> u64 {
    signal::with_pager(|p| p.num_loads()).unwrap_or(0)
}
