// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The central state machine: owns the page table, the swap backing
//! store, the replacement policy, and the bookkeeping counters.
//!
//! This is the Rust analogue of `virtualmem.c`'s file-static state plus
//! its `vmem_init` / `map_page` / `unmap_page` / `set_page_permission` /
//! `sigsegv_handler` functions. One `Pager` exists per process, reachable
//! through a single global so the signal handlers installed in
//! [`crate::signal`] can reach it without a user context pointer.

use std::ffi::c_void;
use std::num::NonZeroUsize;

use nix::sys::mman::{mmap, mprotect, munmap, MapFlags, ProtFlags};

use crate::config::{NUM_PAGES, PAGE_SIZE, VIRTUALMEM_ADDR_START, VIRTUALMEM_SIZE};
use crate::error::PagerError;
use crate::page_table::PageTable;
use crate::policy::{default_policy, Policy, ProtectionSink};
use crate::swap::SwapFile;
use crate::types::{page_to_addr, FaultKind, PageId, Permission};

pub struct Pager {
    table: PageTable,
    swap: SwapFile,
    policy: Box<dyn Policy + Send>,
    num_resident: u32,
    max_resident: u32,
    num_faults: u64,
    num_loads: u64,
}

/// Drops a resident page's permission back to `None` without evicting it.
///
/// Only reaches into the page table's interior-mutable bits and issues its
/// own `mprotect` call; it deliberately does not need `&mut Pager`, since
/// [`Policy::on_timer_tick`] is called with `&Pager`'s table and a separate
/// mutable borrow of its policy at the same time.
struct TimerTickSink<'a> {
    table: &'a PageTable,
}

impl ProtectionSink for TimerTickSink<'_> {
    fn drop_to_none(&mut self, page: PageId) {
        let addr = page_to_addr(page);
        let result = unsafe { mprotect(addr as *mut c_void, PAGE_SIZE, ProtFlags::PROT_NONE) };
        match result {
            Ok(()) => self.table.set_permission(page, Permission::None),
            Err(e) => log::error!("failed to drop permission on page {page} during tick: {e}"),
        }
    }
}

impl Pager {
    /// Reserve the virtual memory pool and construct a fresh pager.
    ///
    /// Returns the base address of the reserved region, matching
    /// `vmem_init`'s return value in the original.
    pub fn init(max_resident: u32) -> Result<(Pager, usize), PagerError> {
        if max_resident == 0 || max_resident as usize > NUM_PAGES {
            return Err(PagerError::PolicyInit(format!(
                "max_resident must be in 1..={NUM_PAGES}, got {max_resident}"
            )));
        }

        let swap = SwapFile::create(NUM_PAGES)?;
        let table = PageTable::new(NUM_PAGES);
        let policy = default_policy();

        unsafe {
            mmap(
                NonZeroUsize::new(VIRTUALMEM_ADDR_START),
                NonZeroUsize::new(VIRTUALMEM_SIZE).expect("VIRTUALMEM_SIZE is nonzero"),
                ProtFlags::PROT_NONE,
                MapFlags::MAP_FIXED
                    | MapFlags::MAP_PRIVATE
                    | MapFlags::MAP_ANONYMOUS
                    | MapFlags::MAP_NORESERVE,
                None,
                0,
            )
        }
        .map_err(|e| PagerError::Mapping(format!("reserving address range: {e}")))?;

        log::info!(
            "\"physical memory\" reserved at [{:#x}, {:#x}), {max_resident} of {NUM_PAGES} pages may be resident at once, policy={}",
            VIRTUALMEM_ADDR_START,
            VIRTUALMEM_ADDR_START + VIRTUALMEM_SIZE,
            policy.name(),
        );

        Ok((
            Pager {
                table,
                swap,
                policy,
                num_resident: 0,
                max_resident,
                num_faults: 0,
                num_loads: 0,
            },
            VIRTUALMEM_ADDR_START,
        ))
    }

    pub fn vmem_start(&self) -> usize {
        VIRTUALMEM_ADDR_START
    }

    pub fn vmem_end(&self) -> usize {
        VIRTUALMEM_ADDR_START + VIRTUALMEM_SIZE
    }

    pub fn num_faults(&self) -> u64 {
        self.num_faults
    }

    pub fn num_loads(&self) -> u64 {
        self.num_loads
    }

    /// The sole coupling point between the page table's bookkeeping and
    /// the real protection on the mapping: every permission change goes
    /// through here.
    fn set_page_permission(&mut self, page: PageId, perm: Permission) -> Result<(), PagerError> {
        let addr = page_to_addr(page);
        unsafe { mprotect(addr as *mut c_void, PAGE_SIZE, perm.to_prot_flags()) }
            .map_err(|e| PagerError::Protection(format!("page {page}: {e}")))?;
        self.table.set_permission(page, perm);
        Ok(())
    }

    /// Bring `page` into residency: map fresh anonymous memory over its
    /// slot, fill it from swap, then narrow it down to `initial_perm`.
    fn map_page(&mut self, page: PageId, initial_perm: Permission) -> Result<(), PagerError> {
        debug_assert!(!self.table.is_resident(page));

        // Standalone defensive check, independent of whatever the caller
        // already evicted: exceeding the residency cap is an invariant
        // violation, not a silent overcommit. Mirrors `virtualmem.c`'s
        // `map_page` incrementing `num_resident` and aborting before doing
        // anything else.
        self.num_resident += 1;
        if self.num_resident > self.max_resident {
            return Err(PagerError::Invariant(
                "map_page: exceeded physical memory residency cap",
            ));
        }

        let addr = page_to_addr(page);

        unsafe {
            mmap(
                NonZeroUsize::new(addr),
                NonZeroUsize::new(PAGE_SIZE).expect("PAGE_SIZE is nonzero"),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_FIXED | MapFlags::MAP_SHARED | MapFlags::MAP_ANONYMOUS,
                None,
                0,
            )
        }
        .map_err(|e| PagerError::Mapping(format!("page {page}: {e}")))?;

        let mut buf = [0u8; PAGE_SIZE];
        self.swap.read_page(page, &mut buf)?;
        // SAFETY: the page was just mmap'd read-write above, is exactly
        // PAGE_SIZE bytes, and `buf` is a disjoint stack allocation.
        unsafe { std::ptr::copy_nonoverlapping(buf.as_ptr(), addr as *mut u8, PAGE_SIZE) };

        self.table.set_resident(page, Permission::ReadWrite);
        self.set_page_permission(page, initial_perm)?;

        self.num_loads += 1;
        self.policy.on_page_mapped(page);

        log::debug!("mapped page {page} at {addr:#x}, initial permission {initial_perm:?}");
        Ok(())
    }

    /// Remove `page` from residency, writing it back to swap first if
    /// it's dirty.
    fn unmap_page(&mut self, page: PageId) -> Result<(), PagerError> {
        debug_assert!(self.table.is_resident(page));
        let addr = page_to_addr(page);

        if self.table.is_dirty(page) {
            // Dirty implies accessed, but the CLOCK policy may have since
            // dropped the real protection to NONE to re-arm access
            // tracking; raise it back to READ so the copy below doesn't
            // raise a genuine SIGSEGV against our own mapping.
            self.set_page_permission(page, Permission::Read)?;
            let mut buf = [0u8; PAGE_SIZE];
            // SAFETY: the page is resident and was just granted READ above.
            unsafe { std::ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), PAGE_SIZE) };
            self.swap.write_page(page, &buf)?;
        }

        unsafe { munmap(addr as *mut c_void, PAGE_SIZE) }
            .map_err(|e| PagerError::Mapping(format!("unmapping page {page}: {e}")))?;

        self.table.clear(page);
        self.num_resident -= 1;
        self.policy.on_page_unmapped(page);

        log::debug!("unmapped page {page}");
        Ok(())
    }

    /// Classify and resolve a fault at `addr`, called from the `SIGSEGV`
    /// handler installed by [`crate::signal`].
    pub fn resolve_fault(&mut self, addr: usize) -> Result<(), PagerError> {
        let page = crate::types::try_addr_to_page(addr).ok_or(PagerError::OutOfBounds { addr })?;
        self.num_faults += 1;

        if !self.table.is_resident(page) {
            log::trace!("fault on page {page} ({addr:#x}): {}", FaultKind::NotMapped);
            if self.num_resident >= self.max_resident {
                let victim = self.policy.choose_victim();
                self.unmap_page(victim)?;
            }
            // Freshly loaded pages always start unreadable, so the very
            // next touch faults again and is what actually grants READ
            // and sets the accessed bit.
            self.map_page(page, Permission::None)?;
        } else {
            log::trace!(
                "fault on page {page} ({addr:#x}): {}",
                FaultKind::AccessForbidden
            );
            match self.table.permission(page) {
                Permission::None => {
                    self.set_page_permission(page, Permission::Read)?;
                    self.table.set_accessed(page);
                }
                Permission::Read => {
                    self.set_page_permission(page, Permission::ReadWrite)?;
                    self.table.set_dirty(page);
                }
                Permission::ReadWrite => {
                    return Err(PagerError::Invariant(
                        "access-forbidden fault on a page already RDWR",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Drive the replacement policy's periodic aging step.
    pub fn timer_tick(&mut self) {
        let mut sink = TimerTickSink { table: &self.table };
        self.policy.on_timer_tick(&self.table, &mut sink);
    }

    /// Unmap every resident page (writing back dirty ones) and release
    /// the reserved address range.
    pub fn cleanup(&mut self) -> Result<(), PagerError> {
        let resident: Vec<PageId> = (0..NUM_PAGES).filter(|&p| self.table.is_resident(p)).collect();
        for page in resident {
            self.unmap_page(page)?;
        }
        unsafe { munmap(VIRTUALMEM_ADDR_START as *mut c_void, VIRTUALMEM_SIZE) }
            .map_err(|e| PagerError::Mapping(format!("releasing reserved region: {e}")))?;
        log::info!(
            "pager shut down after {} faults, {} loads",
            self.num_faults,
            self.num_loads
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // These tests touch real mmap/mprotect/signal-adjacent state, so they
    // run serially within the process; each builds and tears down its own
    // Pager rather than relying on the crate's global instance. `SESSION`
    // keeps the ones that actually reserve the fixed address range from
    // interleaving with each other under cargo's parallel test runner.
    static SESSION: Mutex<()> = Mutex::new(());

    #[test]
    fn init_rejects_zero_max_resident() {
        match Pager::init(0) {
            Err(PagerError::PolicyInit(_)) => {}
            other => panic!("expected PolicyInit error, got {other:?}"),
        }
    }

    #[test]
    fn init_rejects_max_resident_above_num_pages() {
        match Pager::init(NUM_PAGES as u32 + 1) {
            Err(PagerError::PolicyInit(_)) => {}
            other => panic!("expected PolicyInit error, got {other:?}"),
        }
    }

    #[test]
    fn resolve_fault_walks_none_read_rdwr_then_rejects_a_third_fault() {
        let _guard = SESSION.lock().unwrap();
        let (mut pager, base) = Pager::init(4).expect("init");

        // First touch: not resident, loads the page as NONE.
        pager.resolve_fault(base).expect("not-mapped fault");
        assert_eq!(pager.num_faults(), 1);
        assert_eq!(pager.num_loads(), 1);
        assert_eq!(pager.table.permission(0), Permission::None);
        assert!(!pager.table.is_accessed(0));

        // Second touch: access-forbidden, NONE -> READ, accessed set.
        pager.resolve_fault(base).expect("none-to-read fault");
        assert_eq!(pager.num_faults(), 2);
        assert_eq!(pager.num_loads(), 1);
        assert_eq!(pager.table.permission(0), Permission::Read);
        assert!(pager.table.is_accessed(0));
        assert!(!pager.table.is_dirty(0));

        // Third touch: access-forbidden, READ -> RDWR, dirty set.
        pager.resolve_fault(base).expect("read-to-rdwr fault");
        assert_eq!(pager.num_faults(), 3);
        assert_eq!(pager.table.permission(0), Permission::ReadWrite);
        assert!(pager.table.is_dirty(0));

        // A fourth access-forbidden fault on an already-RDWR page is an
        // unreachable state; it must be reported, never silently resolved.
        match pager.resolve_fault(base) {
            Err(PagerError::Invariant(_)) => {}
            other => panic!("expected Invariant error, got {other:?}"),
        }

        pager.cleanup().expect("cleanup");
    }

    #[test]
    fn resolve_fault_rejects_out_of_bounds_address() {
        let _guard = SESSION.lock().unwrap();
        let (mut pager, base) = Pager::init(4).expect("init");

        match pager.resolve_fault(base - 1) {
            Err(PagerError::OutOfBounds { .. }) => {}
            other => panic!("expected OutOfBounds error, got {other:?}"),
        }
        // An out-of-bounds fault must not be counted as a resolved fault
        // against this pool, and must not touch any page's residency.
        assert_eq!(pager.num_faults(), 0);

        pager.cleanup().expect("cleanup");
    }
}
