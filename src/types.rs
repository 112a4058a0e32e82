// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Core value types shared across the crate.

use std::fmt;

use crate::config::{NUM_PAGES, PAGE_SIZE, VIRTUALMEM_ADDR_START};

/// Index of a page within the simulated address space.
pub type PageId = usize;

/// The access permission a page currently allows.
///
/// Three of the four patterns a 2-bit field can hold are used, matching
/// `PAGEPERM_NONE` / `PAGEPERM_READ` / `PAGEPERM_RDWR` in the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Permission {
    None = 0,
    Read = 1,
    ReadWrite = 2,
}

impl Permission {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Permission::None,
            1 => Permission::Read,
            _ => Permission::ReadWrite,
        }
    }

    pub(crate) fn bits(self) -> u8 {
        self as u8
    }

    /// Translate to the `nix`/`libc` `PROT_*` flags `mprotect` expects.
    pub fn to_prot_flags(self) -> nix::sys::mman::ProtFlags {
        use nix::sys::mman::ProtFlags;
        match self {
            Permission::None => ProtFlags::PROT_NONE,
            Permission::Read => ProtFlags::PROT_READ,
            Permission::ReadWrite => ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
        }
    }
}

/// The two ways a `SIGSEGV` can resolve, named for log output only —
/// nothing in the crate branches on a string form of this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The faulting page was not resident (`SEGV_MAPERR`-shaped fault):
    /// touching a page we've narrowed to `PROT_NONE`.
    NotMapped,
    /// The faulting page was resident but the access violated its current
    /// permission (`SEGV_ACCERR`-shaped fault): a write to a read-only page.
    AccessForbidden,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::NotMapped => write!(f, "not-mapped"),
            FaultKind::AccessForbidden => write!(f, "access-forbidden"),
        }
    }
}

/// Convert a page index to its virtual address within the reserved region.
pub fn page_to_addr(page: PageId) -> usize {
    VIRTUALMEM_ADDR_START + page * PAGE_SIZE
}

/// Convert an address within the reserved region back to its page index.
///
/// Asserts (fails hard) if `addr` falls outside `[vmem_start, vmem_end)`,
/// matching `addr_to_page`'s two `assert()`s in the original and the
/// external interface's non-optional contract. Callers on the fault path,
/// where an out-of-range address is a routine "genuine segmentation
/// fault" rather than an internal bug, should use [`try_addr_to_page`]
/// instead.
pub fn addr_to_page(addr: usize) -> PageId {
    try_addr_to_page(addr).expect("address is outside the reserved virtual memory range")
}

/// Like [`addr_to_page`], but returns `None` instead of asserting when
/// `addr` falls outside `[vmem_start, vmem_end)`. This is what
/// `Pager::resolve_fault` uses to turn an out-of-bounds fault into a
/// `PagerError::OutOfBounds` with its own diagnostic, rather than a bare
/// assertion failure.
pub fn try_addr_to_page(addr: usize) -> Option<PageId> {
    if addr < VIRTUALMEM_ADDR_START {
        return None;
    }
    let page = (addr - VIRTUALMEM_ADDR_START) / PAGE_SIZE;
    if page >= NUM_PAGES {
        return None;
    }
    Some(page)
}
