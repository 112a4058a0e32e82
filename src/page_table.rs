// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Packed page table: one byte of metadata per page.
//!
//! Bit layout, ported directly from `virtualmem.c`'s `page_table_entry_t`:
//!
//! ```text
//! bit 0-1  permission (00 = none, 01 = read, 10 = read/write)
//! bit 2    resident
//! bit 3    accessed
//! bit 4    dirty
//! ```
//!
//! Invariant: `resident == 0` implies every other bit is clear. Callers
//! (the [`crate::pager::Pager`]) are responsible for upholding this; the
//! table itself only refuses out-of-range indices.

use std::cell::Cell;

use bitflags::bitflags;

use crate::types::Permission;

const PERM_MASK: u8 = 0b0000_0011;

bitflags! {
    /// The three status bits above the 2-bit permission field.
    #[derive(Clone, Copy, PartialEq, Eq)]
    struct EntryFlags: u8 {
        const RESIDENT = 1 << 2;
        const ACCESSED = 1 << 3;
        const DIRTY    = 1 << 4;
    }
}

pub struct PageTable {
    entries: Box<[Cell<u8>]>,
}

impl PageTable {
    pub fn new(num_pages: usize) -> Self {
        PageTable {
            entries: (0..num_pages).map(|_| Cell::new(0)).collect(),
        }
    }

    fn get(&self, page: usize) -> u8 {
        self.entries[page].get()
    }

    fn set(&self, page: usize, value: u8) {
        self.entries[page].set(value);
    }

    fn flags(&self, page: usize) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.get(page))
    }

    pub fn is_resident(&self, page: usize) -> bool {
        self.flags(page).contains(EntryFlags::RESIDENT)
    }

    pub fn is_accessed(&self, page: usize) -> bool {
        self.flags(page).contains(EntryFlags::ACCESSED)
    }

    pub fn is_dirty(&self, page: usize) -> bool {
        self.flags(page).contains(EntryFlags::DIRTY)
    }

    pub fn permission(&self, page: usize) -> Permission {
        Permission::from_bits(self.get(page) & PERM_MASK)
    }

    /// Mark a page resident with the given permission; clears accessed and
    /// dirty, matching `virtualmem.c`'s `map_page` setting a fresh entry.
    pub fn set_resident(&self, page: usize, perm: Permission) {
        self.set(page, EntryFlags::RESIDENT.bits() | perm.bits());
    }

    /// Clear a page's entry entirely, restoring the "never touched"
    /// all-zero state required when a page is unmapped.
    pub fn clear(&self, page: usize) {
        self.set(page, 0);
    }

    /// Update only the permission bits of a resident entry, preserving
    /// accessed/dirty. Panics (aborts, under this crate's panic=abort
    /// profile) if the page is not resident — this mirrors the
    /// `assert(test_resident(...))` guard in `virtualmem.c`'s
    /// `set_page_permission`.
    pub fn set_permission(&self, page: usize, perm: Permission) {
        let cur = self.get(page);
        assert!(
            cur & EntryFlags::RESIDENT.bits() != 0,
            "page {page} is not resident"
        );
        self.set(page, (cur & !PERM_MASK) | perm.bits());
    }

    pub fn set_accessed(&self, page: usize) {
        let cur = self.flags(page);
        self.set(page, (cur | EntryFlags::ACCESSED).bits());
    }

    pub fn clear_accessed(&self, page: usize) {
        let cur = self.flags(page);
        self.set(page, (cur & !EntryFlags::ACCESSED).bits());
    }

    pub fn set_dirty(&self, page: usize) {
        let cur = self.flags(page);
        self.set(page, (cur | EntryFlags::DIRTY | EntryFlags::ACCESSED).bits());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
