// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Swap backing store: a private, unlinked file used as the "disk" behind
//! pages that aren't currently resident.
//!
//! `virtualmem.c` opens a named file under `/tmp/cs24_pagedev_%05d` and
//! unlinks it immediately; `tempfile::tempfile()` gives the same
//! already-unlinked-on-creation file without a window where the name is
//! visible to anything else on the system.

use std::fs::File;
use std::os::unix::fs::FileExt;

use crate::config::PAGE_SIZE;
use crate::error::PagerError;

pub struct SwapFile {
    file: File,
}

impl SwapFile {
    pub fn create(num_pages: usize) -> Result<Self, PagerError> {
        let file = tempfile::tempfile().map_err(PagerError::SwapIo)?;
        file.set_len((num_pages * PAGE_SIZE) as u64)
            .map_err(PagerError::SwapIo)?;
        Ok(SwapFile { file })
    }

    fn offset(page: usize) -> u64 {
        (page * PAGE_SIZE) as u64
    }

    /// Read exactly one page's worth of bytes from the page's swap slot.
    /// A short read is a fatal I/O error, not a partial result.
    pub fn read_page(&self, page: usize, buf: &mut [u8; PAGE_SIZE]) -> Result<(), PagerError> {
        self.file
            .read_exact_at(buf, Self::offset(page))
            .map_err(PagerError::SwapIo)
    }

    /// Write exactly one page's worth of bytes to the page's swap slot.
    pub fn write_page(&self, page: usize, buf: &[u8; PAGE_SIZE]) -> Result<(), PagerError> {
        self.file
            .write_all_at(buf, Self::offset(page))
            .map_err(PagerError::SwapIo)
    }
}
