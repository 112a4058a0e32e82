// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Error taxonomy for the pager.
//!
//! Every variant here is, per design, unrecoverable: the hosting
//! application has no well-defined way to continue once one of these
//! fires, so callers that hit one are expected to route it through
//! [`fatal`] rather than propagate it further. `PagerError` still exists
//! as a normal `std::error::Error` so unit tests can assert on *which*
//! failure occurred.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("failed to map page: {0}")]
    Mapping(String),

    #[error("failed to change page protection: {0}")]
    Protection(String),

    #[error("swap I/O failed: {0}")]
    SwapIo(#[from] std::io::Error),

    #[error("address {addr:#x} is outside the reserved region")]
    OutOfBounds { addr: usize },

    #[error("replacement policy initialization failed: {0}")]
    PolicyInit(String),

    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),

    #[error("signal handler installation failed: {0}")]
    SignalSetup(String),
}

/// Log and terminate the process.
///
/// `virtualmem.c` reacts to every one of these conditions with
/// `perror(...); abort();`. We reproduce that exactly: `abort()` raises
/// `SIGABRT`, which is the closer analogue to the original's behavior than
/// an unwinding panic, and doesn't depend on unwind semantics the crate's
/// `panic = "abort"` profile has already opted out of anyway.
pub fn fatal(err: PagerError) -> ! {
    log::error!("fatal pager error: {err}");
    std::process::abort()
}
