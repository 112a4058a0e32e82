// Copyright 2025 The Userpager Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Installs the `SIGSEGV` and `SIGALRM` handlers that drive the pager.
//!
//! Mirrors `virtualmem.c`'s `vmem_init`: both handlers run off an
//! alternate signal stack (`SA_ONSTACK`), and `SIGALRM` is masked while
//! `SIGSEGV` is being handled so a fault that occurs mid-eviction can't be
//! interrupted by a timer tick trying to touch the same page table.

use std::ffi::c_void;

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::PagerError;
use crate::pager::Pager;

// Alternate stack for the two handlers. `SIGSTKSZ` varies by libc; a fixed
// generous size avoids pulling in the platform constant.
const ALT_STACK_SIZE: usize = 64 * 1024;

static mut ALT_STACK: [u8; ALT_STACK_SIZE] = [0u8; ALT_STACK_SIZE];

/// The single pager instance the signal handlers dispatch to.
///
/// A signal handler receives no user context pointer, so this has to be a
/// well-known global, exactly as `virtualmem.c`'s file-static pager state
/// and the teacher's own `static mut GLOBAL_PAGER` in `kernel/vm/pager.rs`
/// both are. Access is confined to this module and to [`crate::lib`]'s
/// thin wrapper functions, all of which run on the single application
/// thread this crate is designed for (see the crate's concurrency model).
static mut GLOBAL_PAGER: Option<Pager> = None;

pub fn install(pager: Pager) -> Result<(), PagerError> {
    unsafe {
        GLOBAL_PAGER = Some(pager);
    }

    install_altstack()?;
    install_sigsegv()?;
    install_sigalrm()?;
    start_timer()?;
    Ok(())
}

#[allow(static_mut_refs)]
pub fn with_pager<R>(f: impl FnOnce(&mut Pager) -> R) -> Option<R> {
    unsafe { GLOBAL_PAGER.as_mut().map(f) }
}

pub fn teardown() -> Result<(), PagerError> {
    let result = with_pager(|p| p.cleanup());
    unsafe {
        GLOBAL_PAGER = None;
    }
    result.transpose()?;
    Ok(())
}

#[allow(static_mut_refs)]
fn install_altstack() -> Result<(), PagerError> {
    // `nix` has no safe wrapper for `sigaltstack`; this goes straight to
    // `libc`, same as the timer setup below.
    let stack = libc::stack_t {
        ss_sp: unsafe { ALT_STACK.as_mut_ptr() as *mut c_void },
        ss_flags: 0,
        ss_size: ALT_STACK_SIZE,
    };
    let rc = unsafe { libc::sigaltstack(&stack, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(PagerError::SignalSetup(format!(
            "sigaltstack failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

fn install_sigsegv() -> Result<(), PagerError> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGALRM);

    let action = SigAction::new(
        SigHandler::SigAction(sigsegv_handler),
        SaFlags::SA_SIGINFO | SaFlags::SA_ONSTACK,
        mask,
    );

    unsafe { signal::sigaction(Signal::SIGSEGV, &action) }
        .map_err(|e| PagerError::SignalSetup(format!("installing SIGSEGV handler: {e}")))?;
    Ok(())
}

fn install_sigalrm() -> Result<(), PagerError> {
    let action = SigAction::new(
        SigHandler::SigAction(sigalrm_handler),
        SaFlags::SA_SIGINFO | SaFlags::SA_ONSTACK,
        SigSet::empty(),
    );

    unsafe { signal::sigaction(Signal::SIGALRM, &action) }
        .map_err(|e| PagerError::SignalSetup(format!("installing SIGALRM handler: {e}")))?;
    Ok(())
}

/// `nix` has no safe wrapper for `setitimer`; this is a thin, direct use
/// of `libc`, matching `virtualmem.c`'s own `setitimer(ITIMER_REAL, ...)`
/// call.
fn start_timer() -> Result<(), PagerError> {
    let interval = libc::timeval {
        tv_sec: crate::config::TIMESLICE_SEC,
        tv_usec: crate::config::TIMESLICE_USEC,
    };
    let timer = libc::itimerval {
        it_interval: interval,
        it_value: interval,
    };
    let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(PagerError::SignalSetup(format!(
            "setitimer failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

extern "C" fn sigsegv_handler(
    _signum: libc::c_int,
    info: *mut libc::siginfo_t,
    _ucontext: *mut c_void,
) {
    let addr = unsafe { (*info).si_addr() } as usize;

    let outcome = with_pager(|pager| pager.resolve_fault(addr));
    match outcome {
        Some(Ok(())) => {}
        Some(Err(e)) => crate::error::fatal(e),
        None => crate::error::fatal(PagerError::Invariant(
            "SIGSEGV delivered with no pager installed",
        )),
    }
}

extern "C" fn sigalrm_handler(
    _signum: libc::c_int,
    _info: *mut libc::siginfo_t,
    _ucontext: *mut c_void,
) {
    with_pager(|pager| pager.timer_tick());
}
