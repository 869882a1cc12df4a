//! Process-exit cleanup
//!
//! Releasing kernel-visible segments must survive both normal exit and
//! termination signals, and must run exactly once. The hook is installed the
//! first time the global manager is used.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use log::info;

static INSTALL: Once = Once::new();
static CLEANED: AtomicBool = AtomicBool::new(false);

/// Register the atexit and signal hooks, once per process
pub(crate) fn install() {
    INSTALL.call_once(|| unsafe {
        libc::atexit(run_at_exit);
        let handler: extern "C" fn(libc::c_int) = run_on_signal;
        for sig in [libc::SIGHUP, libc::SIGINT, libc::SIGTERM] {
            let prev = libc::signal(sig, handler as libc::sighandler_t);
            if prev != libc::SIG_DFL && prev != libc::SIG_ERR {
                // The host already handles this signal; leave its handler in
                // place and rely on atexit.
                libc::signal(sig, prev);
            }
        }
    });
}

extern "C" fn run_at_exit() {
    run();
}

extern "C" fn run_on_signal(sig: libc::c_int) {
    run();
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

fn run() {
    if CLEANED.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(manager) = crate::manager::global_if_init() {
        let destroyed = manager.detach_all();
        if destroyed > 0 {
            info!("shm segments destroyed: {destroyed}");
        }
    }
}
