//! Binary entry point: binds the listening socket and hands each accepted
//! connection to its own thread.
//!
//! Supports an optional privilege-shedding step (`chroot` plus dropping to
//! an unprivileged uid/gid via environment variables) before accepting
//! connections, for operators who run this as root to bind a low port.

use std::env;
use std::io;
use std::net::TcpListener;
use std::process;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;
use std::thread;

use httpd::log::{self, Level};
use httpd::{config, server, unix};

/// Points at the live `run_flag`'s inner `AtomicBool` so the SIGINT handler
/// -- which, being a C function pointer, can't capture anything -- has
/// somewhere to signal shutdown. Set once in `main` before the handler is
/// installed; null until then.
static RUN_FLAG_PTR: AtomicPtr<AtomicBool> = AtomicPtr::new(std::ptr::null_mut());

extern "C" fn on_sigint(_signum: libc::c_int) {
    let ptr = RUN_FLAG_PTR.load(Ordering::SeqCst);
    if !ptr.is_null() {
        unsafe { (*ptr).store(false, Ordering::SeqCst) };
    }
}

fn main() {
    // Only chroot if a root directory is provided; running without one is
    // fine for local testing.
    if let Some(root) = env::args().nth(1) {
        if env::set_current_dir(&root).is_err() {
            process::exit(20);
        }
        if unix::chroot(root.as_bytes()).is_err() {
            process::exit(30);
        }
    }

    with_env_var("GID", set_all_groups);
    with_env_var("UID", unix::setuid);

    let listener = match TcpListener::bind(("0.0.0.0", config::LISTEN_PORT)) {
        Ok(l) => l,
        Err(e) => {
            log::log(Level::Crit, format_args!("failed to bind port {}: {}", config::LISTEN_PORT, e));
            process::exit(1);
        }
    };

    let run_flag = Arc::new(AtomicBool::new(true));
    RUN_FLAG_PTR.store(Arc::as_ptr(&run_flag) as *mut AtomicBool, Ordering::SeqCst);
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }

    log::log(Level::Info, format_args!("listening on port {}", config::LISTEN_PORT));

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                log::log(Level::Warn, format_args!("accept failed: {}", e));
                continue;
            }
        };

        let remote = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let run_flag = run_flag.clone();
        thread::spawn(move || {
            server::handle_connection(stream, remote, run_flag);
        });
    }
}

/// Paranoid version of `setgid` which also nukes supplemental groups.
fn set_all_groups(gid: libc::gid_t) -> io::Result<()> {
    unix::setgroups(&[gid]).and_then(|_| unix::setgid(gid))
}

fn with_env_var<V: FromStr>(var: &str, f: fn(V) -> io::Result<()>) {
    if let Ok(val_str) = env::var(var) {
        log::log(Level::Info, format_args!("{} = {}", var, val_str));
        if let Ok(val) = FromStr::from_str(&val_str) {
            if f(val).is_err() {
                process::exit(30)
            }
        } else {
            process::exit(30)
        }
    }
}
