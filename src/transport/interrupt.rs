//! TR-012: Ctrl-C handling.
//!
//! The first interrupt sets the [`CancelFlag`]: the running child, which got
//! the same SIGINT from the terminal, is given its grace period to exit and
//! everything still queued is reported as interrupted. A second interrupt
//! kills the child. A third exits immediately.
//!
//! The handler is registered before [`install`] returns, so an interrupt
//! that lands while the first command is spawning is not lost.

use super::CancelFlag;

/// Exit status used when repeated interrupts force an exit.
const FORCED_EXIT: i32 = 130;

#[cfg(unix)]
type Interrupts = tokio::signal::unix::Signal;
#[cfg(windows)]
type Interrupts = tokio::signal::windows::CtrlC;

#[cfg(unix)]
fn listen() -> std::io::Result<Interrupts> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn listen() -> std::io::Result<Interrupts> {
    tokio::signal::windows::ctrl_c()
}

/// Start a background listener that cancels `flag` on Ctrl-C.
pub fn install(flag: CancelFlag) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build interrupt runtime: {}", e))?;

    let mut interrupts = {
        let _context = runtime.enter();
        listen().map_err(|e| format!("could not listen for Ctrl-C: {}", e))?
    };

    std::thread::Builder::new()
        .name("terrace-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let mut presses = 0u32;
                while interrupts.recv().await.is_some() {
                    presses += 1;
                    flag.cancel();
                    match presses {
                        1 => eprintln!(
                            "\nInterrupt received; waiting for the running command to stop \
                             (Ctrl-C again to kill it)."
                        ),
                        2 => eprintln!("\nKilling the running command (Ctrl-C again to exit now)."),
                        _ => std::process::exit(FORCED_EXIT),
                    }
                }
                tracing::warn!("Ctrl-C listener closed");
            });
        })
        .map_err(|e| format!("failed to spawn interrupt listener: {}", e))?;

    Ok(())
}
