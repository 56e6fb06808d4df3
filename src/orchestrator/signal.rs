//! Termination signals that trigger a graceful shutdown.

use std::fmt;

use crate::types::Result;

/// Which signal ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Hangup,
    Terminate,
    Quit,
    Trap,
    Abort,
    CtrlC,
}

impl TerminationSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Hangup => "SIGHUP",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Trap => "SIGTRAP",
            TerminationSignal::Abort => "SIGABRT",
            TerminationSignal::CtrlC => "ctrl-c",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wait for the first termination signal.
///
/// SIGILL cannot be handled through tokio and is left to its default action.
#[cfg(unix)]
pub async fn wait_for_termination() -> Result<TerminationSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    // same numbers on Linux and the BSDs
    const SIGTRAP: i32 = 5;
    const SIGABRT: i32 = 6;

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut trap = signal(SignalKind::from_raw(SIGTRAP))?;
    let mut abort = signal(SignalKind::from_raw(SIGABRT))?;

    let received = tokio::select! {
        _ = interrupt.recv() => TerminationSignal::Interrupt,
        _ = hangup.recv() => TerminationSignal::Hangup,
        _ = terminate.recv() => TerminationSignal::Terminate,
        _ = quit.recv() => TerminationSignal::Quit,
        _ = trap.recv() => TerminationSignal::Trap,
        _ = abort.recv() => TerminationSignal::Abort,
    };
    Ok(received)
}

#[cfg(not(unix))]
pub async fn wait_for_termination() -> Result<TerminationSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(TerminationSignal::CtrlC)
}
