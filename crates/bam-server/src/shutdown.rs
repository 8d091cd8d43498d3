//! Two-stage shutdown on interrupt signals
//!
//! The first SIGINT/SIGTERM starts the graceful sequence; any later one
//! exits the process immediately.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What an interrupt means given the signals already seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// First interrupt: stop everything in order
    Graceful,
    /// Interrupt during the graceful sequence: exit now
    Force,
}

/// Tracks interrupts and announces the start of the graceful sequence
#[derive(Debug, Default)]
pub struct ShutdownSequencer {
    interrupted: AtomicBool,
    graceful: CancellationToken,
}

impl ShutdownSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interrupt
    pub fn interrupt(&self) -> Interrupt {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            Interrupt::Force
        } else {
            self.graceful.cancel();
            Interrupt::Graceful
        }
    }

    /// Fires when the graceful sequence should begin
    pub fn graceful(&self) -> CancellationToken {
        self.graceful.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Feed SIGINT/SIGTERM into `sequencer`, exiting on the second one
pub fn watch_signals(sequencer: Arc<ShutdownSequencer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut terminate =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    tracing::warn!("Unable to listen for SIGTERM: {}", e);
                    None
                }
            };

        loop {
            #[cfg(unix)]
            let terminated = async {
                match terminate.as_mut() {
                    Some(signal) => {
                        signal.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            #[cfg(not(unix))]
            let terminated = std::future::pending::<()>();

            let signal = tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::warn!("Unable to listen for Ctrl+C: {}", e);
                        return;
                    }
                    "Ctrl+C"
                }
                _ = terminated => "SIGTERM",
            };

            match sequencer.interrupt() {
                Interrupt::Graceful => {
                    tracing::info!("Received {}, shutting down (repeat to force)", signal)
                }
                Interrupt::Force => {
                    tracing::warn!("Received {} again, exiting immediately", signal);
                    std::process::exit(1);
                }
            }
        }
    })
}

/// Run one shutdown step, logging its failure instead of propagating it
pub async fn step<F, E>(name: &str, fut: F)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    tracing::debug!("Shutdown: stopping {}", name);
    if let Err(e) = fut.await {
        tracing::warn!("Shutdown: {} failed to stop: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_first_interrupt_graceful_then_force() {
        let sequencer = ShutdownSequencer::new();
        let graceful = sequencer.graceful();
        assert!(!sequencer.is_shutting_down());
        assert!(!graceful.is_cancelled());

        assert_eq!(sequencer.interrupt(), Interrupt::Graceful);
        assert!(sequencer.is_shutting_down());
        assert!(graceful.is_cancelled());

        assert_eq!(sequencer.interrupt(), Interrupt::Force);
        assert_eq!(sequencer.interrupt(), Interrupt::Force);
    }

    #[tokio::test]
    async fn test_step_continues_after_failure() {
        let ran = AtomicUsize::new(0);

        step("first", async {
            ran.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("boom")
        })
        .await;
        step("second", async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}
