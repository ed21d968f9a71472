//! Termination and reload hooks.
//!
//! A [`SignalManager`] is created once by the application and shared by
//! reference (or `Arc`) with whatever needs to register hooks. Hooks may be
//! registered at any time, including before [`SignalManager::listen`] installs
//! the OS listeners.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

/// A callback run when a signal is delivered.
pub type Hook = Box<dyn Fn() + Send + Sync>;

/// Handle returned on registration, used to remove the hook again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Termination: after these hooks run, the process exits.
    Interrupt,
    /// Reload: hooks run and the process carries on.
    Reload,
}

/// Owns the interrupt and reload hook lists.
///
/// Running hooks takes a read lock, so several runners may execute hooks at
/// the same time; registration and removal take the write lock.
#[derive(Default)]
pub struct SignalManager {
    next_id: AtomicU64,
    interrupt: RwLock<Vec<(HookId, Hook)>>,
    reload: RwLock<Vec<(HookId, Hook)>>,
}

impl SignalManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn hooks(&self, kind: HookKind) -> &RwLock<Vec<(HookId, Hook)>> {
        match kind {
            HookKind::Interrupt => &self.interrupt,
            HookKind::Reload => &self.reload,
        }
    }

    /// Register a hook to run before the process exits on a termination signal.
    pub fn on_interrupt(&self, hook: impl Fn() + Send + Sync + 'static) -> HookId {
        self.add_hook(HookKind::Interrupt, Box::new(hook))
    }

    /// Register a hook to run on reload.
    pub fn on_reload(&self, hook: impl Fn() + Send + Sync + 'static) -> HookId {
        self.add_hook(HookKind::Reload, Box::new(hook))
    }

    fn add_hook(&self, kind: HookKind, hook: Hook) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks(kind)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, hook));
        id
    }

    /// Remove a previously registered hook. Returns whether it was found.
    pub fn remove_hook(&self, id: HookId) -> bool {
        for kind in [HookKind::Interrupt, HookKind::Reload] {
            let mut hooks = self
                .hooks(kind)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let before = hooks.len();
            hooks.retain(|(hook_id, _)| *hook_id != id);
            if hooks.len() != before {
                return true;
            }
        }
        false
    }

    pub fn hook_count(&self, kind: HookKind) -> usize {
        self.hooks(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every hook of `kind` in registration order. Returns how many ran.
    ///
    /// This never exits the process, whatever the kind.
    pub fn run_hooks(&self, kind: HookKind) -> usize {
        let hooks = self
            .hooks(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, hook) in hooks.iter() {
            tracing::info!(hook = id.0, ?kind, "running signal hook");
            hook();
        }
        hooks.len()
    }

    /// Run the reload hooks.
    pub fn trigger_reload(&self) -> usize {
        self.run_hooks(HookKind::Reload)
    }

    /// Install the process signal listeners.
    ///
    /// SIGINT, SIGTERM and SIGALRM run the interrupt hooks and exit the
    /// process with status 0. SIGHUP runs the reload hooks and the process
    /// keeps going. Can only be installed once per process.
    pub fn listen(self: &Arc<Self>) -> Result<()> {
        let manager = Arc::clone(self);
        ctrlc::set_handler(move || manager.shutdown("SIGINT"))
            .context("failed to install interrupt handler")?;

        #[cfg(unix)]
        self.listen_unix()?;
        Ok(())
    }

    #[cfg(unix)]
    fn listen_unix(self: &Arc<Self>) -> Result<()> {
        use signal_hook::consts::signal::{SIGALRM, SIGHUP, SIGTERM};
        use signal_hook::iterator::Signals;
        use signal_hook::low_level::signal_name;

        let mut signals =
            Signals::new([SIGHUP, SIGTERM, SIGALRM]).context("failed to register signals")?;
        let manager = Arc::clone(self);
        thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if signal == SIGHUP {
                        let ran = manager.run_hooks(HookKind::Reload);
                        tracing::info!(hooks = ran, "reload signal received");
                    } else {
                        manager.shutdown(signal_name(signal).unwrap_or("unknown"));
                    }
                }
            })
            .context("failed to spawn signal thread")?;
        Ok(())
    }

    fn shutdown(&self, signal: &str) {
        let ran = self.run_hooks(HookKind::Interrupt);
        tracing::info!(hooks = ran, signal, "termination signal received, exiting");
        std::process::exit(0);
    }
}
