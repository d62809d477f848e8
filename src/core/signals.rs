//! Named signals with ordered callbacks.
//!
//! A [`SignalBus`] lets deploy code announce lifecycle steps without knowing
//! who listens. Release operations are wrapped with [`SignalBus::register`],
//! which fires `pre_<operation>` before the body and `post_<operation>` after
//! it:
//!
//! ```
//! use rollout::signals::{SignalBus, operations};
//!
//! let mut bus = SignalBus::new();
//! bus.on("pre_activate_release", || {
//!     println!("about to switch current");
//!     Ok(())
//! });
//! let value = bus.register(operations::ACTIVATE_RELEASE, || Ok(42)).unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! Emission is synchronous and fail-fast: the first callback returning an
//! error stops the remaining callbacks of that emission and the error is
//! returned to the emitter.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A zero-argument signal handler.
pub type Callback<'a> = Box<dyn Fn() -> Result<()> + 'a>;

/// Operation tags used for the pre/post signals of built-in operations.
pub mod operations {
    pub const CREATE_RELEASE: &str = "create_release";
    pub const LINK_SHARED_FILES: &str = "link_shared_files";
    pub const ACTIVATE_RELEASE: &str = "activate_release";
    pub const CLEAN_OLD_RELEASES: &str = "clean_old_releases";
    pub const INVALIDATE_LAST_RELEASE: &str = "invalidate_last_release";
    pub const UPDATE_VERSION_FILE: &str = "update_version_file";
    pub const ROLLBACK: &str = "rollback";
    pub const PRUNE_FAILED_RELEASES: &str = "prune_failed_releases";
    pub const DEPLOY: &str = "deploy";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub fn prefix(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

/// `pre_<operation>` / `post_<operation>`.
pub fn signal_name(phase: Phase, operation: &str) -> String {
    format!("{}_{}", phase.prefix(), operation)
}

#[derive(Default)]
pub struct SignalBus<'a> {
    callbacks: HashMap<String, Vec<Callback<'a>>>,
}

impl<'a> SignalBus<'a> {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
        }
    }

    /// Append a callback for `signal`. The same callback may be added more
    /// than once and then runs once per registration.
    pub fn on<F>(&mut self, signal: impl Into<String>, callback: F)
    where
        F: Fn() -> Result<()> + 'a,
    {
        self.callbacks
            .entry(signal.into())
            .or_default()
            .push(Box::new(callback));
    }

    /// Run every callback registered for `signal`, in registration order.
    pub fn emit(&self, signal: &str) -> Result<()> {
        let Some(callbacks) = self.callbacks.get(signal) else {
            return Ok(());
        };

        log_status!("signal", "{} ({} callbacks)", signal, callbacks.len());

        for callback in callbacks {
            callback().map_err(|e| {
                if e.code == crate::error::ErrorCode::SignalCallbackFailed {
                    e
                } else {
                    Error::signal_callback_failed(signal, e)
                }
            })?;
        }

        Ok(())
    }

    /// Wrap `body` with `pre_<operation>` and `post_<operation>` emissions.
    ///
    /// The body's value is returned unchanged. A failing pre-callback keeps
    /// the body from running; a failing body skips the post signal.
    pub fn register<T, F>(&self, operation: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.emit(&signal_name(Phase::Pre, operation))?;
        let value = body()?;
        self.emit(&signal_name(Phase::Post, operation))?;
        Ok(value)
    }

    pub fn subscribers(&self, signal: &str) -> usize {
        self.callbacks.get(signal).map_or(0, Vec::len)
    }

    /// Signals that currently have at least one callback, sorted.
    pub fn signal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .callbacks
            .iter()
            .filter(|(_, callbacks)| !callbacks.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn emit_without_subscribers_is_noop() {
        let bus = SignalBus::new();
        assert!(bus.emit("pre_nothing").is_ok());
        assert_eq!(bus.subscribers("pre_nothing"), 0);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let log = RefCell::new(Vec::new());
        let mut bus = SignalBus::new();
        bus.on("pre_deploy", || {
            log.borrow_mut().push("first");
            Ok(())
        });
        bus.on("pre_deploy", || {
            log.borrow_mut().push("second");
            Ok(())
        });

        bus.emit("pre_deploy").unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn same_callback_registered_twice_runs_twice() {
        let count = RefCell::new(0);
        let bump = || {
            *count.borrow_mut() += 1;
            Ok(())
        };
        let mut bus = SignalBus::new();
        bus.on("post_deploy", bump);
        bus.on("post_deploy", bump);

        bus.emit("post_deploy").unwrap();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(bus.subscribers("post_deploy"), 2);
    }

    #[test]
    fn register_wraps_body_with_pre_and_post() {
        let log = RefCell::new(Vec::new());
        let mut bus = SignalBus::new();
        bus.on("pre_deploy", || {
            log.borrow_mut().push("pre-1".to_string());
            Ok(())
        });
        bus.on("pre_deploy", || {
            log.borrow_mut().push("pre-2".to_string());
            Ok(())
        });
        bus.on("post_deploy", || {
            log.borrow_mut().push("post".to_string());
            Ok(())
        });

        let value = bus
            .register(operations::DEPLOY, || {
                log.borrow_mut().push("body".to_string());
                Ok("done")
            })
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(*log.borrow(), vec!["pre-1", "pre-2", "body", "post"]);
    }

    #[test]
    fn failing_callback_stops_emission() {
        let log = RefCell::new(Vec::new());
        let mut bus = SignalBus::new();
        bus.on("pre_deploy", || Err(Error::internal_unexpected("hook exploded")));
        bus.on("pre_deploy", || {
            log.borrow_mut().push("unreachable");
            Ok(())
        });

        let err = bus.emit("pre_deploy").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SignalCallbackFailed);
        assert_eq!(err.details["signal"], "pre_deploy");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failing_pre_signal_skips_body() {
        let ran = RefCell::new(false);
        let mut bus = SignalBus::new();
        bus.on("pre_activate_release", || {
            Err(Error::internal_unexpected("no"))
        });

        let result = bus.register(operations::ACTIVATE_RELEASE, || {
            *ran.borrow_mut() = true;
            Ok(())
        });

        assert!(result.is_err());
        assert!(!*ran.borrow());
    }

    #[test]
    fn failing_body_skips_post_signal() {
        let post_ran = RefCell::new(false);
        let mut bus = SignalBus::new();
        bus.on("post_create_release", || {
            *post_ran.borrow_mut() = true;
            Ok(())
        });

        let result: Result<()> = bus.register(operations::CREATE_RELEASE, || {
            Err(Error::internal_unexpected("extract failed"))
        });

        assert_eq!(
            result.unwrap_err().code,
            crate::error::ErrorCode::InternalUnexpected
        );
        assert!(!*post_ran.borrow());
    }

    #[test]
    fn signal_names_lists_hooked_signals() {
        let mut bus = SignalBus::new();
        bus.on("post_deploy", || Ok(()));
        bus.on("pre_deploy", || Ok(()));
        assert_eq!(bus.signal_names(), vec!["post_deploy", "pre_deploy"]);
        assert_eq!(signal_name(Phase::Pre, "deploy"), "pre_deploy");
        assert_eq!(signal_name(Phase::Post, "rollback"), "post_rollback");
    }
}
