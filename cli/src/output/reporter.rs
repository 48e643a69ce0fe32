//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.
//!
//! Each `step()` opens a spinner on a TTY. The next `step()` or `success()`
//! closes it with a checkmark; `abort()` closes it with a cross. Off a TTY
//! the same events are printed as plain lines.

use std::sync::{Mutex, PoisonError};

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    current: Mutex<Option<(ProgressBar, String)>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            current: Mutex::new(None),
        }
    }

    /// Close any open spinner as failed.
    pub fn abort(&self) {
        if let Some((pb, msg)) = self.take() {
            progress::finish_error(&pb, &msg);
        }
    }

    fn take(&self) -> Option<(ProgressBar, String)> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn close_ok(&self) {
        if let Some((pb, msg)) = self.take() {
            progress::finish_ok(&pb, &msg);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.close_ok();
        if self.ctx.show_progress() {
            let pb = progress::spinner(message);
            *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
                Some((pb, message.to_string()));
        } else {
            println!("  {} {message}", "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.close_ok();
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some((pb, _)) => pb.suspend(|| self.ctx.warn(message)),
            None => self.ctx.warn(message),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}
