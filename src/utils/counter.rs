//! A simple counter for tracking processed scenes/commands.
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// Outcome of processing one unit of work (a scene, a command, an import line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Ok,
    Ignored,
}

/// A counter for tracking run-wide outcomes, printed at the end of a CLI
/// subcommand and from the `ctrlc` handler.
pub struct Counter {
    ok: AtomicUsize,
    ignored: AtomicUsize,
    error: AtomicUsize,
    warning: AtomicUsize,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            ok: AtomicUsize::new(0),
            ignored: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
            warning: AtomicUsize::new(0),
        }
    }

    pub fn inc_error(&self) {
        self.error.fetch_add(1, SeqCst);
    }

    pub fn inc_warning(&self) {
        self.warning.fetch_add(1, SeqCst);
    }

    pub fn inc(&self, result: WorkResult) {
        match result {
            WorkResult::Ok => {
                self.ok.fetch_add(1, SeqCst);
            }
            WorkResult::Ignored => {
                self.ignored.fetch_add(1, SeqCst);
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error.load(SeqCst) > 0
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OK: {}, Ignored: {}, Error: {}, Warning: {}",
            self.ok.load(SeqCst),
            self.ignored.load(SeqCst),
            self.error.load(SeqCst),
            self.warning.load(SeqCst),
        )
    }
}
