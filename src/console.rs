//! Human-readable status output.
//!
//! The reporter and the shutdown coordinator both write whole lines here.
//! A line is written under one lock so concurrent writers never interleave.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared line-oriented output sink.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    /// Console writing to any sink.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    /// Console writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one line. Output errors are ignored; status lines are best effort.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_fmt(args);
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }

    /// Write an empty line.
    pub fn blank(&self) {
        self.line(format_args!(""));
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
