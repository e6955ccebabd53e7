//! Console capture for asserting on status output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use stream_client_app::Console;

/// Shared buffer behind a captured console.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    /// Number of periodic status lines written so far.
    pub fn status_lines(&self) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.starts_with('[') && line.contains("Sent:"))
            .count()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A console whose output can be inspected afterwards.
pub fn capture_console() -> (Console, CapturedOutput) {
    let output = CapturedOutput::default();
    (Console::new(output.clone()), output)
}
