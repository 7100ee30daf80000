//! Progress printing for long-running loops over subjects.

use std::io::{self, Write};

/// Clears from the cursor back to the start of the line.
const CLEAR_LINE: &str = "\x1b[1K";

/// Print `text` and return the cursor to the start of the line, so the next
/// call overwrites it in place.
pub fn print_bis(text: &str) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    // Console output is best-effort.
    let _ = write_bis(&mut out, text).and_then(|_| out.flush());
}

/// Print `text` on a fresh line, leaving any in-place progress line intact.
pub fn print_ter(text: &str) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = write_ter(&mut out, text);
}

pub fn write_bis<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    write!(out, "{text}{CLEAR_LINE}\r")
}

pub fn write_ter<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "\n{text}")
}
