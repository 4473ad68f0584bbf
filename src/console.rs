//! Line input for configuration page responses.
//!
//! A line that cannot be read (for example invalid UTF-8) is logged and
//! skipped. Input is only given up on at end of stream or after several
//! consecutive read errors.
use log::{error, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Consecutive read errors after which input is considered gone.
pub const MAX_READ_ERRORS: u32 = 3;

pub struct ConsoleInput<R> {
    lines: Lines<R>,
    errors: u32,
}

impl<R: AsyncBufRead + Unpin> ConsoleInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            errors: 0,
        }
    }

    /// Next readable line, `None` once input is closed.
    ///
    /// Cancel safe, so it can be used as a `tokio::select!` branch.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    self.errors = 0;
                    return Some(line);
                }
                Ok(None) => return None,
                Err(e) => {
                    error!("Error reading stdin: {e}");
                    self.errors += 1;
                    if self.errors >= MAX_READ_ERRORS {
                        warn!("Giving up on stdin after {} read errors", self.errors);
                        return None;
                    }
                }
            }
        }
    }
}
