//! Line buffer shared between a stream reader and its session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Accumulated output lines of one channel.
///
/// The reader appends and signals; the session registers interest with
/// [`ChannelOutput::notified`], enables it, and only then re-checks the
/// lines, so an append between check and wait is never missed.
#[derive(Debug, Default)]
pub struct ChannelOutput {
    lines: Mutex<Vec<String>>,
    new_chunk: Notify,
    closed: AtomicBool,
}

impl ChannelOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append normalized text, continuing the last line if it had no
    /// line break yet.
    pub fn append(&self, text: &str) {
        {
            let mut lines = self.lock();
            let mut start = 0;
            for end in memchr::memchr_iter(b'\n', text.as_bytes()) {
                push_piece(&mut lines, &text[start..end], start == 0);
                start = end + 1;
            }
            push_piece(&mut lines, &text[start..], start == 0);
        }
        if !self.is_closed() {
            self.new_chunk.notify_waiters();
        }
    }

    /// Run `f` with exclusive access to the lines.
    pub fn with_lines<R>(&self, f: impl FnOnce(&mut Vec<String>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Keep only the most recent line.
    pub fn keep_last_line(&self) {
        let mut lines = self.lock();
        let keep_from = lines.len().saturating_sub(1);
        lines.drain(..keep_from);
    }

    pub fn notified(&self) -> Notified<'_> {
        self.new_chunk.notified()
    }

    /// The stream ended; wake anyone waiting so they stop.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.new_chunk.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The first piece of a chunk continues the unfinished last line.
fn push_piece(lines: &mut Vec<String>, piece: &str, continues_last: bool) {
    match lines.last_mut() {
        Some(last) if continues_last => last.push_str(piece),
        _ => lines.push(piece.to_string()),
    }
}
