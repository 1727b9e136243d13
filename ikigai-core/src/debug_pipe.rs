//! Line-buffered fan-in of provider trace streams into scrollback (spec §4.17).
//!
//! The source owns real `pipe(2)` fds registered into the REPL's `select()`
//! fd_set; `ikigai-core` runs its event loop as a single `tokio::select!`
//! instead (SPEC_FULL §3.2), so each pipe becomes an
//! `mpsc::UnboundedReceiver<Vec<u8>>` drained alongside the other channels —
//! the write end a provider adapter or tool worker holds is the matching
//! `Sender`. Registration order is preserved by iterating `pipes` in push
//! order, the behavior `original_source/tests/unit/debug_pipe/manager_test.c`
//! pins down (SPEC_FULL §2).

use tokio::sync::mpsc;

use crate::scrollback::Scrollback;

/// The write end a pipe owner (a provider adapter, a tool worker) holds.
pub type DebugPipeWriter = mpsc::UnboundedSender<Vec<u8>>;

struct Pipe {
    prefix: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer: Vec<u8>,
}

/// Owns a growable array of `{prefix, read end, buffer}` (spec §4.17).
#[derive(Default)]
pub struct DebugPipeManager {
    pipes: Vec<Pipe>,
}

impl DebugPipeManager {
    pub fn new() -> Self {
        DebugPipeManager::default()
    }

    /// Creates one pipe tagged `prefix`, returning the write end for the
    /// owner to clone into its own task.
    pub fn add_pipe(&mut self, prefix: impl Into<String>) -> DebugPipeWriter {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pipes.push(Pipe {
            prefix: prefix.into(),
            rx,
            buffer: Vec::new(),
        });
        tx
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Drains every pipe with pending bytes, in registration order, and
    /// either appends complete lines (prefixed, each followed by a blank
    /// line) to `scrollback` when `debug_enabled`, or discards them
    /// otherwise (spec §4.17 `handle_ready`).
    ///
    /// Non-blocking: uses `try_recv` so a tick with nothing ready returns
    /// immediately, matching the source's poll-then-continue shape.
    pub fn drain_ready(&mut self, scrollback: &mut Scrollback, debug_enabled: bool) {
        for pipe in &mut self.pipes {
            loop {
                match pipe.rx.try_recv() {
                    Ok(mut bytes) => pipe.buffer.append(&mut bytes),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => break,
                }
            }
            while let Some(pos) = pipe.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pipe.buffer.drain(..=pos).collect();
                let line = &line[..line.len() - 1]; // drop the newline itself
                if debug_enabled {
                    let tagged = format!("{} {}", pipe.prefix, String::from_utf8_lossy(line));
                    scrollback.append_line(tagged.as_bytes());
                    scrollback.append_line(b"");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_until_newline_then_emits_tagged_line() {
        let mut mgr = DebugPipeManager::new();
        let tx = mgr.add_pipe("[tool]");
        tx.send(b"hello ".to_vec()).unwrap();
        tx.send(b"world\n".to_vec()).unwrap();

        let mut sb = Scrollback::new();
        mgr.drain_ready(&mut sb, true);

        assert_eq!(sb.get_line_count(), 2);
        assert_eq!(sb.get_line_text(0).unwrap(), b"[tool] hello world");
        assert_eq!(sb.get_line_text(1).unwrap(), b"");
    }

    #[test]
    fn disabled_debug_drops_bytes_silently() {
        let mut mgr = DebugPipeManager::new();
        let tx = mgr.add_pipe("[tool]");
        tx.send(b"line one\n".to_vec()).unwrap();

        let mut sb = Scrollback::new();
        mgr.drain_ready(&mut sb, false);

        assert_eq!(sb.get_line_count(), 0);
    }

    #[test]
    fn multiple_pipes_drain_in_registration_order() {
        let mut mgr = DebugPipeManager::new();
        let tx_a = mgr.add_pipe("[a]");
        let tx_b = mgr.add_pipe("[b]");
        tx_b.send(b"from b\n".to_vec()).unwrap();
        tx_a.send(b"from a\n".to_vec()).unwrap();

        let mut sb = Scrollback::new();
        mgr.drain_ready(&mut sb, true);

        assert_eq!(sb.get_line_text(0).unwrap(), b"[a] from a");
        assert_eq!(sb.get_line_text(2).unwrap(), b"[b] from b");
    }

    #[test]
    fn partial_line_without_newline_is_not_emitted_yet() {
        let mut mgr = DebugPipeManager::new();
        let tx = mgr.add_pipe("[x]");
        tx.send(b"no newline yet".to_vec()).unwrap();

        let mut sb = Scrollback::new();
        mgr.drain_ready(&mut sb, true);
        assert_eq!(sb.get_line_count(), 0);
    }
}
