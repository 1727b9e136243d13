//! Raw-mode terminal lifecycle: `/dev/tty` access, alt-screen, size queries,
//! and the Kitty CSI-u capability probe (spec §4.1).
//!
//! Raw-mode/alt-screen/cursor-visibility primitives use `crossterm` (already a
//! dependency of the teacher's `cli` crate); the byte-level input parser
//! (spec §4.2) reads directly from the `/dev/tty` file handle opened here,
//! independent of crossterm's own event decoder (spec §9 "async/cooperative
//! event loop translation").

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;

use crossterm::terminal::{self, supports_keyboard_enhancement, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};

use crate::error::{Category, Error, Result};

pub struct Terminal {
    tty_read: File,
    tty_write: File,
    raw_mode_enabled: bool,
    pub csi_u_supported: bool,
}

impl Terminal {
    /// Opens `/dev/tty`, enters raw mode and the alternate screen, and probes
    /// for CSI-u keyboard-enhancement support (spec §4.1).
    pub fn open() -> Result<Self> {
        let tty_read = OpenOptions::new()
            .read(true)
            .open("/dev/tty")
            .map_err(|e| Error::new(Category::Io, format!("open /dev/tty: {}", e)))?;
        let tty_write = OpenOptions::new()
            .write(true)
            .open("/dev/tty")
            .map_err(|e| Error::new(Category::Io, format!("open /dev/tty (write): {}", e)))?;

        terminal::enable_raw_mode().map_err(|e| Error::new(Category::Io, format!("enable_raw_mode: {}", e)))?;

        let mut term = Terminal {
            tty_read,
            tty_write,
            raw_mode_enabled: true,
            csi_u_supported: false,
        };

        if let Err(e) = execute!(term.tty_write, EnterAlternateScreen) {
            let _ = terminal::disable_raw_mode();
            return Err(Error::new(Category::Io, format!("enter alternate screen: {}", e)));
        }

        // Best-effort: a probe failure must not abort startup, it only
        // disables the CSI-u progressive enhancement (spec §4.1).
        term.csi_u_supported = supports_keyboard_enhancement().unwrap_or(false);
        if term.csi_u_supported {
            let _ = queue!(
                term.tty_write,
                crossterm::event::PushKeyboardEnhancementFlags(
                    crossterm::event::KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                )
            );
            let _ = term.tty_write.flush();
        }

        Ok(term)
    }

    pub fn size(&self) -> Result<(u16, u16)> {
        terminal::size().map_err(|e| Error::new(Category::Io, format!("query size: {}", e)))
    }

    pub fn read_fd(&self) -> i32 {
        self.tty_read.as_raw_fd()
    }

    /// Duplicates the read-end fd for a dedicated blocking reader thread
    /// (spec §9 "async/cooperative event loop translation" — the blocking
    /// read lives off the event-loop thread, bridged back over a channel).
    pub fn try_clone_read(&self) -> Result<File> {
        self.tty_read
            .try_clone()
            .map_err(|e| Error::new(Category::Io, format!("clone tty read fd: {}", e)))
    }

    pub fn write_handle(&mut self) -> &mut File {
        &mut self.tty_write
    }
}

impl Drop for Terminal {
    /// Idempotent, NULL-tolerant cleanup: restores termios and leaves the
    /// alternate screen (spec §4.1, §9 "ownership via talloc" destructor note).
    fn drop(&mut self) {
        if self.csi_u_supported {
            let _ = queue!(self.tty_write, crossterm::event::PopKeyboardEnhancementFlags);
        }
        let _ = execute!(self.tty_write, cursor::Show, LeaveAlternateScreen);
        if self.raw_mode_enabled {
            let _ = terminal::disable_raw_mode();
            self.raw_mode_enabled = false;
        }
    }
}
