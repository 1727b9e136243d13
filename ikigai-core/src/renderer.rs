//! ANSI composite-frame writer (spec §4.6).
//!
//! Emits one write burst per frame: a full clear + home, the scrollback's
//! visible rows, and (when the input area is visible) a separator line, the
//! input buffer's rows, and a single hardware cursor placement. Cursor
//! visibility is the last byte written, so a partial burst never leaves the
//! cursor blinking over stale content.

use std::io::{self, Write};

use crate::scrollback::Scrollback;
use crate::width;

const CLEAR_AND_HOME: &str = "\x1b[2J\x1b[H";
const SHOW_CURSOR: &str = "\x1b[?25h";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SEPARATOR_CHAR: char = '─';

pub struct Frame {
    pub scroll_from_row: usize,
    pub visible_rows_scrollback: usize,
    pub input_bytes: Vec<u8>,
    pub input_cursor_byte: usize,
    pub render_input_buffer: bool,
    pub terminal_width: usize,
}

/// Computes the `(row, col)` screen position (0-based) of `cursor_byte` within
/// `text`, wrapping at `width` using the same SGR/wide/combining cell rules as
/// the scrollback (spec §4.6 "Cursor-position calculation").
pub fn cursor_screen_position(text: &str, cursor_byte: usize, width: usize) -> (usize, usize) {
    if !text.is_char_boundary(cursor_byte.min(text.len())) {
        return (0, 0);
    }
    let width = width.max(1);
    let mut row = 0usize;
    let mut line_start_byte = 0usize;
    for line in text.split('\n') {
        let line_end_byte = line_start_byte + line.len();
        if cursor_byte <= line_end_byte {
            let rows = width::wrap_logical_line(line, width);
            let rel = cursor_byte - line_start_byte;
            for r in &rows {
                if rel <= r.end {
                    let slice = &line[r.start..rel.max(r.start)];
                    let col = width::display_width(slice);
                    return (row, col);
                }
                row += 1;
            }
            let last = rows.last().unwrap();
            let col = width::display_width(&line[last.start..]);
            return (row.saturating_sub(1), col);
        }
        let rows = width::wrap_logical_line(line, width).len();
        row += rows;
        line_start_byte = line_end_byte + 1;
    }
    (row, 0)
}

pub struct Renderer;

impl Renderer {
    /// Writes the full composite frame to `out` in a single burst (spec §4.6).
    pub fn render_combined<W: Write>(out: &mut W, scrollback: &Scrollback, frame: &Frame) -> io::Result<()> {
        let mut buf = String::new();
        buf.push_str(CLEAR_AND_HOME);

        for row in 0..frame.visible_rows_scrollback {
            let physical_row = frame.scroll_from_row + row;
            match scrollback.find_logical_line_at_physical_row(physical_row) {
                Some((line_idx, row_offset)) => {
                    let text = scrollback
                        .get_line_text(line_idx)
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    let rows = width::wrap_logical_line(&text, frame.terminal_width.max(1));
                    if let Some(wrap_row) = rows.get(row_offset) {
                        buf.push_str(&text[wrap_row.start..wrap_row.end]);
                    }
                }
                None => {}
            }
            buf.push_str("\r\n");
        }

        if frame.render_input_buffer {
            let sep: String = SEPARATOR_CHAR.to_string().repeat(frame.terminal_width.max(1));
            buf.push_str(&sep);
            buf.push_str("\r\n");

            let input_text = String::from_utf8_lossy(&frame.input_bytes).into_owned();
            for (i, line) in input_text.split('\n').enumerate() {
                if i > 0 {
                    buf.push_str("\r\n");
                }
                buf.push_str(line);
            }

            let (cur_row, cur_col) = cursor_screen_position(&input_text, frame.input_cursor_byte, frame.terminal_width.max(1));
            let screen_row = frame.visible_rows_scrollback + 1 + cur_row;
            buf.push_str(&format!("\x1b[{};{}H", screen_row + 1, cur_col + 1));
            buf.push_str(SHOW_CURSOR);
        } else {
            buf.push_str(HIDE_CURSOR);
        }

        out.write_all(buf.as_bytes())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_burst_contains_exactly_one_clear() {
        let mut sb = Scrollback::new();
        sb.append_line(b"hello");
        sb.ensure_layout(80);
        let frame = Frame {
            scroll_from_row: 0,
            visible_rows_scrollback: 1,
            input_bytes: b"hi".to_vec(),
            input_cursor_byte: 2,
            render_input_buffer: true,
            terminal_width: 80,
        };
        let mut out = Vec::new();
        Renderer::render_combined(&mut out, &sb, &frame).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s.matches("\x1b[2J").count(), 1);
        assert!(s.contains("hello"));
        assert!(s.contains(SHOW_CURSOR));
    }

    #[test]
    fn hidden_input_hides_cursor_and_omits_input_area() {
        let mut sb = Scrollback::new();
        sb.append_line(b"hello");
        sb.ensure_layout(80);
        let frame = Frame {
            scroll_from_row: 0,
            visible_rows_scrollback: 1,
            input_bytes: vec![],
            input_cursor_byte: 0,
            render_input_buffer: false,
            terminal_width: 80,
        };
        let mut out = Vec::new();
        Renderer::render_combined(&mut out, &sb, &frame).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains(HIDE_CURSOR));
        assert!(!s.contains(SEPARATOR_CHAR));
    }

    #[test]
    fn cursor_position_accounts_for_wide_and_sgr_cells() {
        let (row, col) = cursor_screen_position("hello", 5, 80);
        assert_eq!((row, col), (0, 5));
        let (row, col) = cursor_screen_position("line1\nline2", 8, 80);
        assert_eq!((row, col), (1, 2));
    }

    #[test]
    fn invalid_utf8_boundary_is_reported_as_zero() {
        let (row, col) = cursor_screen_position("héllo", 2, 80);
        // byte 2 lands inside the 2-byte 'é'; not a char boundary.
        assert_eq!((row, col), (0, 0));
    }
}
