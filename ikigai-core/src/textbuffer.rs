//! Gap-free mutable UTF-8 text buffer with a grapheme- and display-width-aware
//! cursor (spec §4.4).

use crate::width::{self, is_whitespace_char, is_word_char};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInfo {
    pub width: usize,
    pub physical_lines: usize,
    pub row_start_byte_offsets: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CharClass {
    Word,
    Whitespace,
    Other,
}

fn classify(c: char) -> CharClass {
    if is_whitespace_char(c) {
        CharClass::Whitespace
    } else if is_word_char(c) {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

fn line_start(bytes: &[u8], pos: usize) -> usize {
    bytes[..pos]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn line_end(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| pos + i)
        .unwrap_or(bytes.len())
}

fn count_graphemes(bytes: &[u8]) -> usize {
    std::str::from_utf8(bytes).unwrap_or("").graphemes(true).count()
}

#[derive(Debug, Default)]
pub struct TextBuffer {
    bytes: Vec<u8>,
    cursor_byte_offset: usize,
    cursor_grapheme_offset: usize,
    preferred_column: Option<usize>,
    layout_cache: Option<LayoutInfo>,
}

impl TextBuffer {
    pub fn new() -> Self {
        TextBuffer::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    pub fn cursor_byte_offset(&self) -> usize {
        self.cursor_byte_offset
    }

    pub fn cursor_grapheme_offset(&self) -> usize {
        self.cursor_grapheme_offset
    }

    fn invalidate_layout(&mut self) {
        self.layout_cache = None;
    }

    fn recompute_cursor_grapheme(&mut self) {
        self.cursor_grapheme_offset = count_graphemes(&self.bytes[..self.cursor_byte_offset]);
    }

    fn grapheme_boundaries(&self) -> Vec<usize> {
        let s = self.as_str();
        let mut v: Vec<usize> = s.grapheme_indices(true).map(|(i, _)| i).collect();
        v.push(s.len());
        v
    }

    fn prev_grapheme_boundary(&self, offset: usize) -> usize {
        self.grapheme_boundaries()
            .into_iter()
            .rev()
            .find(|&x| x < offset)
            .unwrap_or(0)
    }

    fn next_grapheme_boundary(&self, offset: usize) -> usize {
        self.grapheme_boundaries()
            .into_iter()
            .find(|&x| x > offset)
            .unwrap_or(self.bytes.len())
    }

    pub fn insert(&mut self, code_point: char) {
        let mut buf = [0u8; 4];
        let s = code_point.encode_utf8(&mut buf);
        let at = self.cursor_byte_offset;
        self.bytes.splice(at..at, s.as_bytes().iter().copied());
        self.cursor_byte_offset += s.len();
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn insert_newline(&mut self) {
        self.insert('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor_byte_offset == 0 {
            return;
        }
        let prev = self.prev_grapheme_boundary(self.cursor_byte_offset);
        self.bytes.drain(prev..self.cursor_byte_offset);
        self.cursor_byte_offset = prev;
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn delete(&mut self) {
        if self.cursor_byte_offset >= self.bytes.len() {
            return;
        }
        let next = self.next_grapheme_boundary(self.cursor_byte_offset);
        self.bytes.drain(self.cursor_byte_offset..next);
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn delete_word_backward(&mut self) {
        if self.cursor_byte_offset == 0 {
            return;
        }
        let s = std::str::from_utf8(&self.bytes[..self.cursor_byte_offset]).unwrap_or("");
        let chars: Vec<(usize, char)> = s.char_indices().collect();
        let mut i = chars.len();
        while i > 0 && is_whitespace_char(chars[i - 1].1) {
            i -= 1;
        }
        if i > 0 {
            let class = classify(chars[i - 1].1);
            while i > 0 && classify(chars[i - 1].1) == class {
                i -= 1;
            }
        }
        let new_cursor = if i == 0 { 0 } else { chars[i].0 };
        self.bytes.drain(new_cursor..self.cursor_byte_offset);
        self.cursor_byte_offset = new_cursor;
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn kill_to_line_end(&mut self) {
        let end = line_end(&self.bytes, self.cursor_byte_offset);
        if end > self.cursor_byte_offset {
            self.bytes.drain(self.cursor_byte_offset..end);
        }
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn kill_line(&mut self) {
        let ls = line_start(&self.bytes, self.cursor_byte_offset);
        let le = line_end(&self.bytes, self.cursor_byte_offset);
        if le < self.bytes.len() {
            self.bytes.drain(ls..=le);
            self.cursor_byte_offset = ls;
        } else if ls > 0 {
            self.bytes.drain(ls - 1..ls);
            self.cursor_byte_offset = ls - 1;
        }
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
        self.invalidate_layout();
    }

    pub fn cursor_left(&mut self) {
        self.cursor_byte_offset = self.prev_grapheme_boundary(self.cursor_byte_offset);
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
    }

    pub fn cursor_right(&mut self) {
        self.cursor_byte_offset = self.next_grapheme_boundary(self.cursor_byte_offset);
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
    }

    pub fn cursor_to_line_start(&mut self) {
        self.cursor_byte_offset = line_start(&self.bytes, self.cursor_byte_offset);
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
    }

    pub fn cursor_to_line_end(&mut self) {
        self.cursor_byte_offset = line_end(&self.bytes, self.cursor_byte_offset);
        self.recompute_cursor_grapheme();
        self.preferred_column = None;
    }

    fn column_of(&self, line_start_byte: usize, offset: usize) -> usize {
        count_graphemes(&self.bytes[line_start_byte..offset])
    }

    fn offset_for_column(&self, line_start_byte: usize, line_end_byte: usize, col: usize) -> usize {
        let line = std::str::from_utf8(&self.bytes[line_start_byte..line_end_byte]).unwrap_or("");
        let mut count = 0usize;
        for (idx, _) in line.grapheme_indices(true) {
            if count == col {
                return line_start_byte + idx;
            }
            count += 1;
        }
        line_end_byte
    }

    pub fn cursor_up(&mut self) {
        let cur_start = line_start(&self.bytes, self.cursor_byte_offset);
        if cur_start == 0 {
            return;
        }
        let col = self
            .preferred_column
            .unwrap_or_else(|| self.column_of(cur_start, self.cursor_byte_offset));
        self.preferred_column = Some(col);
        let prev_newline = cur_start - 1;
        let prev_start = line_start(&self.bytes, prev_newline);
        self.cursor_byte_offset = self.offset_for_column(prev_start, prev_newline, col);
        self.recompute_cursor_grapheme();
    }

    pub fn cursor_down(&mut self) {
        let cur_start = line_start(&self.bytes, self.cursor_byte_offset);
        let cur_end = line_end(&self.bytes, self.cursor_byte_offset);
        if cur_end >= self.bytes.len() {
            return;
        }
        let col = self
            .preferred_column
            .unwrap_or_else(|| self.column_of(cur_start, self.cursor_byte_offset));
        self.preferred_column = Some(col);
        let next_start = cur_end + 1;
        let next_end = line_end(&self.bytes, next_start);
        self.cursor_byte_offset = self.offset_for_column(next_start, next_end, col);
        self.recompute_cursor_grapheme();
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.cursor_byte_offset = 0;
        self.cursor_grapheme_offset = 0;
        self.preferred_column = None;
        self.invalidate_layout();
    }

    /// Replaces the buffer's entire contents with `text`, placing the cursor
    /// past the end (history recall; spec §4.8/§4.15 "history prev/next").
    pub fn load_text(&mut self, text: &str) {
        self.bytes = text.as_bytes().to_vec();
        self.cursor_byte_offset = self.bytes.len();
        self.preferred_column = None;
        self.recompute_cursor_grapheme();
        self.invalidate_layout();
    }

    /// True when the cursor is on the buffer's first logical line (no `\n`
    /// before it), used to decide whether ArrowUp recalls history.
    pub fn cursor_on_first_line(&self) -> bool {
        line_start(&self.bytes, self.cursor_byte_offset) == 0
    }

    /// True when the cursor is on the buffer's last logical line (no `\n`
    /// at or after it), used to decide whether ArrowDown recalls history.
    pub fn cursor_on_last_line(&self) -> bool {
        line_end(&self.bytes, self.cursor_byte_offset) == self.bytes.len()
    }

    pub fn ensure_layout(&mut self, width: usize) -> &LayoutInfo {
        let width = width.max(1);
        if self.layout_cache.as_ref().map(|l| l.width) != Some(width) {
            let s = self.as_str();
            let mut row_starts = Vec::new();
            let mut total_physical = 0usize;
            let mut line_start_byte = 0usize;
            for line in s.split('\n') {
                let rows = width::wrap_logical_line(line, width);
                for r in &rows {
                    row_starts.push(line_start_byte + r.start);
                }
                total_physical += rows.len();
                line_start_byte += line.len() + 1;
            }
            self.layout_cache = Some(LayoutInfo {
                width,
                physical_lines: total_physical,
                row_start_byte_offsets: row_starts,
            });
        }
        self.layout_cache.as_ref().unwrap()
    }
}
