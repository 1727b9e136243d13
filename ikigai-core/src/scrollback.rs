//! Append-only scrollback lines with cached per-width wrap layout (spec §4.5).

use crate::width;

#[derive(Debug, Clone)]
struct Layout {
    cached_width: usize,
    display_width_cells: usize,
    physical_lines: usize,
}

#[derive(Debug, Clone)]
struct Line {
    bytes: Vec<u8>,
    layout: Option<Layout>,
}

#[derive(Debug, Default)]
pub struct Scrollback {
    lines: Vec<Line>,
    total_physical_lines: usize,
    current_width: Option<usize>,
}

impl Scrollback {
    pub fn new() -> Self {
        Scrollback::default()
    }

    /// Appends an immutable line. Layout is computed lazily.
    pub fn append_line(&mut self, bytes: &[u8]) {
        self.lines.push(Line {
            bytes: bytes.to_vec(),
            layout: None,
        });
        if let Some(w) = self.current_width {
            self.compute_layout_for(self.lines.len() - 1, w);
            self.recompute_total();
        }
    }

    pub fn get_line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn get_total_physical_lines(&self) -> usize {
        self.total_physical_lines
    }

    pub fn get_line_text(&self, i: usize) -> Option<&[u8]> {
        self.lines.get(i).map(|l| l.bytes.as_slice())
    }

    fn compute_layout_for(&mut self, i: usize, width: usize) {
        let line = &mut self.lines[i];
        if line.layout.as_ref().map(|l| l.cached_width) == Some(width) {
            return;
        }
        let s = std::str::from_utf8(&line.bytes).unwrap_or("");
        let rows = width::wrap_logical_line(s, width.max(1));
        let display_width_cells = rows.iter().map(|r| r.cells).sum();
        let physical_lines = rows.len().max(1);
        line.layout = Some(Layout {
            cached_width: width,
            display_width_cells,
            physical_lines,
        });
    }

    fn recompute_total(&mut self) {
        self.total_physical_lines = self
            .lines
            .iter()
            .map(|l| l.layout.as_ref().map(|ly| ly.physical_lines).unwrap_or(1))
            .sum();
    }

    /// Recomputes layouts for all lines at `width` if it differs from the
    /// currently cached width. O(1) on a cache hit.
    pub fn ensure_layout(&mut self, width: usize) {
        if self.current_width == Some(width) {
            return;
        }
        for i in 0..self.lines.len() {
            self.compute_layout_for(i, width);
        }
        self.current_width = Some(width);
        self.recompute_total();
    }

    pub fn physical_lines_of(&self, i: usize) -> usize {
        self.lines
            .get(i)
            .and_then(|l| l.layout.as_ref())
            .map(|l| l.physical_lines)
            .unwrap_or(1)
    }

    pub fn display_width_of(&self, i: usize) -> usize {
        self.lines
            .get(i)
            .and_then(|l| l.layout.as_ref())
            .map(|l| l.display_width_cells)
            .unwrap_or(0)
    }

    /// Maps a physical row index (0-based, across the whole scrollback at the
    /// cached width) to `(line_index, row_offset_within_line)`.
    pub fn find_logical_line_at_physical_row(&self, row: usize) -> Option<(usize, usize)> {
        let mut remaining = row;
        for (i, line) in self.lines.iter().enumerate() {
            let plines = line.layout.as_ref().map(|l| l.physical_lines).unwrap_or(1);
            if remaining < plines {
                return Some((i, remaining));
            }
            remaining -= plines;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_count() {
        let mut sb = Scrollback::new();
        sb.append_line(b"hello");
        sb.append_line(b"world");
        assert_eq!(sb.get_line_count(), 2);
    }

    #[test]
    fn sgr_line_layout_matches_spec_scenario() {
        let mut sb = Scrollback::new();
        sb.append_line(b"\x1b[38;5;242mhello\x1b[0m");
        sb.ensure_layout(80);
        assert_eq!(sb.display_width_of(0), 5);
        assert_eq!(sb.physical_lines_of(0), 1);
        sb.ensure_layout(3);
        assert_eq!(sb.physical_lines_of(0), 2);
    }

    #[test]
    fn total_physical_lines_is_sum_of_per_line_layouts() {
        let mut sb = Scrollback::new();
        for _ in 0..1000 {
            sb.append_line(b"a line of text for reflow testing purposes");
        }
        sb.ensure_layout(80);
        let sum: usize = (0..sb.get_line_count()).map(|i| sb.physical_lines_of(i)).sum();
        assert_eq!(sb.get_total_physical_lines(), sum);
        sb.ensure_layout(120);
        let sum: usize = (0..sb.get_line_count()).map(|i| sb.physical_lines_of(i)).sum();
        assert_eq!(sb.get_total_physical_lines(), sum);
    }

    #[test]
    fn find_logical_line_at_physical_row() {
        let mut sb = Scrollback::new();
        sb.append_line(b"short");
        sb.append_line(b"a line that is definitely longer than ten chars");
        sb.ensure_layout(10);
        assert_eq!(sb.find_logical_line_at_physical_row(0), Some((0, 0)));
        let (line_idx, _) = sb.find_logical_line_at_physical_row(1).unwrap();
        assert_eq!(line_idx, 1);
    }

    #[test]
    fn empty_line_counts_as_one_physical_row() {
        let mut sb = Scrollback::new();
        sb.append_line(b"");
        sb.ensure_layout(80);
        assert_eq!(sb.physical_lines_of(0), 1);
    }
}
