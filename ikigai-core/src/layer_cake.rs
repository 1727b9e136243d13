//! Vertical compositor: stacks Scrollback / Spinner / Separator / Input /
//! Completion layers bottom-to-top and allocates screen rows (spec §4.7).
//!
//! Grounded in the same bottom-up budget-then-remainder allocation
//! `ikigai_core::renderer` already uses for a single frame; this module owns
//! the cross-layer row math so the renderer only has to paint the slice it's
//! handed.

/// Per-tick state each layer reports its height from. The agent/REPL owns
/// these values; the compositor never reaches into the agent itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerInputs {
    pub spinner_visible: bool,
    pub input_visible: bool,
    pub input_physical_lines: usize,
    pub completion_rows: usize,
    pub scrollback_total_physical_lines: usize,
}

/// Row allocation for one frame, bottom layers counted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub scroll_from_row: usize,
    pub visible_rows_scrollback: usize,
    pub render_input_buffer: bool,
}

/// Owns `viewport_offset` (spec §3 Agent invariant) across ticks; every other
/// field in [`LayerInputs`] is recomputed fresh each call.
#[derive(Debug, Default)]
pub struct LayerCake {
    viewport_offset: usize,
}

impl LayerCake {
    pub fn new() -> Self {
        LayerCake::default()
    }

    pub fn viewport_offset(&self) -> usize {
        self.viewport_offset
    }

    /// Scrolls the viewport by `delta` physical rows (positive = toward
    /// older history), clamped to the scrollback's total physical lines
    /// minus the rows actually visible.
    pub fn scroll_by(&mut self, delta: isize, scrollback_visible_rows: usize, total_physical_lines: usize) {
        let max_offset = total_physical_lines.saturating_sub(scrollback_visible_rows);
        let current = self.viewport_offset as isize;
        let next = (current + delta).clamp(0, max_offset as isize);
        self.viewport_offset = next as usize;
    }

    /// Resets the viewport to the live (bottom) end, the behavior after any
    /// new scrollback content is appended (e.g. a streamed delta) unless the
    /// user has scrolled up.
    pub fn snap_to_bottom(&mut self) {
        self.viewport_offset = 0;
    }

    /// Allocates rows bottom-up: input + separator + spinner + completion
    /// first, the remainder to scrollback starting at `viewport_offset`
    /// (clamped to what actually fits).
    pub fn compute_frame(&mut self, inputs: LayerInputs, terminal_rows: usize) -> FrameLayout {
        let mut bottom_rows = 0usize;
        bottom_rows += inputs.completion_rows;
        if inputs.input_visible {
            bottom_rows += inputs.input_physical_lines;
            bottom_rows += 1; // separator
        }
        if inputs.spinner_visible {
            bottom_rows += 1;
        }
        let scrollback_rows = terminal_rows.saturating_sub(bottom_rows).max(1);

        let max_offset = inputs
            .scrollback_total_physical_lines
            .saturating_sub(scrollback_rows);
        if self.viewport_offset > max_offset {
            self.viewport_offset = max_offset;
        }

        let scroll_from_row = inputs
            .scrollback_total_physical_lines
            .saturating_sub(scrollback_rows + self.viewport_offset);

        FrameLayout {
            scroll_from_row,
            visible_rows_scrollback: scrollback_rows,
            render_input_buffer: inputs.input_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_layers_reserve_rows_before_scrollback() {
        let mut cake = LayerCake::new();
        let inputs = LayerInputs {
            spinner_visible: true,
            input_visible: true,
            input_physical_lines: 2,
            completion_rows: 0,
            scrollback_total_physical_lines: 100,
        };
        let frame = cake.compute_frame(inputs, 24);
        // 2 input rows + 1 separator + 1 spinner = 4 reserved; 20 for scrollback.
        assert_eq!(frame.visible_rows_scrollback, 20);
        assert!(frame.render_input_buffer);
    }

    #[test]
    fn hidden_input_frees_its_rows_to_scrollback() {
        let mut cake = LayerCake::new();
        let inputs = LayerInputs {
            spinner_visible: true,
            input_visible: false,
            input_physical_lines: 0,
            completion_rows: 0,
            scrollback_total_physical_lines: 100,
        };
        let frame = cake.compute_frame(inputs, 24);
        assert_eq!(frame.visible_rows_scrollback, 23);
        assert!(!frame.render_input_buffer);
    }

    #[test]
    fn viewport_offset_clamps_to_scrollback_extent() {
        let mut cake = LayerCake::new();
        cake.scroll_by(1000, 20, 30);
        assert_eq!(cake.viewport_offset(), 10);
        cake.scroll_by(-1000, 20, 30);
        assert_eq!(cake.viewport_offset(), 0);
    }

    #[test]
    fn compute_frame_clamps_stale_offset_after_resize() {
        let mut cake = LayerCake::new();
        cake.scroll_by(50, 20, 100);
        assert_eq!(cake.viewport_offset(), 50);
        let inputs = LayerInputs {
            spinner_visible: false,
            input_visible: false,
            input_physical_lines: 0,
            completion_rows: 0,
            scrollback_total_physical_lines: 10,
        };
        let frame = cake.compute_frame(inputs, 24);
        assert_eq!(cake.viewport_offset(), 0);
        assert_eq!(frame.scroll_from_row, 0);
    }
}
