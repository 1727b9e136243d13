//! Byte stream → semantic key actions (spec §4.2).
//!
//! A small state machine over raw bytes: legacy single-byte controls, VT100
//! arrow sequences, SGR mouse-wheel reports, pasted SGR color codes (stripped),
//! and the Kitty CSI-u keyboard-enhancement protocol all fold into one closed
//! [`Action`] enum.

const MAX_ESCAPE_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Char(char),
    Tab,
    Backspace,
    InsertNewline,
    SubmitNewline,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    CtrlA,
    CtrlC,
    CtrlE,
    CtrlK,
    CtrlU,
    CtrlW,
    ScrollUp,
    ScrollDown,
    Unknown,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    /// Seen ESC; `body` accumulates CSI parameter bytes once we know this is a
    /// `[`-introduced sequence. `saw_bracket = false` means we're still
    /// waiting to see whether the byte after ESC is `[`.
    Escape { body: Vec<u8>, saw_bracket: bool },
    Utf8 { buf: [u8; 4], len: usize, need: usize },
}

#[derive(Debug)]
pub struct InputParser {
    state: State,
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InputParser {
    pub fn new() -> Self {
        InputParser { state: State::Idle }
    }

    /// Feeds one raw byte, returning the action it completed, if any.
    pub fn feed(&mut self, b: u8) -> Option<Action> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        match state {
            State::Idle => self.feed_idle(b),
            State::Escape { body, saw_bracket } => self.feed_escape(b, body, saw_bracket),
            State::Utf8 { buf, len, need } => self.feed_utf8(b, buf, len, need),
        }
    }

    fn feed_idle(&mut self, b: u8) -> Option<Action> {
        match b {
            0x03 => Some(Action::CtrlC),
            0x01 => Some(Action::CtrlA),
            0x05 => Some(Action::CtrlE),
            0x0B => Some(Action::CtrlK),
            0x15 => Some(Action::CtrlU),
            0x17 => Some(Action::CtrlW),
            0x09 => Some(Action::Tab),
            0x0A => Some(Action::InsertNewline),
            0x0D => Some(Action::SubmitNewline),
            0x7F => Some(Action::Backspace),
            0x1B => {
                self.state = State::Escape {
                    body: Vec::new(),
                    saw_bracket: false,
                };
                None
            }
            0x20..=0x7E => Some(Action::Char(b as char)),
            0xC2..=0xDF => {
                self.state = State::Utf8 {
                    buf: [b, 0, 0, 0],
                    len: 1,
                    need: 2,
                };
                None
            }
            0xE0..=0xEF => {
                self.state = State::Utf8 {
                    buf: [b, 0, 0, 0],
                    len: 1,
                    need: 3,
                };
                None
            }
            0xF0..=0xF4 => {
                self.state = State::Utf8 {
                    buf: [b, 0, 0, 0],
                    len: 1,
                    need: 4,
                };
                None
            }
            _ => Some(Action::Unknown),
        }
    }

    fn feed_utf8(&mut self, b: u8, mut buf: [u8; 4], len: usize, need: usize) -> Option<Action> {
        if !(0x80..=0xBF).contains(&b) {
            // Invalid continuation byte: reset without emitting (spec §4.2).
            self.state = State::Idle;
            return None;
        }
        buf[len] = b;
        let len = len + 1;
        if len < need {
            self.state = State::Utf8 { buf, len, need };
            return None;
        }
        self.state = State::Idle;
        std::str::from_utf8(&buf[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Action::Char)
    }

    fn feed_escape(&mut self, b: u8, mut body: Vec<u8>, saw_bracket: bool) -> Option<Action> {
        if !saw_bracket {
            if b == b'[' {
                self.state = State::Escape {
                    body,
                    saw_bracket: true,
                };
                return None;
            }
            // A bare ESC not followed by `[`: emit Escape for the original
            // byte, dropping this one (spec leaves bare-ESC framing open).
            self.state = State::Idle;
            return Some(Action::Escape);
        }

        if (0x40..=0x7E).contains(&b) {
            self.state = State::Idle;
            return classify_csi(&body, b);
        }

        if body.len() >= MAX_ESCAPE_BUFFER {
            self.state = State::Idle;
            return None;
        }
        body.push(b);
        self.state = State::Escape {
            body,
            saw_bracket: true,
        };
        None
    }
}

fn classify_csi(body: &[u8], final_byte: u8) -> Option<Action> {
    match final_byte {
        b'A' if body.is_empty() => Some(Action::ArrowUp),
        b'B' if body.is_empty() => Some(Action::ArrowDown),
        b'C' if body.is_empty() => Some(Action::ArrowRight),
        b'D' if body.is_empty() => Some(Action::ArrowLeft),
        b'M' | b'm' if body.first() == Some(&b'<') => parse_mouse(&body[1..]),
        b'u' => parse_csi_u(body),
        _ => None,
    }
}

fn parse_mouse(params: &[u8]) -> Option<Action> {
    let s = std::str::from_utf8(params).ok()?;
    let button: i64 = s.split(';').next()?.parse().ok()?;
    match button {
        64 => Some(Action::ScrollUp),
        65 => Some(Action::ScrollDown),
        _ => None,
    }
}

fn parse_csi_u(body: &[u8]) -> Option<Action> {
    let s = std::str::from_utf8(body).ok()?;
    let mut parts = s.split(';');
    let keycode: u32 = parts.next()?.parse().ok()?;
    let modifiers: u32 = parts
        .next()
        .and_then(|m| m.split(':').next())
        .and_then(|m| m.parse().ok())
        .unwrap_or(1);

    // Kitty's synthetic "modifier pressed alone" keycodes live in the Unicode
    // Private Use Area; these carry no semantic action.
    if (0xE000..=0xF8FF).contains(&keycode) {
        return None;
    }

    match keycode {
        13 => {
            if modifiers == 1 {
                Some(Action::SubmitNewline)
            } else {
                Some(Action::InsertNewline)
            }
        }
        9 => Some(Action::Tab),
        27 => Some(Action::Escape),
        127 => Some(Action::Backspace),
        _ => {
            let ch = char::from_u32(keycode)?;
            let mask = modifiers.saturating_sub(1);
            let shift = mask & 0x1 != 0;
            let alt = mask & 0x2 != 0;
            let ctrl = mask & 0x4 != 0;
            if ctrl {
                match ch.to_ascii_lowercase() {
                    'c' => Some(Action::CtrlC),
                    'a' => Some(Action::CtrlA),
                    'e' => Some(Action::CtrlE),
                    'k' => Some(Action::CtrlK),
                    'u' => Some(Action::CtrlU),
                    'w' => Some(Action::CtrlW),
                    _ => Some(Action::Char(ch)),
                }
            } else if shift && !alt {
                Some(Action::Char(shift_variant(ch)))
            } else {
                Some(Action::Char(ch))
            }
        }
    }
}

fn shift_variant(c: char) -> char {
    match c {
        'a'..='z' => c.to_ascii_uppercase(),
        '1' => '!',
        '2' => '@',
        '3' => '#',
        '4' => '$',
        '5' => '%',
        '6' => '^',
        '7' => '&',
        '8' => '*',
        '9' => '(',
        '0' => ')',
        '-' => '_',
        '=' => '+',
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        ';' => ':',
        '\'' => '"',
        ',' => '<',
        '.' => '>',
        '/' => '?',
        '`' => '~',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut InputParser, bytes: &[u8]) -> Vec<Action> {
        bytes.iter().filter_map(|&b| parser.feed(b)).collect()
    }

    #[test]
    fn ascii_char_is_immediate() {
        let mut p = InputParser::new();
        assert_eq!(p.feed(b'a'), Some(Action::Char('a')));
    }

    #[test]
    fn ctrl_controls() {
        let mut p = InputParser::new();
        assert_eq!(p.feed(0x03), Some(Action::CtrlC));
        assert_eq!(p.feed(0x0B), Some(Action::CtrlK));
        assert_eq!(p.feed(0x15), Some(Action::CtrlU));
        assert_eq!(p.feed(0x17), Some(Action::CtrlW));
    }

    #[test]
    fn enter_in_raw_mode_submits() {
        let mut p = InputParser::new();
        assert_eq!(p.feed(0x0D), Some(Action::SubmitNewline));
        assert_eq!(p.feed(0x0A), Some(Action::InsertNewline));
    }

    #[test]
    fn arrow_keys() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[A\x1b[B\x1b[C\x1b[D");
        assert_eq!(
            actions,
            vec![
                Action::ArrowUp,
                Action::ArrowDown,
                Action::ArrowRight,
                Action::ArrowLeft
            ]
        );
    }

    #[test]
    fn sgr_sequence_is_discarded() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[38;5;242m");
        assert!(actions.is_empty());
    }

    #[test]
    fn mouse_scroll_buttons() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[<64;10;5M\x1b[<65;10;5M");
        assert_eq!(actions, vec![Action::ScrollUp, Action::ScrollDown]);
    }

    #[test]
    fn mouse_other_button_discarded() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[<0;10;5M");
        assert!(actions.is_empty());
    }

    #[test]
    fn csi_u_shift_enter_inserts_newline() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[13;2u");
        assert_eq!(actions, vec![Action::InsertNewline]);
    }

    #[test]
    fn csi_u_plain_enter_submits() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[13;1u");
        assert_eq!(actions, vec![Action::SubmitNewline]);
        let actions = feed_all(&mut p, b"\x1b[13u");
        assert_eq!(actions, vec![Action::SubmitNewline]);
    }

    #[test]
    fn csi_u_ctrl_letter() {
        let mut p = InputParser::new();
        // keycode 'a' = 97, ctrl bit (4) + base 1 = 5
        let actions = feed_all(&mut p, b"\x1b[97;5u");
        assert_eq!(actions, vec![Action::CtrlA]);
    }

    #[test]
    fn csi_u_shift_digit_produces_shifted_symbol() {
        let mut p = InputParser::new();
        // keycode '1' = 49, shift bit (1) + base 1 = 2
        let actions = feed_all(&mut p, b"\x1b[49;2u");
        assert_eq!(actions, vec![Action::Char('!')]);
    }

    #[test]
    fn csi_u_modifier_only_synthetic_keycode_discarded() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[57441;1u");
        assert!(actions.is_empty());
    }

    #[test]
    fn unknown_csi_is_discarded() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, b"\x1b[5~");
        assert!(actions.is_empty());
    }

    #[test]
    fn malformed_csi_overflow_resets_silently() {
        let mut p = InputParser::new();
        let long = [b"\x1b[".as_slice(), &[b'9'; 64]].concat();
        let actions = feed_all(&mut p, &long);
        assert!(actions.is_empty());
        // Parser must have recovered to Idle.
        assert_eq!(p.feed(b'x'), Some(Action::Char('x')));
    }

    #[test]
    fn two_byte_utf8_decodes() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, "é".as_bytes());
        assert_eq!(actions, vec![Action::Char('é')]);
    }

    #[test]
    fn invalid_continuation_byte_resets_without_emitting() {
        let mut p = InputParser::new();
        let actions = feed_all(&mut p, &[0xE0, 0x41]);
        assert!(actions.is_empty());
        assert_eq!(p.feed(b'x'), Some(Action::Char('x')));
    }
}
