//! Distinguishes a physical arrow-key press from a mouse-scroll-wheel burst
//! delivered as repeated arrow events (spec §4.3, §8 "Arrow burst").

pub const THRESHOLD_MS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Cursor(Direction),
    Scroll(Direction),
}

#[derive(Debug, Clone, Copy)]
struct Buffering {
    direction: Direction,
    first_event_time_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Buffering(Buffering),
}

#[derive(Debug)]
pub struct ArrowBurstDetector {
    state: State,
}

impl Default for ArrowBurstDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrowBurstDetector {
    pub fn new() -> Self {
        ArrowBurstDetector { state: State::Idle }
    }

    /// Feeds one arrow-key event observed at `now_ms`.
    pub fn process_arrow(&mut self, dir: Direction, now_ms: u64) -> Option<Emit> {
        match self.state {
            State::Idle => {
                self.state = State::Buffering(Buffering {
                    direction: dir,
                    first_event_time_ms: now_ms,
                });
                None
            }
            State::Buffering(b) if b.direction == dir => {
                let elapsed = now_ms.saturating_sub(b.first_event_time_ms);
                if elapsed <= THRESHOLD_MS {
                    Some(Emit::Scroll(dir))
                } else {
                    self.state = State::Buffering(Buffering {
                        direction: dir,
                        first_event_time_ms: now_ms,
                    });
                    Some(Emit::Cursor(b.direction))
                }
            }
            State::Buffering(b) => {
                self.state = State::Buffering(Buffering {
                    direction: dir,
                    first_event_time_ms: now_ms,
                });
                Some(Emit::Cursor(b.direction))
            }
        }
    }

    /// Promotes a pending buffering state to a Cursor emit once the window has
    /// elapsed with no further events.
    pub fn check_timeout(&mut self, now_ms: u64) -> Option<Emit> {
        if let State::Buffering(b) = self.state {
            let elapsed = now_ms.saturating_sub(b.first_event_time_ms);
            if elapsed > THRESHOLD_MS {
                self.state = State::Idle;
                return Some(Emit::Cursor(b.direction));
            }
        }
        None
    }

    /// Milliseconds until the next timeout would fire, for sizing the event
    /// loop's `select()` timeout. `None` when idle (no deadline pending).
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self.state {
            State::Idle => None,
            State::Buffering(b) => {
                let elapsed = now_ms.saturating_sub(b.first_event_time_ms);
                Some(THRESHOLD_MS.saturating_sub(elapsed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_scroll_scenario() {
        let mut d = ArrowBurstDetector::new();
        assert_eq!(d.process_arrow(Direction::Down, 0), None);
        assert_eq!(
            d.process_arrow(Direction::Down, 3),
            Some(Emit::Scroll(Direction::Down))
        );
        assert_eq!(
            d.process_arrow(Direction::Down, 6),
            Some(Emit::Scroll(Direction::Down))
        );
        assert_eq!(
            d.process_arrow(Direction::Down, 9),
            Some(Emit::Scroll(Direction::Down))
        );
        assert_eq!(
            d.process_arrow(Direction::Down, 12),
            Some(Emit::Scroll(Direction::Down))
        );
    }

    #[test]
    fn single_press_promotes_to_cursor_on_timeout() {
        let mut d = ArrowBurstDetector::new();
        assert_eq!(d.process_arrow(Direction::Up, 0), None);
        assert_eq!(d.check_timeout(10), None);
        assert_eq!(
            d.check_timeout(16),
            Some(Emit::Cursor(Direction::Up))
        );
        assert_eq!(d.check_timeout(20), None);
    }

    #[test]
    fn direction_change_flushes_old_direction_as_cursor() {
        let mut d = ArrowBurstDetector::new();
        d.process_arrow(Direction::Down, 0);
        let emit = d.process_arrow(Direction::Up, 5);
        assert_eq!(emit, Some(Emit::Cursor(Direction::Down)));
    }

    #[test]
    fn same_direction_after_timeout_flushes_then_restarts() {
        let mut d = ArrowBurstDetector::new();
        d.process_arrow(Direction::Down, 0);
        let emit = d.process_arrow(Direction::Down, 20);
        assert_eq!(emit, Some(Emit::Cursor(Direction::Down)));
    }
}
