//! Prefix match + fuzzy score over the `/`-command vocabulary (spec §4.9).

const COMMANDS: &[&str] = &[
    "clear",
    "debug",
    "fork",
    "help",
    "kill",
    "mark",
    "model",
    "rewind",
    "send",
    "check-mail",
    "read-mail",
    "delete-mail",
    "system",
];

#[derive(Debug, Clone)]
pub struct Completion {
    prefix: String,
    candidates: Vec<String>,
    index: usize,
}

impl Completion {
    pub fn current(&self) -> &str {
        &self.candidates[self.index]
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn next(&mut self) -> &str {
        self.index = (self.index + 1) % self.candidates.len();
        self.current()
    }

    pub fn prev(&mut self) -> &str {
        self.index = if self.index == 0 {
            self.candidates.len() - 1
        } else {
            self.index - 1
        };
        self.current()
    }

    /// True iff `current_input` still begins with the prefix this completion
    /// was created from, letting the caller cancel on divergence.
    pub fn matches_prefix(&self, current_input: &str) -> bool {
        current_input.starts_with(&self.prefix)
    }
}

/// Builds a completion for a `/`-prefixed input prefix, or `None` if nothing
/// in the command vocabulary matches.
pub fn create_for_commands(prefix: &str) -> Option<Completion> {
    let query = prefix.strip_prefix('/')?;
    let query_lower = query.to_ascii_lowercase();
    let mut matches: Vec<&str> = COMMANDS
        .iter()
        .filter(|c| c.to_ascii_lowercase().starts_with(&query_lower))
        .copied()
        .collect();
    if matches.is_empty() {
        return None;
    }
    // Fuzzy ordering: shortest (closest) match first, then alphabetical.
    matches.sort_by_key(|c| (c.len(), c.to_string()));
    Some(Completion {
        prefix: prefix.to_string(),
        candidates: matches.into_iter().map(str::to_string).collect(),
        index: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_returns_none() {
        assert!(create_for_commands("/zzz").is_none());
    }

    #[test]
    fn prefix_matches_case_insensitively() {
        let c = create_for_commands("/MO").unwrap();
        assert_eq!(c.current(), "model");
    }

    #[test]
    fn shorter_candidates_sort_first() {
        let c = create_for_commands("/m").unwrap();
        assert_eq!(c.candidates(), &["mark".to_string(), "model".to_string()]);
    }

    #[test]
    fn next_prev_wrap_around() {
        let mut c = create_for_commands("/m").unwrap();
        assert_eq!(c.current(), "mark");
        assert_eq!(c.next(), "model");
        assert_eq!(c.next(), "mark");
        assert_eq!(c.prev(), "model");
    }

    #[test]
    fn matches_prefix_detects_divergence() {
        let c = create_for_commands("/mo").unwrap();
        assert!(c.matches_prefix("/mod"));
        assert!(!c.matches_prefix("/xo"));
    }
}
