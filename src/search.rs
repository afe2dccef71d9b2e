use std::time::{Duration, Instant};

/// One-shot timer that restarts on every keystroke.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// True exactly once per quiet period, when `now` has reached the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// What the debounce timer wants done with the current input.
#[derive(Debug, PartialEq, Eq)]
pub enum SuggestAction {
    Hide,
    Fetch { ticket: u64, term: String },
}

/// The search field plus its autocomplete dropdown.
#[derive(Debug)]
pub struct SearchBox {
    input: String,
    min_chars: usize,
    debounce: Debouncer,
    suggestions: Vec<String>,
    visible: bool,
    highlighted: usize,
    // Bumped on every edit, hide and request so late answers can be dropped.
    ticket: u64,
}

impl SearchBox {
    pub fn new(min_chars: usize, delay: Duration) -> Self {
        Self {
            input: String::new(),
            min_chars,
            debounce: Debouncer::new(delay),
            suggestions: Vec::new(),
            visible: false,
            highlighted: 0,
            ticket: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn term(&self) -> &str {
        self.input.trim()
    }

    pub fn push(&mut self, c: char, now: Instant) {
        self.input.push(c);
        self.edited(now);
    }

    pub fn backspace(&mut self, now: Instant) {
        if self.input.pop().is_some() {
            self.edited(now);
        }
    }

    pub fn clear(&mut self, now: Instant) {
        if !self.input.is_empty() {
            self.input.clear();
            self.edited(now);
        }
    }

    fn edited(&mut self, now: Instant) {
        self.ticket += 1;
        self.debounce.arm(now);
    }

    /// Programmatic replacement (suggestion pick, detected country). Does not
    /// count as typing, so no suggestion lookup follows.
    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.debounce.cancel();
    }

    pub fn tick(&mut self, now: Instant) -> Option<SuggestAction> {
        if !self.debounce.fire(now) {
            return None;
        }
        if self.term().chars().count() < self.min_chars {
            self.hide_suggestions();
            return Some(SuggestAction::Hide);
        }
        self.ticket += 1;
        Some(SuggestAction::Fetch { ticket: self.ticket, term: self.term().to_string() })
    }

    /// Applies a suggestion answer. Returns false when it was stale and dropped.
    pub fn show_suggestions(&mut self, ticket: u64, names: Vec<String>) -> bool {
        if ticket != self.ticket {
            return false;
        }
        if names.is_empty() {
            self.hide_suggestions();
        } else {
            self.suggestions = names;
            self.visible = true;
            self.highlighted = 0;
        }
        true
    }

    pub fn hide_suggestions(&mut self) {
        self.debounce.cancel();
        self.suggestions.clear();
        self.visible = false;
        self.highlighted = 0;
        self.ticket += 1;
    }

    pub fn suggestions_visible(&self) -> bool {
        self.visible
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn highlight_next(&mut self) {
        if !self.suggestions.is_empty() {
            self.highlighted = (self.highlighted + 1) % self.suggestions.len();
        }
    }

    pub fn highlight_previous(&mut self) {
        if !self.suggestions.is_empty() {
            self.highlighted = self
                .highlighted
                .checked_sub(1)
                .unwrap_or(self.suggestions.len() - 1);
        }
    }

    /// Copies the highlighted suggestion into the field and closes the dropdown.
    /// Returns the term to search for.
    pub fn accept_highlighted(&mut self) -> Option<String> {
        let name = self.suggestions.get(self.highlighted)?.clone();
        self.set_input(&name);
        self.hide_suggestions();
        Some(name)
    }
}
