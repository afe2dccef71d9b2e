use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, warn};
use std::time::Instant;
use tokio::sync::mpsc;

use crate::actions::{Request, Response};
use crate::error::GeoError;
use crate::search::SuggestAction;
use crate::tuner::Step;
use crate::ui::{Focus, StationView, UiState as UIApp};

const VOLUME_STEP: f32 = 0.05;

pub const MSG_FETCH_ERROR: &str = "Error fetching stations.";
pub const MSG_LOCATING: &str = "Getting your location...";
pub const MSG_FINDING_COUNTRY: &str = "Finding your country...";
pub const MSG_NO_COUNTRY: &str = "Could not determine your country.";
pub const MSG_LOCATION_DENIED: &str = "Location access denied. Please allow location to use this feature.";
pub const MSG_LOCATION_FAILED: &str = "Could not get your location.";

pub struct AppController {
    pub ui_app: UIApp,
    req_tx: mpsc::Sender<Request>,
    next_id: u64,
    // Only the most recent search / location lookup may touch the screen.
    latest_search: Option<u64>,
    latest_locate: Option<u64>,
}

impl AppController {
    pub fn new(ui_app: UIApp, req_tx: mpsc::Sender<Request>) -> Self {
        Self { ui_app, req_tx, next_id: 0, latest_search: None, latest_locate: None }
    }

    pub fn initialize(&mut self, initial_search: Option<String>) -> Result<()> {
        if let Some(term) = initial_search {
            self.ui_app.search.set_input(&term);
            self.submit_search();
        }
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Returns true when the user asked to quit.
    pub fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.ui_app.quit();
            return Ok(true);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && key.code == KeyCode::Char('u')
            && self.ui_app.focus != Focus::Stations
        {
            self.ui_app.focus = Focus::Search;
            self.ui_app.search.clear(now);
            return Ok(false);
        }

        match self.ui_app.focus {
            Focus::Stations => self.handle_station_key(key.code),
            Focus::Search => self.handle_search_key(key.code, now),
            Focus::Suggestions => self.handle_suggestion_key(key.code, now),
        }
        Ok(self.ui_app.should_quit)
    }

    fn handle_station_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.ui_app.quit(),
            KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Char(' ') => {
                self.ui_app.tuner.toggle_power();
                self.ui_app.follow_current();
            }
            KeyCode::Up | KeyCode::Char('k') => self.ui_app.cursor_up(),
            KeyCode::Down | KeyCode::Char('j') => self.ui_app.cursor_down(),
            // The cursor is hidden while a message covers the list.
            KeyCode::Enter if self.ui_app.view == StationView::Stations => {
                if let Some(index) = self.ui_app.cursor() {
                    self.ui_app.tuner.select(index);
                    self.ui_app.follow_current();
                }
            }
            KeyCode::Left | KeyCode::Char('[') => self.change_station(Step::Previous),
            KeyCode::Right | KeyCode::Char(']') => self.change_station(Step::Next),
            KeyCode::Char('+') | KeyCode::Char('=') => self.ui_app.tuner.adjust_volume(VOLUME_STEP),
            KeyCode::Char('-') | KeyCode::Char('_') => self.ui_app.tuner.adjust_volume(-VOLUME_STEP),
            KeyCode::Char('/') | KeyCode::Char('s') | KeyCode::Char('S') => {
                self.ui_app.focus = Focus::Search;
            }
            KeyCode::Char('l') | KeyCode::Char('L') => self.find_stations_near_me(),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Char(c) => self.ui_app.search.push(c, now),
            KeyCode::Backspace => self.ui_app.search.backspace(now),
            KeyCode::Enter => self.submit_search(),
            KeyCode::Down if self.ui_app.search.suggestions_visible() => {
                self.ui_app.focus = Focus::Suggestions;
            }
            KeyCode::Esc if self.ui_app.search.suggestions_visible() => {
                self.ui_app.search.hide_suggestions();
            }
            KeyCode::Esc | KeyCode::Tab => {
                self.ui_app.search.hide_suggestions();
                self.ui_app.focus = Focus::Stations;
            }
            _ => {}
        }
    }

    fn handle_suggestion_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Up => self.ui_app.search.highlight_previous(),
            KeyCode::Down => self.ui_app.search.highlight_next(),
            KeyCode::Enter => {
                if let Some(name) = self.ui_app.search.accept_highlighted() {
                    debug!("Suggestion picked: {}", name);
                    self.submit_search();
                }
            }
            KeyCode::Esc => {
                self.ui_app.search.hide_suggestions();
                self.ui_app.focus = Focus::Search;
            }
            KeyCode::Char(c) => {
                self.ui_app.focus = Focus::Search;
                self.ui_app.search.push(c, now);
            }
            KeyCode::Backspace => {
                self.ui_app.focus = Focus::Search;
                self.ui_app.search.backspace(now);
            }
            _ => {}
        }
    }

    fn change_station(&mut self, step: Step) {
        self.ui_app.tuner.change_station(step);
        self.ui_app.follow_current();
    }

    /// Drives the suggestion debounce; call once per frame.
    pub fn tick(&mut self, now: Instant) {
        match self.ui_app.search.tick(now) {
            Some(SuggestAction::Fetch { ticket, term }) => {
                if let Err(e) = self.req_tx.try_send(Request::Suggest { ticket, term }) {
                    debug!("Dropped suggestion request: {}", e);
                }
            }
            Some(SuggestAction::Hide) => self.leave_suggestions(),
            None => {}
        }
    }

    fn leave_suggestions(&mut self) {
        if self.ui_app.focus == Focus::Suggestions && !self.ui_app.search.suggestions_visible() {
            self.ui_app.focus = Focus::Search;
        }
    }

    /// Search for whatever is in the field. Blank input is ignored.
    fn submit_search(&mut self) {
        let term = self.ui_app.search.term().to_string();
        if term.is_empty() {
            return;
        }
        self.latest_locate = None;
        self.ui_app.focus = Focus::Stations;
        self.fetch_and_display_stations(term);
    }

    fn fetch_and_display_stations(&mut self, term: String) {
        self.ui_app.search.hide_suggestions();
        self.ui_app.show_message(format!("Searching for \"{}\"...", term));

        let id = self.next_id();
        self.latest_search = Some(id);
        if let Err(e) = self.req_tx.try_send(Request::Search { id, term }) {
            warn!("Could not queue station search: {}", e);
            self.latest_search = None;
            self.ui_app.show_message(MSG_FETCH_ERROR);
        }
    }

    fn find_stations_near_me(&mut self) {
        self.ui_app.show_message(MSG_LOCATING);
        let id = self.next_id();
        self.latest_locate = Some(id);
        if let Err(e) = self.req_tx.try_send(Request::Locate { id }) {
            warn!("Could not queue location lookup: {}", e);
            self.latest_locate = None;
            self.ui_app.show_message(MSG_LOCATION_FAILED);
        }
    }

    pub fn should_quit(&self) -> bool {
        self.ui_app.should_quit
    }

    pub fn process_response(&mut self, resp: Response) -> Result<()> {
        match resp {
            Response::StationsLoaded { id, term, result } => {
                if self.latest_search != Some(id) {
                    debug!("Dropping superseded results for {:?}", term);
                    return Ok(());
                }
                self.latest_search = None;
                match result {
                    Ok(stations) if stations.is_empty() => {
                        self.ui_app.tuner.replace_stations(stations);
                        self.ui_app.list_state.select(None);
                        self.ui_app.show_message(format!("No stations found for \"{}\".", term));
                    }
                    Ok(stations) => {
                        self.ui_app.tuner.replace_stations(stations);
                        self.ui_app.show_stations();
                    }
                    Err(_) => self.ui_app.show_message(MSG_FETCH_ERROR),
                }
            }
            Response::SuggestionsLoaded { ticket, result } => {
                // Failures are only logged; the dropdown stays as it was.
                if let Ok(names) = result {
                    if !self.ui_app.search.show_suggestions(ticket, names) {
                        debug!("Dropping stale suggestions (ticket {})", ticket);
                    }
                    self.leave_suggestions();
                }
            }
            Response::Located { id } => {
                if self.latest_locate == Some(id) {
                    self.ui_app.show_message(MSG_FINDING_COUNTRY);
                }
            }
            Response::CountryResolved { id, result } => {
                if self.latest_locate != Some(id) {
                    return Ok(());
                }
                self.latest_locate = None;
                match result {
                    Ok(Some(country)) => {
                        self.ui_app.search.set_input(&country);
                        self.fetch_and_display_stations(country);
                    }
                    Ok(None) => self.ui_app.show_message(MSG_NO_COUNTRY),
                    Err(GeoError::Denied) => self.ui_app.show_message(MSG_LOCATION_DENIED),
                    Err(_) => self.ui_app.show_message(MSG_LOCATION_FAILED),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::search::SearchBox;
    use crate::tuner::tests::{stations, FakeOutput};
    use crate::tuner::{Tuner, DISPLAY_OFF};
    use std::time::Duration;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    struct Harness {
        app: AppController,
        requests: mpsc::Receiver<Request>,
        output: FakeOutput,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let output = FakeOutput::default();
            let tuner = Tuner::new(Box::new(output.clone()), 0.5);
            let ui = UIApp::new(tuner, SearchBox::new(3, DEBOUNCE));
            let (req_tx, requests) = mpsc::channel(16);
            Self { app: AppController::new(ui, req_tx), requests, output, now: Instant::now() }
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.app
                .handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), self.now)
                .unwrap()
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.press(KeyCode::Char(c));
            }
        }

        fn message(&self) -> Option<&str> {
            match &self.app.ui_app.view {
                StationView::Message(message) => Some(message.as_str()),
                StationView::Stations => None,
            }
        }

        fn sent(&mut self) -> Vec<Request> {
            let mut sent = Vec::new();
            while let Ok(request) = self.requests.try_recv() {
                sent.push(request);
            }
            sent
        }

        fn search_for(&mut self, term: &str) -> u64 {
            self.press(KeyCode::Char('/'));
            self.type_text(term);
            self.press(KeyCode::Enter);
            match self.sent().pop() {
                Some(Request::Search { id, .. }) => id,
                other => panic!("expected a search request, got {:?}", other),
            }
        }

        fn respond(&mut self, response: Response) {
            self.app.process_response(response).unwrap();
        }
    }

    #[test]
    fn submitting_trims_and_shows_searching_message() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("  bbc  ");
        h.press(KeyCode::Enter);

        assert_eq!(h.sent(), vec![Request::Search { id: 1, term: "bbc".into() }]);
        assert_eq!(h.message(), Some("Searching for \"bbc\"..."));
        assert_eq!(h.app.ui_app.focus, Focus::Stations);
    }

    #[test]
    fn blank_search_is_ignored() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("   ");
        h.press(KeyCode::Enter);
        assert!(h.sent().is_empty());
        assert_eq!(h.message(), None);
    }

    #[test]
    fn results_are_listed_without_playing_while_off() {
        let mut h = Harness::new();
        let id = h.search_for("jazz");
        h.respond(Response::StationsLoaded { id, term: "jazz".into(), result: Ok(stations(3)) });

        assert_eq!(h.message(), None);
        assert_eq!(h.app.ui_app.tuner.stations().len(), 3);
        assert_eq!(h.app.ui_app.cursor(), Some(0));
        assert_eq!(h.app.ui_app.tuner.display(), DISPLAY_OFF);
        assert!(h.output.plays().is_empty());
    }

    #[test]
    fn results_autoplay_first_station_when_powered() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('p'));
        let id = h.search_for("jazz");
        h.respond(Response::StationsLoaded { id, term: "jazz".into(), result: Ok(stations(2)) });

        assert_eq!(h.output.plays(), vec!["http://stream.example.com/0"]);
        assert_eq!(h.app.ui_app.tuner.display(), "Station 0");
    }

    #[test]
    fn empty_results_clear_the_list() {
        let mut h = Harness::new();
        let id = h.search_for("a");
        h.respond(Response::StationsLoaded { id, term: "a".into(), result: Ok(stations(2)) });

        let id = h.search_for("zzzz");
        h.respond(Response::StationsLoaded { id, term: "azzzz".into(), result: Ok(Vec::new()) });
        assert_eq!(h.message(), Some("No stations found for \"azzzz\"."));
        assert!(h.app.ui_app.tuner.stations().is_empty());
    }

    #[test]
    fn failed_search_keeps_previous_stations() {
        let mut h = Harness::new();
        let id = h.search_for("rock");
        h.respond(Response::StationsLoaded { id, term: "rock".into(), result: Ok(stations(2)) });

        let id = h.search_for("pop");
        h.respond(Response::StationsLoaded {
            id,
            term: "rockpop".into(),
            result: Err(ApiError::Status(reqwest::StatusCode::BAD_GATEWAY)),
        });
        assert_eq!(h.message(), Some(MSG_FETCH_ERROR));
        assert_eq!(h.app.ui_app.tuner.stations().len(), 2);
    }

    #[test]
    fn superseded_results_are_dropped() {
        let mut h = Harness::new();
        let first = h.search_for("one");
        let second = h.search_for("two");
        h.respond(Response::StationsLoaded { id: first, term: "one".into(), result: Ok(stations(5)) });
        assert!(h.app.ui_app.tuner.stations().is_empty());
        assert_eq!(h.message(), Some("Searching for \"onetwo\"..."));

        h.respond(Response::StationsLoaded { id: second, term: "onetwo".into(), result: Ok(stations(1)) });
        assert_eq!(h.app.ui_app.tuner.stations().len(), 1);
    }

    #[test]
    fn typing_requests_suggestions_after_debounce() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("ro");
        h.app.tick(h.now + DEBOUNCE);
        assert!(h.sent().is_empty());

        h.type_text("ck");
        h.app.tick(h.now + DEBOUNCE / 2);
        assert!(h.sent().is_empty());
        h.app.tick(h.now + DEBOUNCE);
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        let Request::Suggest { ticket, term } = &sent[0] else {
            panic!("expected suggest, got {:?}", sent[0]);
        };
        assert_eq!(term, "rock");

        h.respond(Response::SuggestionsLoaded {
            ticket: *ticket,
            result: Ok(vec!["Rock Antenne".into(), "Rock FM".into()]),
        });
        assert!(h.app.ui_app.search.suggestions_visible());
    }

    #[test]
    fn picking_a_suggestion_searches_for_it() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("rock");
        h.app.tick(h.now + DEBOUNCE);
        let Some(Request::Suggest { ticket, .. }) = h.sent().pop() else {
            panic!("expected suggest");
        };
        h.respond(Response::SuggestionsLoaded {
            ticket,
            result: Ok(vec!["Rock Antenne".into(), "Rock FM".into()]),
        });

        h.press(KeyCode::Down);
        assert_eq!(h.app.ui_app.focus, Focus::Suggestions);
        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);

        assert_eq!(h.app.ui_app.search.input(), "Rock FM");
        assert!(!h.app.ui_app.search.suggestions_visible());
        match h.sent().pop() {
            Some(Request::Search { term, .. }) => assert_eq!(term, "Rock FM"),
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn suggestion_failures_and_late_answers_are_ignored() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("news");
        h.app.tick(h.now + DEBOUNCE);
        let Some(Request::Suggest { ticket, .. }) = h.sent().pop() else {
            panic!("expected suggest");
        };

        h.respond(Response::SuggestionsLoaded {
            ticket,
            result: Err(ApiError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)),
        });
        assert!(!h.app.ui_app.search.suggestions_visible());

        h.press(KeyCode::Enter);
        h.respond(Response::SuggestionsLoaded { ticket, result: Ok(vec!["BBC News".into()]) });
        assert!(!h.app.ui_app.search.suggestions_visible());
    }

    #[test]
    fn ctrl_u_clears_the_field_and_closes_the_dropdown() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("jazz");
        h.app.tick(h.now + DEBOUNCE);
        let Some(Request::Suggest { ticket, .. }) = h.sent().pop() else {
            panic!("expected suggest");
        };
        h.respond(Response::SuggestionsLoaded { ticket, result: Ok(vec!["Jazz FM".into()]) });
        h.press(KeyCode::Down);
        assert_eq!(h.app.ui_app.focus, Focus::Suggestions);

        let quit = h
            .app
            .handle_key_event(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL), h.now)
            .unwrap();
        assert!(!quit);
        assert_eq!(h.app.ui_app.search.input(), "");
        assert_eq!(h.app.ui_app.focus, Focus::Search);

        h.app.tick(h.now + DEBOUNCE);
        assert!(!h.app.ui_app.search.suggestions_visible());
        assert!(h.sent().is_empty());
    }

    #[test]
    fn enter_does_nothing_while_a_message_covers_the_list() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('p'));
        let id = h.search_for("rock");
        h.respond(Response::StationsLoaded { id, term: "rock".into(), result: Ok(stations(3)) });
        h.press(KeyCode::Down);

        h.search_for("pop");
        assert_eq!(h.message(), Some("Searching for \"rockpop\"..."));
        h.press(KeyCode::Enter);
        assert_eq!(h.app.ui_app.tuner.current_index(), Some(0));
        assert_eq!(h.output.plays(), vec!["http://stream.example.com/0"]);

        h.app.ui_app.show_stations();
        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);
        assert_eq!(h.app.ui_app.tuner.current_index(), Some(1));
    }

    #[test]
    fn escape_closes_dropdown_then_leaves_search() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        h.type_text("jazz");
        h.app.tick(h.now + DEBOUNCE);
        let Some(Request::Suggest { ticket, .. }) = h.sent().pop() else {
            panic!("expected suggest");
        };
        h.respond(Response::SuggestionsLoaded { ticket, result: Ok(vec!["Jazz FM".into()]) });

        assert!(!h.press(KeyCode::Esc));
        assert!(!h.app.ui_app.search.suggestions_visible());
        assert_eq!(h.app.ui_app.focus, Focus::Search);
        h.press(KeyCode::Esc);
        assert_eq!(h.app.ui_app.focus, Focus::Stations);
    }

    #[test]
    fn near_me_flow_searches_detected_country() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('l'));
        assert_eq!(h.message(), Some(MSG_LOCATING));
        let Some(Request::Locate { id }) = h.sent().pop() else {
            panic!("expected locate");
        };

        h.respond(Response::Located { id });
        assert_eq!(h.message(), Some(MSG_FINDING_COUNTRY));

        h.respond(Response::CountryResolved { id, result: Ok(Some("Germany".into())) });
        assert_eq!(h.app.ui_app.search.input(), "Germany");
        assert_eq!(h.message(), Some("Searching for \"Germany\"..."));
        match h.sent().pop() {
            Some(Request::Search { term, .. }) => assert_eq!(term, "Germany"),
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn near_me_failures_explain_themselves() {
        let cases = [
            (Ok(None), MSG_NO_COUNTRY),
            (Err(GeoError::Denied), MSG_LOCATION_DENIED),
            (Err(GeoError::Timeout), MSG_LOCATION_FAILED),
        ];
        for (result, expected) in cases {
            let mut h = Harness::new();
            h.press(KeyCode::Char('l'));
            let Some(Request::Locate { id }) = h.sent().pop() else {
                panic!("expected locate");
            };
            h.respond(Response::CountryResolved { id, result });
            assert_eq!(h.message(), Some(expected));
            assert!(h.sent().is_empty());
        }
    }

    #[test]
    fn manual_search_supersedes_pending_location() {
        let mut h = Harness::new();
        h.press(KeyCode::Char('l'));
        let Some(Request::Locate { id }) = h.sent().pop() else {
            panic!("expected locate");
        };
        h.search_for("bbc");
        h.respond(Response::CountryResolved { id, result: Ok(Some("France".into())) });
        assert_eq!(h.app.ui_app.search.input(), "bbc");
        assert!(h.sent().is_empty());
    }

    #[test]
    fn station_keys_drive_the_tuner() {
        let mut h = Harness::new();
        let id = h.search_for("x");
        h.respond(Response::StationsLoaded { id, term: "x".into(), result: Ok(stations(3)) });

        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);
        assert_eq!(h.app.ui_app.tuner.current_index(), Some(1));
        assert!(h.output.plays().is_empty());

        h.press(KeyCode::Char('p'));
        assert_eq!(h.output.plays(), vec!["http://stream.example.com/1"]);

        h.press(KeyCode::Right);
        h.press(KeyCode::Right);
        assert_eq!(h.app.ui_app.tuner.current_index(), Some(0));
        assert_eq!(h.app.ui_app.cursor(), Some(0));
        h.press(KeyCode::Left);
        assert_eq!(h.app.ui_app.tuner.display(), "Station 2");

        h.press(KeyCode::Char('+'));
        assert!((h.app.ui_app.tuner.volume() - 0.55).abs() < 1e-6);

        h.press(KeyCode::Char('p'));
        assert_eq!(h.app.ui_app.tuner.display(), DISPLAY_OFF);
    }

    #[test]
    fn quit_keys() {
        let mut h = Harness::new();
        assert!(h.press(KeyCode::Char('q')));
        assert!(h.app.should_quit());

        let mut h = Harness::new();
        h.press(KeyCode::Char('/'));
        assert!(!h.press(KeyCode::Char('q')));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(h.app.handle_key_event(ctrl_c, h.now).unwrap());
    }

    #[test]
    fn initial_search_runs_on_startup() {
        let mut h = Harness::new();
        h.app.initialize(Some("classical".into())).unwrap();
        assert_eq!(h.app.ui_app.search.input(), "classical");
        match h.sent().pop() {
            Some(Request::Search { term, .. }) => assert_eq!(term, "classical"),
            other => panic!("expected search, got {:?}", other),
        }
    }
}
