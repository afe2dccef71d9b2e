use crate::{
    api::Station,
    audio::PlaybackState,
    search::SearchBox,
    tuner::Tuner,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};

// Layout constants for better maintainability
const RECEIVER_HEIGHT: u16 = 6;
const SEARCH_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 3;
const VOLUME_WIDTH: u16 = 24;
const MARGIN: u16 = 1;

const HIGHLIGHT_WIDTH: usize = 3; // width of highlight symbol " > "
const MIN_NAME_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Stations,
    Search,
    Suggestions,
}

/// What the station pane shows: the list, or a status line in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationView {
    Stations,
    Message(String),
}

pub struct UiState {
    pub tuner: Tuner,
    pub search: SearchBox,
    pub view: StationView,
    pub focus: Focus,
    pub list_state: ListState,
    pub should_quit: bool,
}

impl UiState {
    pub fn new(tuner: Tuner, search: SearchBox) -> Self {
        Self {
            tuner,
            search,
            view: StationView::Stations,
            focus: Focus::Stations,
            list_state: ListState::default(),
            should_quit: false,
        }
    }

    pub fn show_message(&mut self, message: impl Into<String>) {
        self.view = StationView::Message(message.into());
    }

    pub fn show_stations(&mut self) {
        self.view = StationView::Stations;
        if self.tuner.current_index().is_some() {
            self.follow_current();
        } else if self.tuner.stations().is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(0));
        }
    }

    /// Moves the browse cursor onto the tuned station.
    pub fn follow_current(&mut self) {
        if let Some(index) = self.tuner.current_index() {
            self.list_state.select(Some(index));
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.list_state
            .selected()
            .filter(|index| *index < self.tuner.stations().len())
    }

    pub fn cursor_down(&mut self) {
        let len = self.tuner.stations().len();
        if len > 0 {
            let next = match self.cursor() {
                Some(index) => (index + 1) % len,
                None => 0,
            };
            self.list_state.select(Some(next));
        }
    }

    pub fn cursor_up(&mut self) {
        let len = self.tuner.stations().len();
        if len > 0 {
            let prev = match self.cursor() {
                Some(0) | None => len - 1,
                Some(index) => index - 1,
            };
            self.list_state.select(Some(prev));
        }
    }

    pub fn quit(&mut self) {
        self.tuner.shutdown();
        self.should_quit = true;
    }
}

pub fn render_ui(f: &mut Frame, app: &mut UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(MARGIN)
        .constraints([
            Constraint::Length(RECEIVER_HEIGHT),
            Constraint::Length(SEARCH_HEIGHT),
            Constraint::Min(5),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(f.area());

    render_receiver(f, chunks[0], app);
    render_search(f, chunks[1], app);
    render_station_pane(f, chunks[2], app);
    render_footer(f, chunks[3]);

    // Dropdown draws last so it sits over the station list.
    if app.search.suggestions_visible() {
        render_suggestions(f, chunks[1], chunks[2], app);
    }
}

fn indicator(label: &str, lit: bool, color: Color) -> Span<'static> {
    let style = if lit {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!("● {label}"), style)
}

fn render_receiver(f: &mut Frame, area: Rect, app: &UiState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(VOLUME_WIDTH)])
        .split(area);

    let tuner = &app.tuner;
    let status = if !tuner.is_powered() {
        Span::raw("")
    } else {
        match tuner.output().state() {
            PlaybackState::Connecting => Span::styled("TUNING…", Style::default().fg(Color::Yellow)),
            PlaybackState::Playing => Span::styled("ON AIR", Style::default().fg(Color::Green)),
            PlaybackState::Error(_) => Span::styled("NO SIGNAL", Style::default().fg(Color::Red)),
            PlaybackState::Stopped => Span::raw(""),
        }
    };

    let content = vec![
        Line::from(vec![
            indicator("POWER", tuner.is_powered(), Color::Green),
            Span::raw("   "),
            indicator("STEREO", tuner.stereo_lit(), Color::Red),
            Span::raw("   "),
            status,
        ]),
        Line::from(""),
        Line::from(Span::styled(
            tuner.display().to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
    ];

    let panel = Paragraph::new(Text::from(content)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title("Receiver"),
    );
    f.render_widget(panel, columns[0]);

    let volume = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("Volume"),
        )
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(f64::from(tuner.volume()))
        .label(format!("{:.0}%", tuner.volume() * 100.0));
    f.render_widget(volume, columns[1]);
}

fn render_search(f: &mut Frame, area: Rect, app: &UiState) {
    let focused = matches!(app.focus, Focus::Search | Focus::Suggestions);
    let border = if focused { Color::Yellow } else { Color::Gray };
    let text = if app.search.input().is_empty() && !focused {
        Span::styled("Search stations by name…", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(app.search.input().to_string(), Style::default().fg(Color::White))
    };

    let search = Paragraph::new(Line::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title("Search"),
    );
    f.render_widget(search, area);

    if app.focus == Focus::Search {
        let typed = app.search.input().chars().count() as u16;
        let x = (area.x + 1 + typed).min(area.right().saturating_sub(2));
        f.set_cursor_position((x, area.y + 1));
    }
}

fn render_station_pane(f: &mut Frame, area: Rect, app: &mut UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    if let StationView::Message(message) = &app.view {
        let text = Paragraph::new(message.as_str())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray))
            .block(block.title("Stations"));
        f.render_widget(text, area);
        return;
    }

    let width = (area.width as usize).saturating_sub(4 + HIGHLIGHT_WIDTH);
    let current = app.tuner.current_index();
    let items: Vec<ListItem> = app
        .tuner
        .stations()
        .iter()
        .enumerate()
        .map(|(index, station)| {
            let row = station_row(station, width);
            if Some(index) == current {
                ListItem::new(format!("♪ {row}"))
                    .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("  {row}"))
            }
        })
        .collect();

    let list = List::new(items)
        .block(block.title(format!("Stations ({} found)", app.tuner.stations().len())))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(" > ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_suggestions(f: &mut Frame, search_area: Rect, below: Rect, app: &UiState) {
    let names = app.search.suggestions();
    let height = (names.len() as u16 + 2).min(below.height);
    let area = Rect {
        x: search_area.x + 1,
        y: below.y,
        width: search_area.width.saturating_sub(2),
        height,
    };

    let highlighted = (app.focus == Focus::Suggestions).then_some(app.search.highlighted());
    let items: Vec<ListItem> = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let item = ListItem::new(name.as_str());
            if Some(index) == highlighted {
                item.style(Style::default().fg(Color::Black).bg(Color::Cyan))
            } else {
                item
            }
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Suggestions"),
    );
    f.render_widget(Clear, area);
    f.render_widget(list, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let key = |k: &'static str, color: Color| {
        Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };
    let label = |l: &'static str| Span::styled(l, Style::default().fg(Color::White));

    let controls = Paragraph::new(Line::from(vec![
        key("P ", Color::Green),
        label("Power • "),
        key("↑/↓ ", Color::Yellow),
        label("Browse • "),
        key("ENTER ", Color::Green),
        label("Tune • "),
        key("←/→ ", Color::Yellow),
        label("Prev/Next • "),
        key("+/- ", Color::Cyan),
        label("Volume • "),
        key("/ ", Color::Blue),
        label("Search • "),
        key("L ", Color::Blue),
        label("Near me • "),
        key("Q ", Color::Red),
        label("Quit"),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray))
            .title("Controls"),
    );

    f.render_widget(controls, area);
}

fn station_row(station: &Station, width: usize) -> String {
    let mut details = Vec::new();
    if let Some(country) = &station.country {
        details.push(country.clone());
    }
    match (&station.codec, station.bitrate) {
        (Some(codec), Some(bitrate)) => details.push(format!("{codec} {bitrate}kbps")),
        (Some(codec), None) => details.push(codec.clone()),
        (None, Some(bitrate)) => details.push(format!("{bitrate}kbps")),
        (None, None) => {}
    }
    if let Some(tag) = station.tags.first() {
        details.push(tag.clone());
    }

    let details = details.join(" · ");
    let name_width = if details.is_empty() {
        width.saturating_sub(2)
    } else {
        (width * 6 / 10).max(MIN_NAME_WIDTH)
    };
    let name = truncate_string(&station.name, name_width);
    if details.is_empty() {
        name
    } else {
        let rest = width.saturating_sub(name_width + 5);
        format!("{} │ {}", name, truncate_string(&details, rest))
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    // Char-aware truncation to avoid breaking UTF-8 boundaries
    let count = s.chars().count();
    if count <= max_len {
        return format!("{:<width$}", s, width = max_len);
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let trimmed: String = s.chars().take(max_len - 3).collect();
    format!("{trimmed}...")
}
