//! The receiver itself: power switch, indicators, the station list and which
//! entry is tuned in.

use log::{debug, warn};

use crate::api::Station;
use crate::audio::AudioOutput;

pub const DISPLAY_OFF: &str = "-- OFF --";
pub const DISPLAY_ON: &str = "-- ON --";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

pub struct Tuner {
    output: Box<dyn AudioOutput>,
    power: bool,
    stereo: bool,
    display: String,
    stations: Vec<Station>,
    // Always None or a valid index into `stations`.
    current: Option<usize>,
    volume: f32,
}

impl Tuner {
    pub fn new(output: Box<dyn AudioOutput>, volume: f32) -> Self {
        let mut tuner = Self {
            output,
            power: false,
            stereo: false,
            display: DISPLAY_OFF.to_string(),
            stations: Vec::new(),
            current: None,
            volume: 0.0,
        };
        tuner.set_volume(volume);
        tuner
    }

    pub fn is_powered(&self) -> bool {
        self.power
    }

    pub fn stereo_lit(&self) -> bool {
        self.stereo
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.current.and_then(|index| self.stations.get(index))
    }

    pub fn output(&self) -> &dyn AudioOutput {
        self.output.as_ref()
    }

    pub fn toggle_power(&mut self) {
        self.power = !self.power;
        if self.power {
            if !self.stations.is_empty() && self.current.is_some() {
                self.play_current();
            } else {
                self.display = DISPLAY_ON.to_string();
                self.stereo = true;
            }
        } else {
            if let Err(e) = self.output.stop() {
                warn!("Failed to stop audio: {}", e);
            }
            self.stereo = false;
            self.display = DISPLAY_OFF.to_string();
        }
        debug!("Power {}", if self.power { "on" } else { "off" });
    }

    /// Silences the output without touching the panel; used on exit.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.output.stop() {
            warn!("Failed to stop audio: {}", e);
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.output.set_volume(self.volume);
    }

    pub fn adjust_volume(&mut self, delta: f32) {
        self.set_volume(self.volume + delta);
    }

    /// Installs a fresh result list. The old selection means nothing against
    /// the new list, so it is cleared; a powered receiver tunes to the first entry.
    pub fn replace_stations(&mut self, stations: Vec<Station>) {
        self.stations = stations;
        self.current = None;
        if self.power && !self.stations.is_empty() {
            self.play_station(0);
        }
    }

    /// A pick from the station list. With the power off this only moves the highlight.
    pub fn select(&mut self, index: usize) {
        if self.power {
            self.play_station(index);
        } else if index < self.stations.len() {
            self.current = Some(index);
        }
    }

    pub fn play_station(&mut self, index: usize) {
        if index >= self.stations.len() {
            return;
        }
        self.current = Some(index);
        self.play_current();
    }

    pub fn play_current(&mut self) {
        if !self.power {
            return;
        }
        let Some(station) = self.current.and_then(|index| self.stations.get(index)) else {
            return;
        };
        debug!("Tuning {} ({})", station.name, station.id);
        let name = station.name.clone();
        if let Err(e) = self.output.play(&station.stream_url) {
            warn!("Playback error for {}: {}", station.stream_url, e);
        }
        self.display = name;
        self.stereo = true;
    }

    pub fn change_station(&mut self, step: Step) {
        let len = self.stations.len();
        if len == 0 {
            return;
        }
        let next = match (step, self.current) {
            (Step::Next, None) => 0,
            (Step::Next, Some(index)) if index + 1 >= len => 0,
            (Step::Next, Some(index)) => index + 1,
            (Step::Previous, None) | (Step::Previous, Some(0)) => len - 1,
            (Step::Previous, Some(index)) => index - 1,
        };
        self.play_station(next);
    }
}
