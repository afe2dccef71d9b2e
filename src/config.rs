use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://de1.api.radio-browser.info/json";
pub const DEFAULT_GEOCODE_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";

const SEARCH_LIMIT: u32 = 100;
const SUGGESTION_LIMIT: u32 = 5;
const SUGGEST_MIN_CHARS: usize = 3;
const SUGGEST_DEBOUNCE_MS: u64 = 300;
const LOCATE_TIMEOUT_SECS: u64 = 10;

/// Command line surface. Every network endpoint can also come from the environment.
#[derive(Debug, Parser)]
#[command(name = "receiver", version, about = "Tune into radio-browser.info stations from the terminal")]
pub struct Args {
    /// Station directory API root
    #[arg(long, env = "RADIO_BROWSER_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Reverse geocoding endpoint used by "find stations near me"
    #[arg(long, env = "REVERSE_GEOCODE_URL", default_value = DEFAULT_GEOCODE_URL)]
    pub geocode_url: String,

    /// Initial volume, 0.0 to 1.0
    #[arg(long, default_value_t = 0.5)]
    pub volume: f32,

    /// Latitude of the listener
    #[arg(long, allow_hyphen_values = true, requires = "longitude")]
    pub latitude: Option<f64>,

    /// Longitude of the listener
    #[arg(long, allow_hyphen_values = true, requires = "latitude")]
    pub longitude: Option<f64>,

    /// Refuse location lookups entirely
    #[arg(long, conflicts_with_all = ["latitude", "longitude"])]
    pub deny_location: bool,

    /// Run without opening an audio device
    #[arg(long)]
    pub no_audio: bool,

    /// Where log output goes while the terminal UI owns the screen
    #[arg(long, default_value = "receiver.log")]
    pub log_file: PathBuf,

    /// Search to run at startup
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// How the "near me" lookup finds the listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationSource {
    Fixed(Position),
    /// Let the reverse geocoder work it out from the caller's address.
    Network,
    Denied,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub geocode_url: Url,
    pub user_agent: String,
    pub search_limit: u32,
    pub suggestion_limit: u32,
    pub suggest_min_chars: usize,
    pub suggest_debounce: Duration,
    pub locate_timeout: Duration,
    pub location: LocationSource,
    pub volume: f32,
    pub no_audio: bool,
    pub initial_search: Option<String>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let api_url = parse_http_url("api-url", &args.api_url)?;
        let geocode_url = parse_http_url("geocode-url", &args.geocode_url)?;

        if !(0.0..=1.0).contains(&args.volume) {
            return Err(ConfigError::Message(format!(
                "volume must be between 0.0 and 1.0, got {}",
                args.volume
            )));
        }

        let location = match (args.deny_location, args.latitude, args.longitude) {
            (true, _, _) => LocationSource::Denied,
            (false, Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(ConfigError::Message(format!(
                        "coordinates out of range: {latitude}, {longitude}"
                    )));
                }
                LocationSource::Fixed(Position { latitude, longitude })
            }
            _ => LocationSource::Network,
        };

        let initial_search = args
            .search
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        Ok(Self {
            api_url,
            geocode_url,
            user_agent: format!("receiver-tui/{}", env!("CARGO_PKG_VERSION")),
            search_limit: SEARCH_LIMIT,
            suggestion_limit: SUGGESTION_LIMIT,
            suggest_min_chars: SUGGEST_MIN_CHARS,
            suggest_debounce: Duration::from_millis(SUGGEST_DEBOUNCE_MS),
            locate_timeout: Duration::from_secs(LOCATE_TIMEOUT_SECS),
            location,
            volume: args.volume,
            no_audio: args.no_audio,
            initial_search,
        })
    }
}

fn parse_http_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::Message(format!("{name} is not a valid url ({raw}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Message(format!(
            "{name} must use http or https, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(argv: &[&str]) -> Result<Config, ConfigError> {
        let args = Args::try_parse_from(argv).expect("arguments should parse");
        Config::from_args(args)
    }

    #[test]
    fn defaults_point_at_public_endpoints() {
        let config = config_from(&["receiver"]).unwrap();
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.geocode_url.as_str(), DEFAULT_GEOCODE_URL);
        assert_eq!(config.search_limit, 100);
        assert_eq!(config.suggestion_limit, 5);
        assert_eq!(config.suggest_min_chars, 3);
        assert_eq!(config.suggest_debounce, Duration::from_millis(300));
        assert_eq!(config.locate_timeout, Duration::from_secs(10));
        assert_eq!(config.location, LocationSource::Network);
        assert_eq!(config.volume, 0.5);
        assert!(config.initial_search.is_none());
    }

    #[test]
    fn coordinates_become_fixed_location() {
        let config = config_from(&["receiver", "--latitude", "-33.86", "--longitude", "151.2"]).unwrap();
        assert_eq!(
            config.location,
            LocationSource::Fixed(Position { latitude: -33.86, longitude: 151.2 })
        );
    }

    #[test]
    fn latitude_alone_is_rejected() {
        assert!(Args::try_parse_from(["receiver", "--latitude", "10"]).is_err());
    }

    #[test]
    fn deny_location_wins() {
        let config = config_from(&["receiver", "--deny-location"]).unwrap();
        assert_eq!(config.location, LocationSource::Denied);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(config_from(&["receiver", "--volume", "1.5"]).is_err());
        assert!(config_from(&["receiver", "--latitude", "91", "--longitude", "0"]).is_err());
        assert!(config_from(&["receiver", "--api-url", "ftp://example.com"]).is_err());
        assert!(config_from(&["receiver", "--api-url", "not a url"]).is_err());
    }

    #[test]
    fn blank_initial_search_is_dropped() {
        let config = config_from(&["receiver", "   "]).unwrap();
        assert!(config.initial_search.is_none());

        let config = config_from(&["receiver", " jazz "]).unwrap();
        assert_eq!(config.initial_search.as_deref(), Some("jazz"));
    }
}
