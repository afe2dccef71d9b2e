use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::ApiError;

/// A playable station, normalized from a radio-browser.info entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub country: Option<String>,
    pub tags: Vec<String>,
    pub codec: Option<String>,
    pub bitrate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RadioBrowserStation {
    #[serde(default)]
    stationuuid: String,
    #[serde(default)]
    name: String,
    url_resolved: Option<String>,
    country: Option<String>,
    tags: Option<String>,
    codec: Option<String>,
    bitrate: Option<u32>,
}

fn normalize_station(raw: RadioBrowserStation) -> Option<Station> {
    let stream_url = raw.url_resolved?.trim().to_string();
    if stream_url.is_empty() {
        return None;
    }
    Some(Station {
        id: raw.stationuuid,
        name: raw.name.trim().to_string(),
        stream_url,
        country: raw.country.filter(|c| !c.trim().is_empty()),
        tags: split_list(raw.tags),
        codec: raw.codec.filter(|c| !c.trim().is_empty()),
        bitrate: raw.bitrate.filter(|b| *b > 0),
    })
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

#[derive(Clone)]
pub struct RadioBrowserClient {
    client: Client,
    base_url: Url,
    search_limit: u32,
    suggestion_limit: u32,
}

impl RadioBrowserClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            search_limit: config.search_limit,
            suggestion_limit: config.suggestion_limit,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::NotABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Stations whose name matches `term`, most clicked first. Entries without a
    /// resolved stream url are dropped.
    pub async fn search_stations(&self, term: &str) -> Result<Vec<Station>, ApiError> {
        let mut url = self.endpoint(&["stations", "search"])?;
        url.query_pairs_mut()
            .append_pair("name", term)
            .append_pair("limit", &self.search_limit.to_string())
            .append_pair("hidebroken", "true")
            .append_pair("order", "clickcount")
            .append_pair("reverse", "true");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let raw: Vec<RadioBrowserStation> = response.json().await?;
        let total = raw.len();
        let stations: Vec<Station> = raw.into_iter().filter_map(normalize_station).collect();
        debug!("Search {:?}: {} of {} stations playable", term, stations.len(), total);
        Ok(stations)
    }

    /// Station names for the autocomplete dropdown.
    pub async fn suggest(&self, term: &str) -> Result<Vec<String>, ApiError> {
        let mut url = self.endpoint(&["stations", "byname", term])?;
        url.query_pairs_mut()
            .append_pair("limit", &self.suggestion_limit.to_string())
            .append_pair("hidebroken", "true");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let raw: Vec<RadioBrowserStation> = response.json().await?;
        Ok(raw.into_iter().map(|station| station.name).collect())
    }
}
