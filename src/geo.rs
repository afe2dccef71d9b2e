use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::{Config, LocationSource};
use crate::error::GeoError;

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(rename = "countryName", default)]
    country_name: Option<String>,
}

/// Turns a location source into a country name the station directory understands.
#[derive(Clone)]
pub struct GeoClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl GeoClient {
    pub fn new(config: &Config) -> Result<Self, GeoError> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self {
            client,
            endpoint: config.geocode_url.clone(),
            timeout: config.locate_timeout,
        })
    }

    /// `Ok(None)` means the geocoder answered but could not name a country.
    pub async fn resolve_country(&self, source: LocationSource) -> Result<Option<String>, GeoError> {
        if source == LocationSource::Denied {
            return Err(GeoError::Denied);
        }
        tokio::time::timeout(self.timeout, self.lookup(source))
            .await
            .map_err(|_| GeoError::Timeout)?
    }

    async fn lookup(&self, source: LocationSource) -> Result<Option<String>, GeoError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            if let LocationSource::Fixed(position) = source {
                query
                    .append_pair("latitude", &position.latitude.to_string())
                    .append_pair("longitude", &position.longitude.to_string());
            }
            query.append_pair("localityLanguage", "en");
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status()));
        }

        let body: ReverseGeocodeResponse = response.json().await?;
        let country = body
            .country_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        debug!("Reverse geocode for {:?} -> {:?}", source, country);
        Ok(country)
    }
}
