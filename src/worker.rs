use log::{debug, warn};
use tokio::sync::mpsc;

use crate::actions::{Request, Response};
use crate::api::RadioBrowserClient;
use crate::config::LocationSource;
use crate::geo::GeoClient;

/// Serves controller requests off the UI thread. Each request runs in its own
/// task so a slow search never holds up autocomplete.
pub async fn run(
    mut req_rx: mpsc::Receiver<Request>,
    resp_tx: mpsc::Sender<Response>,
    directory: RadioBrowserClient,
    geo: GeoClient,
    location: LocationSource,
) {
    while let Some(request) = req_rx.recv().await {
        debug!("Worker handling {:?}", request);
        let resp_tx = resp_tx.clone();
        let directory = directory.clone();
        let geo = geo.clone();
        tokio::spawn(async move {
            let response = match request {
                Request::Search { id, term } => {
                    let result = directory.search_stations(&term).await;
                    if let Err(e) = &result {
                        warn!("Error fetching stations for {:?}: {}", term, e);
                    }
                    Response::StationsLoaded { id, term, result }
                }
                Request::Suggest { ticket, term } => {
                    let result = directory.suggest(&term).await;
                    if let Err(e) = &result {
                        warn!("Suggestion fetch error for {:?}: {}", term, e);
                    }
                    Response::SuggestionsLoaded { ticket, result }
                }
                Request::Locate { id } => {
                    if location != LocationSource::Denied {
                        let _ = resp_tx.send(Response::Located { id }).await;
                    }
                    let result = geo.resolve_country(location).await;
                    if let Err(e) = &result {
                        warn!("Geolocation error: {}", e);
                    }
                    Response::CountryResolved { id, result }
                }
            };
            let _ = resp_tx.send(response).await;
        });
    }
    debug!("Request channel closed, worker exiting");
}
