//! Station checks by fetching the station page over HTTP.
//!
//! The operator's charger page renders a status label per connector. The
//! first line carrying a known label decides the status; lines holding
//! the page's own filter buttons are skipped since they repeat every label.

use std::time::Duration;

use async_trait::async_trait;
use chargewatch_core::station::{StationConfig, StationStatus};

use crate::checker::{CheckError, StationChecker};

const USER_AGENT: &str = concat!("chargewatch/", env!("CARGO_PKG_VERSION"));

/// Marker of the filter buttons, whose labels do not describe the station.
const BUTTON_MARKER: &str = r#"<button tabindex="-1""#;

const AVAILABLE_LABELS: [&str; 2] = ["Available to charge", "זמין לטעינה"];
const IN_USE_LABELS: [&str; 2] = ["In Use", "בשימוש"];

/// Classify a fetched page.
pub fn classify_page(page: &str) -> StationStatus {
    for line in page.lines().map(str::trim) {
        if line.contains(BUTTON_MARKER) {
            continue;
        }
        if AVAILABLE_LABELS.iter().any(|label| line.contains(label)) {
            return StationStatus::Available;
        }
        if IN_USE_LABELS.iter().any(|label| line.contains(label)) {
            return StationStatus::InUse;
        }
    }
    StationStatus::Unknown
}

/// [`StationChecker`] backed by a `reqwest` client.
///
/// The client is created by [`reinit`](StationChecker::reinit); until then,
/// and after [`dispose`](StationChecker::dispose), every check reports
/// [`CheckError::Unusable`].
pub struct HttpChecker {
    client: Option<reqwest::Client>,
    request_timeout: Duration,
}

impl HttpChecker {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: None,
            request_timeout,
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, CheckError> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| CheckError::Unusable(e.to_string()))
    }
}

fn fetch_err(e: reqwest::Error) -> CheckError {
    CheckError::Fetch(e.to_string())
}

#[async_trait]
impl StationChecker for HttpChecker {
    async fn check(&self, station: &StationConfig) -> Result<StationStatus, CheckError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| CheckError::Unusable("HTTP client not initialized".into()))?;

        let page = client
            .get(&station.check_target)
            .header(reqwest::header::ACCEPT_LANGUAGE, "he,en;q=0.8")
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)?;

        Ok(classify_page(&page))
    }

    async fn reinit(&mut self) -> Result<(), CheckError> {
        self.client = None;
        self.client = Some(self.build_client()?);
        tracing::info!("HTTP checker initialized");
        Ok(())
    }

    async fn dispose(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("HTTP checker disposed");
        }
    }
}
