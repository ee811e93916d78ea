//! Licence service and analytics endpoints

use crate::error::{CliError, Result};
use chirplink_core::{ChirpError, ProtocolDescriptor, SDK_VERSION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;

pub const DEFAULT_LICENCE_URL: &str = "https://licence.chirp.io";
pub const DEFAULT_ANALYTICS_URL: &str = "https://analytics.chirp.io";

const PLATFORM: &str = "rust";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LicenceList {
    data: Vec<LicenceEntry>,
}

#[derive(Debug, Deserialize)]
struct LicenceEntry {
    name: String,
    licence: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map transport failures onto the SDK's network error
fn network_error(err: reqwest::Error) -> CliError {
    let message = if err.is_connect() {
        "No internet connection".to_string()
    } else if err.is_timeout() {
        "Timeout".to_string()
    } else {
        err.to_string()
    };
    CliError::Chirp(ChirpError::NetworkError(message))
}

/// Map a licence-service rejection onto the SDK error kind
fn status_error(status: StatusCode, message: String) -> ChirpError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChirpError::AuthenticationFailed(message),
        status if status.is_client_error() => ChirpError::LicenceInvalid(message),
        _ => ChirpError::NetworkError(message),
    }
}

pub struct LicenceClient {
    client: Client,
    base_url: String,
}

impl LicenceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the named licence, or the application's first one
    pub async fn fetch(&self, app_key: &str, app_secret: &str, name: Option<&str>) -> Result<String> {
        let url = format!("{}/v3/connect", self.base_url);
        tracing::debug!(%url, "requesting licence");

        let response = self
            .client
            .get(&url)
            .basic_auth(app_key, Some(app_secret))
            .send()
            .await
            .map_err(network_error)?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("Failed to retrieve licence ({})", status));
            return Err(status_error(status, message).into());
        }

        let list: LicenceList = response.json().await.map_err(network_error)?;
        select_licence(list.data, name)
    }
}

fn select_licence(entries: Vec<LicenceEntry>, name: Option<&str>) -> Result<String> {
    match name {
        Some(name) => entries
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.licence)
            .ok_or_else(|| CliError::InvalidArgument(format!("Invalid licence name '{}'", name))),
        None => entries
            .into_iter()
            .next()
            .map(|entry| entry.licence)
            .ok_or_else(|| ChirpError::LicenceInvalid("no licence issued for this application".to_string()).into()),
    }
}

#[derive(Debug, Serialize)]
struct InstantiateEvent<'a> {
    client_id: &'a str,
    timestamp: String,
    platform: &'static str,
    sdk_version: &'static str,
}

#[derive(Debug, Serialize)]
struct PayloadEvent<'a> {
    client_id: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    payload_length: usize,
    protocol_name: &'a str,
    protocol_version: u32,
    platform: &'static str,
    sdk_version: &'static str,
}

/// Fire-and-forget usage telemetry
///
/// Each event is posted from a spawned task; failures are logged at debug and
/// otherwise ignored.
#[derive(Clone)]
pub struct Analytics {
    client: Client,
    runtime: Handle,
    base_url: String,
    app_key: String,
    app_secret: String,
    client_id: String,
    protocol: ProtocolDescriptor,
}

impl Analytics {
    pub fn new(
        base_url: &str,
        app_key: &str,
        app_secret: &str,
        protocol: ProtocolDescriptor,
        runtime: Handle,
    ) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            runtime,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_key: app_key.to_string(),
            app_secret: app_secret.to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            protocol,
        })
    }

    pub fn instantiate(&self) {
        let event = InstantiateEvent {
            client_id: &self.client_id,
            timestamp: iso8601_now(),
            platform: PLATFORM,
            sdk_version: SDK_VERSION,
        };
        self.post("instantiate", &event);
    }

    pub fn send(&self, payload_length: usize) {
        let event = self.payload_event(payload_length, None);
        self.post("send", &event);
    }

    pub fn receive(&self, payload_length: usize) {
        let event = self.payload_event(payload_length, Some(payload_length != 0));
        self.post("receive", &event);
    }

    fn payload_event(&self, payload_length: usize, success: Option<bool>) -> PayloadEvent<'_> {
        PayloadEvent {
            client_id: &self.client_id,
            timestamp: iso8601_now(),
            success,
            payload_length,
            protocol_name: &self.protocol.name,
            protocol_version: self.protocol.version,
            platform: PLATFORM,
            sdk_version: SDK_VERSION,
        }
    }

    fn post<T: Serialize>(&self, endpoint: &str, event: &T) {
        let body = match serde_json::to_value(event) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "dropping analytics event");
                return;
            }
        };

        let request = self
            .client
            .post(format!("{}/v3/connect/{}", self.base_url, endpoint))
            .basic_auth(&self.app_key, Some(&self.app_secret))
            .json(&body);
        let endpoint = endpoint.to_string();

        self.runtime.spawn(async move {
            if let Err(e) = request.send().await {
                tracing::debug!(endpoint = %endpoint, error = %e, "analytics request failed");
            }
        });
    }
}

fn iso8601_now() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    iso8601(elapsed.as_secs(), elapsed.subsec_micros())
}

/// Format unix seconds as `YYYY-MM-DDTHH:MM:SS.ffffffZ`
fn iso8601(unix_secs: u64, micros: u32) -> String {
    let days = (unix_secs / 86_400) as i64;
    let secs_of_day = unix_secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        year,
        month,
        day,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60,
        micros
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
