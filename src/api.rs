use crate::config::{
    Session, ACCEPT, ACCEPT_LANGUAGE, ENTITIES_SKILL_ID, ROUTINES_VERSION, USER_AGENT,
};
use crate::errors::{CleanupError, CleanupResult};
use crate::flex_text::deserialize_flex_text;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const LIST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(10);
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

const ALEXA_APP_HEADER: &str = "x-amzn-alexa-app";
const ROUTINES_VERSION_HEADER: &str = "routines-version";
const REQUEST_ID_HEADER: &str = "x-amzn-requestid";
const CSRF_HEADER: &str = "csrf";

pub const ENDPOINTS_QUERY: &str = r#"
query CustomerSmartHome {
    endpoints(endpointsQueryParams: { paginationParams: { disablePagination: true } }) {
        items {
            friendlyName
            legacyAppliance {
                applianceId
                mergedApplianceIds
                connectedVia
                applianceKey
                appliancePairs
                modelName
                friendlyDescription
                version
                friendlyName
                manufacturerName
            }
        }
    }
}
"#;

/// One row of `GET /api/behaviors/entities`
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    pub display_name: String,
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    pub description: String,
}

/// An endpoint from the GraphQL listing, flattened out of `legacyAppliance`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointRecord {
    pub friendly_name: String,
    pub appliance_key: String,
    pub merged_appliance_ids: Option<serde_json::Value>,
    pub friendly_description: String,
    pub manufacturer_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAppliance {
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    appliance_key: String,
    #[serde(default)]
    merged_appliance_ids: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    friendly_description: String,
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    manufacturer_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointItem {
    #[serde(default, deserialize_with = "deserialize_flex_text")]
    friendly_name: String,
    #[serde(default)]
    legacy_appliance: Option<LegacyAppliance>,
}

#[derive(Debug, Deserialize)]
struct EndpointItems {
    items: Vec<EndpointItem>,
}

#[derive(Debug, Deserialize)]
struct EndpointsData {
    endpoints: EndpointItems,
}

#[derive(Debug, Deserialize)]
struct EndpointsResponse {
    data: EndpointsData,
}

pub fn parse_entities(raw: &serde_json::Value) -> CleanupResult<Vec<EntityRecord>> {
    Ok(Vec::<EntityRecord>::deserialize(raw)?)
}

/// Items without a `legacyAppliance` cannot be deleted through the phoenix
/// API and are skipped.
pub fn parse_endpoints(raw: &serde_json::Value) -> CleanupResult<Vec<EndpointRecord>> {
    let response = EndpointsResponse::deserialize(raw)?;
    let records = response
        .data
        .endpoints
        .items
        .into_iter()
        .filter_map(|item| match item.legacy_appliance {
            Some(legacy) => Some(EndpointRecord {
                friendly_name: item.friendly_name,
                appliance_key: legacy.appliance_key,
                merged_appliance_ids: legacy.merged_appliance_ids,
                friendly_description: legacy.friendly_description,
                manufacturer_name: legacy.manufacturer_name,
            }),
            None => {
                tracing::warn!(name = %item.friendly_name, "endpoint has no legacyAppliance, skipping");
                None
            }
        })
        .collect();
    Ok(records)
}

/// Per-call correlation id sent as `x-amzn-RequestId`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four Alexa calls a cleanup run needs.
#[async_trait]
pub trait SmartHomeApi: Send + Sync {
    /// Raw entities listing. `None` when the server sent an empty body.
    async fn list_entities(&self) -> CleanupResult<Option<serde_json::Value>>;

    /// Raw GraphQL endpoints listing. `None` when the server sent an empty body.
    async fn list_endpoints(&self, request_id: &RequestId) -> CleanupResult<Option<serde_json::Value>>;

    /// Fires the delete. The returned status is informational only.
    async fn delete_device(&self, device_id_for_url: &str, request_id: &RequestId) -> CleanupResult<u16>;

    /// True only when the control endpoint answers 404.
    async fn check_device_deleted(&self, entity_id: &str, request_id: &RequestId) -> CleanupResult<bool>;
}

#[derive(Clone)]
pub struct AlexaClient {
    pub base_url: String,
    session: Session,
    base_headers: HeaderMap,
    client: reqwest::Client,
}

// base_headers carries the cookie, so only the redacted session is shown.
impl std::fmt::Debug for AlexaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlexaClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn header_value(name: &str, value: &str) -> CleanupResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| CleanupError::InvalidHeader(name.to_string()))
}

fn send_error(err: reqwest::Error, url: &str, timeout: Duration) -> CleanupError {
    if err.is_timeout() {
        CleanupError::Timeout(url.to_string(), timeout.as_secs())
    } else {
        CleanupError::Transport(url.to_string(), err.to_string())
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl AlexaClient {
    pub fn new(session: Session) -> CleanupResult<Self> {
        let mut base_headers = HeaderMap::new();
        base_headers.insert(HOST, header_value("Host", &session.host)?);
        base_headers.insert(COOKIE, header_value("Cookie", &session.cookie)?);
        base_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        base_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static(ACCEPT));
        base_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE),
        );
        base_headers.insert(
            HeaderName::from_static(ALEXA_APP_HEADER),
            header_value(ALEXA_APP_HEADER, &session.alexa_app)?,
        );
        header_value(CSRF_HEADER, &session.csrf)?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CleanupError::Transport(session.base_url(), e.to_string()))?;

        Ok(Self {
            base_url: session.base_url(),
            session,
            base_headers,
            client,
        })
    }

    /// Points the client somewhere other than `https://{host}`, e.g. a local
    /// proxy. The Host header still carries the session host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn csrf_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.session.csrf).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    fn request_id_value(request_id: &RequestId) -> HeaderValue {
        HeaderValue::from_str(request_id.as_str()).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        headers.insert(
            HeaderName::from_static(ROUTINES_VERSION_HEADER),
            HeaderValue::from_static(ROUTINES_VERSION),
        );
        headers
    }

    fn delete_headers(&self, request_id: &RequestId) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        headers.insert(HeaderName::from_static(CSRF_HEADER), self.csrf_value());
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            Self::request_id_value(request_id),
        );
        headers
    }

    fn graphql_headers(&self, request_id: &RequestId) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        headers.insert(HeaderName::from_static(CSRF_HEADER), self.csrf_value());
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            Self::request_id_value(request_id),
        );
        headers
    }

    pub fn delete_url(&self, device_id_for_url: &str) -> String {
        format!(
            "{}/api/phoenix/appliance/{}%3D%3D_{}",
            self.base_url, self.session.delete_skill, device_id_for_url
        )
    }

    pub fn verify_url(&self, entity_id: &str) -> String {
        format!(
            "{}/api/smarthome/v1/presentation/devices/control/{}",
            self.base_url, entity_id
        )
    }

    /// Shared tail of both listing calls: non-2xx is fatal, empty is `None`.
    async fn read_listing(
        url: &str,
        resp: reqwest::Response,
    ) -> CleanupResult<Option<serde_json::Value>> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| send_error(e, url, LIST_TIMEOUT))?;
        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), "listing response");

        if !status.is_success() {
            return Err(CleanupError::ServerError(status.as_u16(), truncate(&body)));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl SmartHomeApi for AlexaClient {
    async fn list_entities(&self) -> CleanupResult<Option<serde_json::Value>> {
        let url = format!("{}/api/behaviors/entities", self.base_url);
        let resp = self
            .client
            .get(&url)
            .headers(self.get_headers())
            .query(&[("skillId", ENTITIES_SKILL_ID)])
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(|e| send_error(e, &url, LIST_TIMEOUT))?;
        Self::read_listing(&url, resp).await
    }

    async fn list_endpoints(&self, request_id: &RequestId) -> CleanupResult<Option<serde_json::Value>> {
        let url = format!("{}/nexus/v1/graphql", self.base_url);
        let body = serde_json::json!({ "query": ENDPOINTS_QUERY });
        let resp = self
            .client
            .post(&url)
            .headers(self.graphql_headers(request_id))
            .json(&body)
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(|e| send_error(e, &url, LIST_TIMEOUT))?;
        Self::read_listing(&url, resp).await
    }

    async fn delete_device(&self, device_id_for_url: &str, request_id: &RequestId) -> CleanupResult<u16> {
        let url = self.delete_url(device_id_for_url);
        let resp = self
            .client
            .delete(&url)
            .headers(self.delete_headers(request_id))
            .timeout(DELETE_TIMEOUT)
            .send()
            .await
            .map_err(|e| send_error(e, &url, DELETE_TIMEOUT))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        tracing::debug!(%url, %request_id, status, body = %truncate(&text), "delete response");
        Ok(status)
    }

    async fn check_device_deleted(&self, entity_id: &str, request_id: &RequestId) -> CleanupResult<bool> {
        let url = self.verify_url(entity_id);
        let mut headers = self.get_headers();
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            Self::request_id_value(request_id),
        );
        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| send_error(e, &url, VERIFY_TIMEOUT))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        tracing::debug!(%url, %request_id, status = status.as_u16(), body = %truncate(&text), "verify response");
        Ok(status == StatusCode::NOT_FOUND)
    }
}
