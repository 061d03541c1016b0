// ABOUTME: Blocking HTTP client for the note-store gateway
// ABOUTME: Handles throttling, auth headers, and fail-fast errors

use crate::model::{Notebook, NoteMetadata, NoteRecord, ResourceBinary, SyncState};
use crate::remote::{Credentials, Environment, NoteStore};
use crate::util::truncate_str;
use crate::{Error, Result};
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

const CLIENT_NAME: &str = "inkpost";
const PROTOCOL_MAJOR: u16 = 1;
const PROTOCOL_MINOR: u16 = 28;

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    throttle_min: u64,
    throttle_max: u64,
}

impl ApiClient {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(ApiClient {
            client,
            base_url: base_url.unwrap_or_else(|| Environment::Production.base_url().into()),
            token,
            throttle_min: 100,
            throttle_max: 300,
        })
    }

    /// Exchange application credentials for a session token.
    pub fn authenticate(credentials: &Credentials, base_url: Option<String>) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct Response {
            session_token: String,
        }

        let base_url = base_url.unwrap_or_else(|| credentials.environment.base_url().into());
        let client = ApiClient::new(credentials.developer_token.clone(), Some(base_url))?;
        let resp: Response = client.post(
            "/v1/authenticate",
            json!({
                "consumer_key": credentials.client_key,
                "consumer_secret": credentials.client_secret,
            }),
        )?;

        if resp.session_token.is_empty() {
            return Err(Error::Auth("gateway returned an empty session token".into()));
        }

        Ok(ApiClient {
            token: resp.session_token,
            ..client
        })
    }

    pub fn with_throttle(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.throttle_min = min_ms;
        self.throttle_max = max_ms;
        self
    }

    pub fn disable_throttle(mut self) -> Self {
        self.throttle_min = 0;
        self.throttle_max = 0;
        self
    }

    fn throttle(&self) {
        if self.throttle_max > 0 {
            let sleep_ms = rand::thread_rng().gen_range(self.throttle_min..=self.throttle_max);
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
    }

    fn send(&self, endpoint: &str, body: serde_json::Value) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("{}/{} (Rust)", CLIENT_NAME, env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()?;

        self.throttle();

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().unwrap_or_default();
            return Err(Error::Auth(format!(
                "{} rejected the token: {}",
                endpoint,
                truncate_str(&message, 100)
            )));
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::Api {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                message: truncate_str(&message, 100),
            });
        }

        Ok(response)
    }

    fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let body = self.send(endpoint, body)?.text()?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(
                endpoint,
                body = %truncate_str(&body, 500),
                "failed to parse gateway response"
            );
            Error::Parse(e)
        })
    }

    fn post_bytes(&self, endpoint: &str, body: serde_json::Value) -> Result<Vec<u8>> {
        Ok(self.send(endpoint, body)?.bytes()?.to_vec())
    }
}

impl NoteStore for ApiClient {
    fn check_protocol_version(&self) -> Result<bool> {
        #[derive(serde::Deserialize)]
        struct Response {
            supported: bool,
        }

        let resp: Response = self.post(
            "/v1/check-version",
            json!({
                "client_name": CLIENT_NAME,
                "major": PROTOCOL_MAJOR,
                "minor": PROTOCOL_MINOR,
            }),
        )?;
        Ok(resp.supported)
    }

    fn get_sync_state(&self) -> Result<SyncState> {
        self.post("/v1/get-sync-state", json!({}))
    }

    fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        #[derive(serde::Deserialize)]
        struct Response {
            notebooks: Vec<Notebook>,
        }

        let resp: Response = self.post("/v1/list-notebooks", json!({}))?;
        Ok(resp.notebooks)
    }

    fn find_note_metadata(
        &self,
        notebook_guid: &str,
        ascending: bool,
        offset: i32,
        limit: i32,
    ) -> Result<Vec<NoteMetadata>> {
        #[derive(serde::Deserialize)]
        struct Response {
            notes: Vec<NoteMetadata>,
        }

        let resp: Response = self.post(
            "/v1/find-notes-metadata",
            json!({
                "notebook_guid": notebook_guid,
                "ascending": ascending,
                "offset": offset,
                "max_notes": limit,
            }),
        )?;
        Ok(resp.notes)
    }

    fn get_note(&self, guid: &str) -> Result<NoteRecord> {
        self.post(
            "/v1/get-note",
            json!({
                "guid": guid,
                "with_content": true,
                "with_resources_data": false,
            }),
        )
    }

    fn get_note_tag_names(&self, guid: &str) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct Response {
            tag_names: Vec<String>,
        }

        let resp: Response = self.post("/v1/get-note-tag-names", json!({ "guid": guid }))?;
        Ok(resp.tag_names)
    }

    fn get_resource_binary(&self, guid: &str) -> Result<ResourceBinary> {
        let mut resource: ResourceBinary = self
            .post("/v1/get-resource", json!({ "guid": guid }))
            .map_err(|e| match e {
                Error::Api { status: 404, .. } => Error::ResourceNotFound(guid.to_string()),
                other => other,
            })?;
        resource.data = self.post_bytes("/v1/get-resource-data", json!({ "guid": guid }))?;
        Ok(resource)
    }
}
