//! Airtable record client: create, find by key, and find-or-create.
//!
//! ## Upsert model
//!
//! ```text
//! START ──▶ LOOKUP ──found──▶ DONE(existing id)
//!              │
//!              └─none──▶ CREATE ──▶ DONE(new id)
//! ```
//!
//! The lookup is `GET <table>?maxRecords=1&filterByFormula={key} = <value>`;
//! the create is `POST <table>` with `{"fields": …}`. There is no lock
//! between the two requests, so two concurrent upserts of the same key can
//! both miss the lookup and both create. Existing records are returned as
//! they are, never updated.
//!
//! HTTP goes through the [`Transport`] trait so the request sequence can be
//! exercised without a network.

use crate::config::AirtableConfig;
use crate::error::CrawlError;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Record fields, keyed by Airtable field name.
pub type Fields = Map<String, Value>;

// ── Transport ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request to the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Query-string pairs, unencoded.
    pub query: Vec<(String, String)>,
    /// JSON body, sent for POST.
    pub body: Option<Value>,
}

/// Status and raw body of a record-store response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends [`ApiRequest`]s. Any HTTP answer, success or not, is an `Ok`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CrawlError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CrawlError> {
        (**self).send(request)
    }
}

/// [`Transport`] over reqwest's blocking client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &AirtableConfig) -> Result<Self, CrawlError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrawlError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CrawlError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let failed = |e: reqwest::Error| CrawlError::RequestFailed {
            url: request.url.clone(),
            reason: e.to_string(),
        };
        let response = builder.send().map_err(failed)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(failed)?;
        Ok(ApiResponse { status, body })
    }
}

// ── Client ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RecordRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<RecordRef>,
}

/// Create answers either as a batch (`{"records": [...]}`) or a single record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateResponse {
    Batch { records: Vec<RecordRef> },
    Single { id: String },
}

/// Client for one Airtable account.
pub struct AirtableClient {
    config: AirtableConfig,
    transport: Box<dyn Transport>,
}

impl AirtableClient {
    /// Client sending real HTTP requests.
    pub fn new(config: AirtableConfig) -> Result<Self, CrawlError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Client sending requests through `transport`.
    pub fn with_transport(config: AirtableConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &AirtableConfig {
        &self.config
    }

    /// `<api_root>/<base_id>/<table>`, with each segment percent-encoded.
    pub fn table_api_url(&self, base_id: &str, table: &str) -> Result<String, CrawlError> {
        let mut url = reqwest::Url::parse(&self.config.api_root).map_err(|e| {
            CrawlError::InvalidConfig(format!("API root '{}': {}", self.config.api_root, e))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                CrawlError::InvalidConfig(format!(
                    "API root '{}' cannot take path segments",
                    self.config.api_root
                ))
            })?
            .pop_if_empty()
            .push(base_id)
            .push(table);
        Ok(url.to_string())
    }

    /// Id of the first record whose `key_field` equals `value`, if any.
    pub fn find_record(
        &self,
        base_id: &str,
        table: &str,
        key_field: &str,
        value: &Value,
    ) -> Result<Option<String>, CrawlError> {
        let request = ApiRequest {
            method: Method::Get,
            url: self.table_api_url(base_id, table)?,
            query: vec![
                ("maxRecords".to_string(), "1".to_string()),
                ("filterByFormula".to_string(), eq_formula(key_field, value)),
            ],
            body: None,
        };
        let response = self.execute(&request)?;
        let list: RecordList = parse_body(&response)?;
        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    /// Create a record and return the id Airtable assigned to it.
    pub fn create_record(&self, base_id: &str, table: &str, fields: &Fields) -> Result<String, CrawlError> {
        let request = ApiRequest {
            method: Method::Post,
            url: self.table_api_url(base_id, table)?,
            query: Vec::new(),
            body: Some(json!({ "fields": fields })),
        };
        let response = self.execute(&request)?;
        match parse_body(&response)? {
            CreateResponse::Single { id } => Ok(id),
            CreateResponse::Batch { records } => records
                .into_iter()
                .next()
                .map(|r| r.id)
                .ok_or_else(|| CrawlError::UnexpectedResponse {
                    detail: "create returned an empty record list".into(),
                }),
        }
    }

    /// Return the id of the record whose `key_field` matches `fields[key_field]`,
    /// creating the record from `fields` when none exists.
    pub fn upsert_record(
        &self,
        base_id: &str,
        table: &str,
        key_field: &str,
        fields: &Fields,
    ) -> Result<String, CrawlError> {
        let value = fields
            .get(key_field)
            .ok_or_else(|| CrawlError::MissingKeyField {
                field: key_field.to_string(),
            })?;

        if let Some(id) = self.find_record(base_id, table, key_field, value)? {
            info!("Found existing record {} in {}/{}", id, base_id, table);
            return Ok(id);
        }

        let id = self.create_record(base_id, table, fields)?;
        info!("Created record {} in {}/{}", id, base_id, table);
        Ok(id)
    }

    /// Send `request` and turn any non-2xx answer into [`CrawlError::RemoteApi`].
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, CrawlError> {
        debug!("{:?} {}", request.method, request.url);
        let response = self.transport.send(request)?;
        debug!("→ HTTP {} ({} bytes)", response.status, response.body.len());
        if !response.is_success() {
            return Err(CrawlError::RemoteApi {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(response: &ApiResponse) -> Result<T, CrawlError> {
    serde_json::from_str(&response.body).map_err(|e| CrawlError::UnexpectedResponse {
        detail: format!("{}: {}", e, response.body),
    })
}

/// Airtable formula testing `{field}` for equality with `value`.
///
/// Strings are single-quoted with `\` and `'` escaped; numbers are written
/// as-is; booleans and null map to `TRUE()`, `FALSE()` and `BLANK()`.
/// Arrays and objects compare against their JSON text.
pub fn eq_formula(field: &str, value: &Value) -> String {
    format!("{{{}}} = {}", field, formula_literal(value))
}

fn formula_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Null => "BLANK()".to_string(),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}
