use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use serde_json::Value;

use crate::store::{DocumentStore, StoreError};

const LIST_PAGE_SIZE: usize = 300;

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
  pub project_id: String,
  pub access_token: Option<String>,
}

impl FirestoreConfig {
  // Public ranking data is readable without credentials; a bearer token is
  // only needed for locked-down databases.
  pub fn from_env() -> Result<FirestoreConfig, StoreError> {
    let project_id = std::env::var("FIRESTORE_PROJECT_ID")
      .ok()
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
      .ok_or_else(|| StoreError::denied("Missing FIRESTORE_PROJECT_ID"))?;

    let access_token = std::env::var("FIRESTORE_ACCESS_TOKEN")
      .ok()
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty());

    Ok(FirestoreConfig {
      project_id,
      access_token,
    })
  }
}

pub struct FirestoreClient {
  config: FirestoreConfig,
}

impl FirestoreClient {
  pub fn new(config: FirestoreConfig) -> FirestoreClient {
    FirestoreClient { config }
  }

  fn documents_base(&self) -> String {
    format!(
      "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
      self.config.project_id
    )
  }

  async fn get_json(&self, url: &str) -> Result<Option<Value>, StoreError> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
      .with_native_roots()
      .map_err(|e| StoreError::transport(e.to_string()))?
      .https_or_http()
      .enable_http1()
      .build();

    let client =
      hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

    let mut builder = Request::builder()
      .method(Method::GET)
      .uri(url)
      .header(ACCEPT, "application/json");
    if let Some(token) = self.config.access_token.as_deref() {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = builder
      .body(Empty::<Bytes>::new())
      .map_err(|e| StoreError::transport(e.to_string()))?;

    let resp = client
      .request(req)
      .await
      .map_err(|e| StoreError::transport(e.to_string()))?;

    let status = resp.status();
    let body_bytes = resp
      .into_body()
      .collect()
      .await
      .map_err(|e| StoreError::transport(e.to_string()))?
      .to_bytes();

    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
      return Err(StoreError::denied(body_snippet(&body_bytes)));
    }
    if status != StatusCode::OK {
      return Err(StoreError::transport(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body_snippet(&body_bytes)
      )));
    }

    serde_json::from_slice::<Value>(&body_bytes)
      .map(Some)
      .map_err(|e| StoreError::invalid_response(format!("invalid json response: {e}")))
  }

  async fn post_json(&self, url: &str, body: &Value) -> Result<Value, StoreError> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
      .with_native_roots()
      .map_err(|e| StoreError::transport(e.to_string()))?
      .https_or_http()
      .enable_http1()
      .build();

    let client =
      hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

    let body_str = serde_json::to_string(body).map_err(|e| StoreError::transport(e.to_string()))?;

    let mut builder = Request::builder()
      .method(Method::POST)
      .uri(url)
      .header(ACCEPT, "application/json")
      .header(CONTENT_TYPE, "application/json");
    if let Some(token) = self.config.access_token.as_deref() {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = builder
      .body(Full::new(Bytes::from(body_str)))
      .map_err(|e| StoreError::transport(e.to_string()))?;

    let resp = client
      .request(req)
      .await
      .map_err(|e| StoreError::transport(e.to_string()))?;

    let status = resp.status();
    let body_bytes = resp
      .into_body()
      .collect()
      .await
      .map_err(|e| StoreError::transport(e.to_string()))?
      .to_bytes();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
      return Err(StoreError::denied(body_snippet(&body_bytes)));
    }
    if status != StatusCode::OK {
      return Err(StoreError::transport(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body_snippet(&body_bytes)
      )));
    }

    serde_json::from_slice::<Value>(&body_bytes)
      .map_err(|e| StoreError::invalid_response(format!("invalid json response: {e}")))
  }
}

fn body_snippet(bytes: &Bytes) -> String {
  String::from_utf8_lossy(bytes).chars().take(600).collect()
}

fn doc_id_from_name(name: &str) -> String {
  name.rsplit('/').next().unwrap_or(name).to_string()
}

// Firestore's REST representation wraps every field in a type tag
// ({"stringValue": ...}, {"integerValue": "123"}, {"mapValue": {"fields":
// ...}}, ...). Normalization works on plain JSON, so documents are unwrapped
// here. Integer values arrive as decimal strings.
fn decode_value(value: &Value) -> Value {
  let Some(obj) = value.as_object() else {
    return Value::Null;
  };

  if let Some(s) = obj.get("stringValue").and_then(|v| v.as_str()) {
    return Value::String(s.to_string());
  }
  if let Some(raw) = obj.get("integerValue").and_then(|v| v.as_str()) {
    if let Ok(n) = raw.parse::<i64>() {
      return Value::from(n);
    }
    return Value::String(raw.to_string());
  }
  if let Some(n) = obj.get("doubleValue").and_then(|v| v.as_f64()) {
    return Value::from(n);
  }
  if let Some(b) = obj.get("booleanValue").and_then(|v| v.as_bool()) {
    return Value::Bool(b);
  }
  if obj.contains_key("nullValue") {
    return Value::Null;
  }
  if let Some(s) = obj.get("timestampValue").and_then(|v| v.as_str()) {
    return Value::String(s.to_string());
  }
  if let Some(s) = obj.get("referenceValue").and_then(|v| v.as_str()) {
    return Value::String(s.to_string());
  }
  if let Some(fields) = obj.get("mapValue").and_then(|v| v.get("fields")) {
    return decode_fields(fields);
  }
  if obj.get("mapValue").is_some() {
    // Empty map: no "fields" key at all.
    return Value::Object(serde_json::Map::new());
  }
  if let Some(array) = obj.get("arrayValue") {
    let items = array
      .get("values")
      .and_then(|v| v.as_array())
      .map(|values| values.iter().map(decode_value).collect())
      .unwrap_or_default();
    return Value::Array(items);
  }

  Value::Null
}

fn decode_fields(fields: &Value) -> Value {
  let mut out = serde_json::Map::new();
  if let Some(map) = fields.as_object() {
    for (key, value) in map {
      out.insert(key.clone(), decode_value(value));
    }
  }
  Value::Object(out)
}

fn decode_document(doc: &Value) -> Value {
  doc
    .get("fields")
    .map(decode_fields)
    .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

#[async_trait]
impl DocumentStore for FirestoreClient {
  async fn get_aggregate(
    &self,
    collection: &str,
    doc_id: &str,
    sub_path: Option<(&str, &str)>,
  ) -> Result<Option<Value>, StoreError> {
    let mut url = format!("{}/{}/{}", self.documents_base(), collection, doc_id);
    if let Some((subcollection, sub_doc)) = sub_path {
      url.push_str(&format!("/{}/{}", subcollection, sub_doc));
    }

    let raw = self.get_json(&url).await?;
    Ok(raw.map(|doc| decode_document(&doc)))
  }

  async fn query_recent(
    &self,
    collection: &str,
    doc_id: &str,
    subcollection: &str,
    order_by: &str,
    descending: bool,
    limit: usize,
  ) -> Result<Vec<Value>, StoreError> {
    let url = format!("{}/{}/{}:runQuery", self.documents_base(), collection, doc_id);
    let body = serde_json::json!({
      "structuredQuery": {
        "from": [{ "collectionId": subcollection }],
        "orderBy": [{
          "field": { "fieldPath": order_by },
          "direction": if descending { "DESCENDING" } else { "ASCENDING" },
        }],
        "limit": limit,
      }
    });

    let raw = self.post_json(&url, &body).await?;
    let rows = raw
      .as_array()
      .ok_or_else(|| StoreError::invalid_response("runQuery response is not an array"))?;

    // Rows without a "document" key are progress/readTime markers.
    Ok(
      rows
        .iter()
        .filter_map(|row| row.get("document"))
        .map(decode_document)
        .collect(),
    )
  }

  async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
    let base = format!("{}/{}", self.documents_base(), collection);
    let mut out: Vec<(String, Value)> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let url = match page_token.as_deref() {
        Some(token) => format!("{base}?pageSize={LIST_PAGE_SIZE}&pageToken={token}"),
        None => format!("{base}?pageSize={LIST_PAGE_SIZE}"),
      };

      let Some(page) = self.get_json(&url).await? else {
        // An empty collection lists as an empty page, not a 404; treat a 404
        // (collection parent missing) the same way.
        return Ok(out);
      };

      if let Some(docs) = page.get("documents").and_then(|v| v.as_array()) {
        for doc in docs {
          let id = doc
            .get("name")
            .and_then(|v| v.as_str())
            .map(doc_id_from_name)
            .unwrap_or_default();
          if id.is_empty() {
            continue;
          }
          out.push((id, decode_document(doc)));
        }
      }

      page_token = page
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty());
      if page_token.is_none() {
        return Ok(out);
      }
    }
  }
}
