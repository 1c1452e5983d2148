//! Serverless job handler
//!
//! A job is an opaque JSON document of the form
//!
//! ```json
//! {
//!   "id": "job-123",
//!   "input": {
//!     "api": { "method": "POST", "endpoint": "/send" },
//!     "payload": { "text": "a wooden chair" }
//!   }
//! }
//! ```
//!
//! The handler replays it as an HTTP request against the in-process router
//! and wraps whatever the route answered as `{"output": ...}`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::Router;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

/// HTTP call described by a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobCall {
    pub method: String,
    pub endpoint: String,
    pub payload: Value,
}

impl JobCall {
    /// Read the call out of a job, defaulting to `GET /` with an empty payload
    pub fn from_job(job: &Value) -> Self {
        let input = job.get("input");
        let api = input.and_then(|i| i.get("api"));

        let method = api
            .and_then(|a| a.get("method"))
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let endpoint = api
            .and_then(|a| a.get("endpoint"))
            .and_then(Value::as_str)
            .unwrap_or("/")
            .to_string();
        let payload = input
            .and_then(|i| i.get("payload"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        Self {
            method,
            endpoint,
            payload,
        }
    }

    /// Build the HTTP request, or `None` for unsupported methods
    fn to_request(&self) -> Option<Result<Request<Body>, axum::http::Error>> {
        match self.method.as_str() {
            "GET" => {
                let query = query_string(&self.payload);
                let uri = if query.is_empty() {
                    self.endpoint.clone()
                } else if self.endpoint.contains('?') {
                    format!("{}&{}", self.endpoint, query)
                } else {
                    format!("{}?{}", self.endpoint, query)
                };
                Some(Request::builder().method("GET").uri(uri).body(Body::empty()))
            }
            "POST" => Some(
                Request::builder()
                    .method("POST")
                    .uri(&self.endpoint)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(self.payload.to_string())),
            ),
            _ => None,
        }
    }
}

/// Encode a payload object as a query string
///
/// Strings are sent as-is, arrays as repeated keys, nulls are dropped and
/// everything else as its JSON text. Dropping a null leaves the field unset,
/// so the route applies its default instead of parsing an empty string.
fn query_string(payload: &Value) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Value::Object(map) = payload {
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        query.append_pair(key, &scalar_text(item));
                    }
                }
                other => {
                    query.append_pair(key, &scalar_text(other));
                }
            }
        }
    }
    query.finish()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run one job against the router and build the job result
pub async fn handle(router: Router, job: Value) -> Value {
    let call = JobCall::from_job(&job);
    let job_id = job.get("id").and_then(Value::as_str).unwrap_or("-");
    tracing::info!("job {}: {} {}", job_id, call.method, call.endpoint);

    let request = match call.to_request() {
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            return json!({ "error": format!("Invalid endpoint {}: {}", call.endpoint, e) });
        }
        None => return json!({ "error": format!("Method {} not supported", call.method) }),
    };

    let response = match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();

    let bytes = match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return json!({ "error": format!("Failed to read response: {}", e) }),
    };
    tracing::debug!("job {}: {} ({} bytes)", job_id, status, bytes.len());

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(output) => json!({ "output": output }),
        Err(_) => json!({ "output": String::from_utf8_lossy(&bytes) }),
    }
}
