//! Shared test helpers for Graph API integration tests
//!
//! Provides wiremock-based mock server setup for the children and item
//! endpoints, and a byte-range aware responder standing in for a
//! pre-authorized content URL.

use std::sync::{Arc, Mutex};

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ripdrive_core::ports::TransferProgress;
use ripdrive_graph::children::CHILDREN_SELECT;
use ripdrive_graph::client::GraphClient;

/// Starts a mock server and returns a GraphClient pointing at it
pub async fn setup_graph_mock() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url("test-access-token", server.uri()).with_max_retries(1);
    (server, client)
}

/// Mounts the first children page of `container`
///
/// When `next_token` is set, the page carries an absolute `@odata.nextLink`
/// with `$skiptoken=<next_token>`.
pub async fn mount_children_page(
    server: &MockServer,
    container: &str,
    items: serde_json::Value,
    next_token: Option<&str>,
) {
    let mut body = serde_json::json!({ "value": items });
    if let Some(token) = next_token {
        body["@odata.nextLink"] = serde_json::Value::String(format!(
            "{}/me/drive/items/{}/children?$skiptoken={}",
            server.uri(),
            container,
            token
        ));
    }

    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{container}/children")))
        .and(query_param("$select", CHILDREN_SELECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a continuation page reached through `$skiptoken=<token>`
pub async fn mount_continuation_page(
    server: &MockServer,
    container: &str,
    token: &str,
    items: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{container}/children")))
        .and(query_param("$skiptoken", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": items
        })))
        .mount(server)
        .await;
}

/// Mounts `GET /me/drive/items/{id}` returning the given JSON body
pub async fn mount_item(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Deterministic test content of `len` bytes
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Serves `content`, honouring `Range: bytes=a-b` and `bytes=a-`
pub struct RangeResponder {
    content: Vec<u8>,
}

impl RangeResponder {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }
}

fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let range = value.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = if end.is_empty() {
        len.checked_sub(1)?
    } else {
        end.parse().ok()?
    };
    (start <= end && end < len).then_some((start, end))
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match range {
            None => ResponseTemplate::new(200).set_body_bytes(self.content.clone()),
            Some(value) => match parse_range(&value, self.content.len()) {
                Some((start, end)) => ResponseTemplate::new(206)
                    .insert_header(
                        "Content-Range",
                        format!("bytes {}-{}/{}", start, end, self.content.len()).as_str(),
                    )
                    .set_body_bytes(self.content[start..=end].to_vec()),
                None => ResponseTemplate::new(416),
            },
        }
    }
}

/// Mounts a content URL at `/content/{name}` and returns its absolute URL
pub async fn mount_content(server: &MockServer, name: &str, content: Vec<u8>) -> String {
    let route = format!("/content/{name}");
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .respond_with(RangeResponder::new(content))
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

/// Records every progress snapshot it receives
#[derive(Default, Clone)]
pub struct ProgressRecorder {
    events: Arc<Mutex<Vec<TransferProgress>>>,
}

impl ProgressRecorder {
    pub fn callback(&self) -> impl Fn(TransferProgress) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |progress| events.lock().unwrap().push(progress)
    }

    pub fn events(&self) -> Vec<TransferProgress> {
        self.events.lock().unwrap().clone()
    }
}
