use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{Level, event, instrument, warn};

use super::{Page, PageFetcher, PageRequest};
use crate::profile::ListProfile;
use crate::record::{EntityRecord, RecordShape};

/// Loads pages from a REST endpoint with `searchParam` / `pageNumber` query
/// parameters.
///
/// The response is either a bare array (unpaginated endpoints) or an object
/// holding the array under the profile's `records_field` plus `hasMore` or a
/// total `count`.
#[derive(Clone)]
pub struct RestPageFetcher {
    client: reqwest::Client,
    url: String,
    records_field: Option<String>,
    shape: RecordShape,
    paginated: bool,
}

impl RestPageFetcher {
    pub fn new(base_url: &str, profile: &ListProfile, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base_url, profile))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, profile: &ListProfile) -> Self {
        Self {
            client,
            url: join_url(base_url, &profile.path),
            records_field: profile.records_field.clone(),
            shape: profile.shape.clone(),
            paginated: profile.paginated,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query_params(&self, request: &PageRequest) -> Vec<(String, String)> {
        let mut params = vec![("searchParam".to_string(), request.search_text.clone())];
        if self.paginated {
            params.push(("pageNumber".to_string(), request.page.to_string()));
        }
        params.extend(
            request
                .filters
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        params
    }

    /// Turn a response body into a page. Records without a usable id are
    /// dropped with a warning rather than failing the whole page.
    pub fn parse_page(&self, mut body: Value, request: &PageRequest) -> Result<Page> {
        let has_more_flag = body.get("hasMore").and_then(Value::as_bool);
        let total = body.get("count").and_then(|count| {
            count
                .as_u64()
                .or_else(|| count.as_str().and_then(|s| s.parse().ok()))
        });

        let items = match &self.records_field {
            Some(field) => body.get_mut(field).map(Value::take),
            None => Some(body.take()),
        };
        let Some(Value::Array(items)) = items else {
            bail!(
                "response has no `{}` array",
                self.records_field.as_deref().unwrap_or("<root>")
            );
        };

        let mut records: Vec<EntityRecord> = Vec::with_capacity(items.len());
        for item in items {
            match self.shape.decode(item) {
                Ok(record) => records.push(record),
                Err(e) => warn!(page = request.page, "Skipping record: {}", e),
            }
        }

        if !self.paginated {
            return Ok(Page::last(records));
        }
        if let Some(has_more) = has_more_flag {
            return Ok(Page::new(records, has_more));
        }
        if let Some(total) = total {
            return Ok(Page::from_total(records, request.fetched_before, total as usize));
        }
        // No paging metadata: keep going until an empty page
        let has_more = !records.is_empty();
        Ok(Page::new(records, has_more))
    }
}

#[async_trait]
impl PageFetcher for RestPageFetcher {
    #[instrument(level = "debug", skip(self, request), fields(url = %self.url, page = request.page))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let response = self
            .client
            .get(&self.url)
            .query(&self.query_params(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed with status: {}", status));
        }

        let body: Value = response.json().await?;
        let page = self.parse_page(body, request)?;
        event!(
            Level::DEBUG,
            records = page.records.len(),
            has_more = page.has_more,
            "page received"
        );
        Ok(page)
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ListProfile;
    use config::{ProfileSettings, Settings};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn fetcher(name: &str) -> RestPageFetcher {
        let settings = Settings::default();
        let profile = ListProfile::from_settings(name, &settings).unwrap();
        RestPageFetcher::with_client(reqwest::Client::new(), "http://localhost:8080/", &profile)
    }

    fn request(page: u32, fetched_before: usize) -> PageRequest {
        PageRequest {
            search_text: "ana".to_string(),
            filters: BTreeMap::from([("status".to_string(), "open".to_string())]),
            page,
            generation: 1,
            fetched_before,
        }
    }

    #[test]
    fn test_url_and_params() {
        let contacts = fetcher("contacts");
        assert_eq!(contacts.url(), "http://localhost:8080/contacts/");

        let params = contacts.query_params(&request(2, 20));
        assert_eq!(
            params,
            vec![
                ("searchParam".to_string(), "ana".to_string()),
                ("pageNumber".to_string(), "2".to_string()),
                ("status".to_string(), "open".to_string()),
            ]
        );

        // Unpaginated endpoints get no page number
        let integrations = fetcher("integrations");
        assert!(
            integrations
                .query_params(&request(1, 0))
                .iter()
                .all(|(k, _)| k != "pageNumber")
        );
    }

    #[test]
    fn test_parse_has_more_flag() {
        let page = fetcher("contacts")
            .parse_page(
                json!({
                    "contacts": [{"id": 1, "tags": [{"id": 5}]}, {"id": 2}],
                    "count": 100,
                    "hasMore": false
                }),
                &request(1, 0),
            )
            .unwrap();

        assert_eq!(page.records.len(), 2);
        assert!(!page.has_more);
        assert_eq!(page.records[0].tags.len(), 1);
    }

    #[test]
    fn test_parse_derives_has_more_from_count() {
        let body = json!({"contacts": [{"id": 21}, {"id": 22}], "count": "23"});
        let page = fetcher("contacts").parse_page(body, &request(2, 20)).unwrap();
        assert!(page.has_more);

        let body = json!({"contacts": [{"id": 21}, {"id": 22}, {"id": 23}], "count": 23});
        let page = fetcher("contacts").parse_page(body, &request(2, 20)).unwrap();
        assert!(!page.has_more);
    }

    #[test]
    fn test_parse_bare_array_is_last_page() {
        let page = fetcher("integrations")
            .parse_page(
                json!([{"key": "apikey", "value": ""}, {"key": "organization", "value": "acme"}]),
                &request(1, 0),
            )
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1].id.as_str(), "organization");
        assert!(!page.has_more);
    }

    #[test]
    fn test_parse_skips_records_without_id() {
        let page = fetcher("contacts")
            .parse_page(json!({"contacts": [{"name": "x"}, {"id": 4}]}), &request(1, 0))
            .unwrap();
        assert_eq!(page.records.len(), 1);
        // No metadata: a non-empty page implies more may follow
        assert!(page.has_more);
    }

    #[test]
    fn test_parse_missing_array_fails() {
        let result = fetcher("contacts").parse_page(json!({"error": "nope"}), &request(1, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_profile_records_field() {
        let mut settings = Settings::default();
        settings.profiles.insert(
            "queues".to_string(),
            ProfileSettings {
                records_field: Some("queues".to_string()),
                ..ProfileSettings::builtin("connections").unwrap()
            },
        );
        let profile = ListProfile::from_settings("queues", &settings).unwrap();
        let fetcher =
            RestPageFetcher::with_client(reqwest::Client::new(), "http://api", &profile);

        let page = fetcher
            .parse_page(json!({"queues": [{"id": 1}]}), &request(1, 0))
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(fetcher.url(), "http://api/whatsapp/");
    }

    /// Serve one canned HTTP response on a local port. The join handle yields
    /// the raw request head the client sent.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        });
        (base, handle)
    }

    fn local_fetcher(base: &str) -> RestPageFetcher {
        let profile = ListProfile::from_settings("contacts", &Settings::default()).unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        RestPageFetcher::with_client(client, base, &profile)
    }

    #[tokio::test]
    async fn test_fetch_page_over_http() {
        let (base, server) =
            serve_once("200 OK", r#"{"contacts":[{"id":1},{"id":2}],"hasMore":true}"#).await;

        let mut req = request(2, 20);
        req.search_text = "ana maria".to_string();
        let page = local_fetcher(&base).fetch_page(&req).await.unwrap();

        let ids: Vec<String> = page.records.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert!(page.has_more);

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /contacts/?"), "{}", head);
        let request_line = head.lines().next().unwrap();
        assert!(request_line.contains("searchParam=ana+maria"));
        assert!(request_line.contains("pageNumber=2"));
        assert!(request_line.contains("status=open"));
    }

    #[tokio::test]
    async fn test_fetch_page_server_error() {
        let (base, server) =
            serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;

        let err = local_fetcher(&base)
            .fetch_page(&request(1, 0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"), "{}", err);
        server.await.unwrap();
    }
}
