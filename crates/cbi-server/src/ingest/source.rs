//! Row-list data source client
//!
//! Fetches `GET {base}/{resource}.json?$limit=n`. An endpoint's `limit` is the
//! total cap for a run. Caps above the page size are split into
//! `$limit`/`$offset` pages ordered by the row identifier (`$order=:id`) so
//! pages never overlap; a single-page fetch sends `$limit` alone.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::error::IngestError;
use super::record::SourceRecord;
use super::schema::SourceEndpoint;

/// Default data-source base URL.
pub const DEFAULT_SODA_BASE_URL: &str = "https://data.cityofchicago.org/resource";

/// Default maximum rows per request.
pub const DEFAULT_SODA_PAGE_SIZE: u32 = 1000;

/// Fetches every record of one source endpoint, or fails the run.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, endpoint: &SourceEndpoint) -> Result<Vec<SourceRecord>, IngestError>;
}

pub struct SodaClient {
    client: Client,
    base_url: String,
    app_token: Option<String>,
    page_size: u32,
}

impl SodaClient {
    pub fn new(
        base_url: impl Into<String>,
        app_token: Option<String>,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_token,
            page_size: page_size.max(1),
        })
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}.json", self.base_url, resource)
    }

    async fn fetch_page(
        &self,
        url: &str,
        limit: u32,
        offset: u32,
        ordered: bool,
    ) -> Result<Vec<SourceRecord>, IngestError> {
        let mut params = vec![("$limit", limit.to_string())];
        if ordered {
            params.push(("$order", ":id".to_string()));
        }
        if offset > 0 {
            params.push(("$offset", offset.to_string()));
        }

        let mut request = self.client.get(url).query(&params);
        if let Some(ref token) = self.app_token {
            request = request.header("X-App-Token", token);
        }

        let transport = |source| IngestError::Transport {
            url: url.to_string(),
            source,
        };

        let body = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .bytes()
            .await
            .map_err(transport)?;

        parse_rows(url, &body)
    }
}

/// Decode a row-list body: a JSON array whose items are all objects.
pub fn parse_rows(url: &str, body: &[u8]) -> Result<Vec<SourceRecord>, IngestError> {
    let malformed = |message: String| IngestError::MalformedBody {
        url: url.to_string(),
        message,
    };

    let value: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(malformed("expected a JSON array".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(malformed(format!("item {} is not an object", i))),
        })
        .collect()
}

#[async_trait]
impl RecordSource for SodaClient {
    async fn fetch(&self, endpoint: &SourceEndpoint) -> Result<Vec<SourceRecord>, IngestError> {
        let url = self.resource_url(endpoint.resource);
        let ordered = endpoint.limit > self.page_size;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset < endpoint.limit {
            let limit = (endpoint.limit - offset).min(self.page_size);
            let page = self.fetch_page(&url, limit, offset, ordered).await?;
            let received = page.len();
            records.extend(page);

            debug!(url = %url, offset, received, "Fetched page");

            if received < limit as usize {
                break;
            }
            offset += limit;
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_trims_trailing_slash() {
        let client =
            SodaClient::new("http://soda.test/resource/", None, 1000, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.resource_url("wrvz-psew"), "http://soda.test/resource/wrvz-psew.json");
    }

    #[test]
    fn test_parse_rows_accepts_array_of_objects() {
        let rows = parse_rows("u", br#"[{"trip_id": "a"}, {"trip_id": "b"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["trip_id"], "b");
    }

    #[test]
    fn test_parse_rows_rejects_non_array() {
        let err = parse_rows("u", br#"{"error": true, "message": "bad query"}"#).unwrap_err();
        assert!(matches!(err, IngestError::MalformedBody { .. }));
    }

    #[test]
    fn test_parse_rows_rejects_scalar_items() {
        let err = parse_rows("u", br#"[{"trip_id": "a"}, 3]"#).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn test_parse_rows_rejects_invalid_json() {
        assert!(parse_rows("u", b"<html>").is_err());
    }
}
