use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{LogStore, StoreError, StoreResult};
use crate::model::{ChartAggregate, ChartPeriod, LogInfo, LogLevel, LogsResponse};
use crate::query::QueryDescriptor;

/// Longest slice of an error body carried into the error message
const MAX_ERROR_BODY: usize = 200;

/// A log store reached over HTTP
pub struct HttpStore {
    base_url: String,
    client: Client,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Vec<u8>> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(url));
        }
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(StoreError::Http {
                status: status.as_u16(),
                message: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        pairs: &[(&str, String)],
    ) -> StoreResult<T> {
        let body = self
            .send(self.request(Method::GET, path).query(pairs))
            .await?;
        decode(&body)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(body).map_err(|e| StoreError::Decode(e.to_string()))
}

fn chart_pairs(period: ChartPeriod, levels: Option<&[LogLevel]>) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("period", period.as_str().to_string())];
    if let Some(levels) = levels {
        let joined: Vec<&str> = levels.iter().map(|l| l.as_str()).collect();
        pairs.push(("levels", joined.join(",")));
    }
    pairs
}

#[async_trait::async_trait]
impl LogStore for HttpStore {
    async fn logs(&self, query: &QueryDescriptor) -> StoreResult<LogsResponse> {
        self.get_json("/logs", &query.to_pairs()).await
    }

    async fn log_info(&self) -> StoreResult<LogInfo> {
        self.get_json("/logs/info", &[]).await
    }

    async fn chart_data(
        &self,
        period: ChartPeriod,
        levels: Option<&[LogLevel]>,
    ) -> StoreResult<ChartAggregate> {
        self.get_json("/logs/chart-data", &chart_pairs(period, levels))
            .await
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        self.get_json("/logs/categories", &[]).await
    }

    async fn functions(&self) -> StoreResult<Vec<String>> {
        self.get_json("/logs/functions", &[]).await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, "/logs")).await?;
        Ok(())
    }

    fn name(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = HttpStore::new("http://localhost:8000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("/logs"), "http://localhost:8000/api/logs");
        assert_eq!(store.name(), "http://localhost:8000/api");
    }

    #[test]
    fn test_chart_pairs() {
        assert_eq!(
            chart_pairs(ChartPeriod::Day, None),
            vec![("period", "24h".to_string())]
        );
        let levels = [LogLevel::Info, LogLevel::Error];
        assert_eq!(
            chart_pairs(ChartPeriod::Week, Some(&levels)),
            vec![("period", "7d".to_string()), ("levels", "INFO,ERROR".to_string())]
        );
    }

    #[test]
    fn test_body_decode_error_is_classified() {
        let err = decode::<LogInfo>(b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert!(!err.is_not_found());
    }
}
