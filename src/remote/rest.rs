//! REST client for a PostgREST-style backend.

use super::RemoteStore;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::types::{CollectionSpec, Record, RecordKey};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct RestRemote {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RestRemote {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }

    fn url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table.trim_start_matches('/')
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.config.api_key.is_empty() {
            return builder;
        }
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn write_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = self.authorize(builder);
        match self.config.write_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn check(response: Response) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    async fn fetch_all(&self, spec: &CollectionSpec) -> RemoteResult<Vec<Record>> {
        let request = self
            .authorize(self.client.get(self.url(&spec.table)))
            .query(&[("select", "*")])
            .timeout(self.config.read_timeout);

        let response = Self::check(request.send().await?).await?;
        let bytes = response.bytes().await?;
        let rows: Vec<Value> =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;

        let records = rows
            .into_iter()
            .map(|row| {
                Record::from_value(row)
                    .ok_or_else(|| RemoteError::Decode(format!("non-object row in {}", spec.table)))
            })
            .collect::<RemoteResult<Vec<_>>>()?;

        debug!(table = %spec.table, rows = records.len(), "fetched remote table");
        Ok(records)
    }

    async fn upsert(&self, spec: &CollectionSpec, records: &[Record]) -> RemoteResult<()> {
        let request = self
            .write_request(self.client.post(self.url(&spec.table)))
            .query(&[("on_conflict", spec.primary_key.as_str())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);

        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn delete_one(&self, spec: &CollectionSpec, key: &RecordKey) -> RemoteResult<()> {
        let filter = format!("eq.{key}");
        let request = self
            .write_request(self.client.delete(self.url(&spec.table)))
            .query(&[(spec.primary_key.as_str(), filter.as_str())]);

        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn delete_all(&self, spec: &CollectionSpec) -> RemoteResult<()> {
        // The backend refuses unfiltered deletes; match every row that has a key.
        let request = self
            .write_request(self.client.delete(self.url(&spec.table)))
            .query(&[(spec.primary_key.as_str(), "not.is.null")]);

        Self::check(request.send().await?).await?;
        Ok(())
    }
}
