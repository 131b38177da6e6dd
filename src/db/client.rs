//! Generic REST client for the hosted Postgres backend (PostgREST dialect).
//!
//! Rows move in and out as plain `serde_json::Value` records so nothing
//! upstream depends on a database client library's types.

use crate::error::{Result, ScraperError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::env;
use tracing::info;

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    rest_url: String,
}

impl SupabaseClient {
    /// Build a client from `SUPABASE_URL` / `SUPABASE_SERVICE_KEY`.
    pub fn from_env() -> Result<Self> {
        let url = env::var("SUPABASE_URL").map_err(|_| ScraperError::Database {
            message: "SUPABASE_URL environment variable not set".to_string(),
        })?;
        let service_key = env::var("SUPABASE_SERVICE_KEY").map_err(|_| ScraperError::Database {
            message: "SUPABASE_SERVICE_KEY environment variable not set".to_string(),
        })?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", service_key)).map_err(|e| {
            ScraperError::Database {
                message: format!("Invalid service key: {e}"),
            }
        })?;
        let apikey = HeaderValue::from_str(&service_key).map_err(|e| ScraperError::Database {
            message: format!("Invalid service key: {e}"),
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert("apikey", apikey);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        info!("Connected to Supabase at {}", url);

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    /// Select rows. `query` carries PostgREST pairs such as
    /// `("event_id", "eq.abc")` or `("select", "*")`.
    pub async fn select(&self, table: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(query)
            .send()
            .await
            .map_err(|e| db_err(table, "select", e))?;
        Self::rows(table, "select", response).await
    }

    pub async fn insert(&self, table: &str, record: &Value) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .map_err(|e| db_err(table, "insert", e))?;
        Self::rows(table, "insert", response).await
    }

    pub async fn update(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        patch: &Value,
    ) -> Result<Vec<Value>> {
        let response = self
            .http
            .patch(self.table_url(table))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(|e| db_err(table, "update", e))?;
        Self::rows(table, "update", response).await
    }

    /// Insert-or-update on a conflict column
    pub async fn upsert(
        &self,
        table: &str,
        on_conflict: &str,
        record: &Value,
    ) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(record)
            .send()
            .await
            .map_err(|e| db_err(table, "upsert", e))?;
        Self::rows(table, "upsert", response).await
    }

    pub async fn delete(&self, table: &str, filters: &[(&str, &str)]) -> Result<()> {
        let response = self
            .http
            .delete(self.table_url(table))
            .query(filters)
            .send()
            .await
            .map_err(|e| db_err(table, "delete", e))?;

        if !response.status().is_success() {
            return Err(ScraperError::Database {
                message: format!(
                    "delete on {} returned status {}",
                    table,
                    response.status()
                ),
            });
        }
        Ok(())
    }

    async fn rows(table: &str, op: &str, response: reqwest::Response) -> Result<Vec<Value>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::Database {
                message: format!("{} on {} returned status {}: {}", op, table, status, body),
            });
        }

        let value: Value = response.json().await.map_err(|e| ScraperError::Database {
            message: format!("Failed to decode {} response from {}: {e}", op, table),
        })?;

        Ok(match value {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }
}

fn db_err(table: &str, op: &str, e: reqwest::Error) -> ScraperError {
    ScraperError::Database {
        message: format!("{} on {} failed: {e}", op, table),
    }
}
