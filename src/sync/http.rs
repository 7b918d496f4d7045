//! HTTP implementation of the remote backend boundary
//!
//! Talks to a REST backend with id-keyed JSON upserts. Authentication is
//! a bearer token resolved entirely outside this crate.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::RemoteApi;
use crate::error::SyncError;
use crate::models::{Exercise, Session, SetEntry};

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn put_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), SyncError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .authorized(self.client.put(&url).json(body))
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Unauthenticated),
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(SyncError::Rejected(format!("{s}: {text}")))
            }
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn upsert_set(&self, entry: &SetEntry) -> Result<(), SyncError> {
        self.put_json(&format!("sets/{}", entry.id), entry).await
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), SyncError> {
        self.put_json(&format!("sessions/{}", session.id), session)
            .await
    }

    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<Exercise>, SyncError> {
        let url = format!("{}/users/{owner_id}/exercises", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => response
                .json::<Vec<Exercise>>()
                .await
                .map_err(|e| SyncError::Network(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Unauthenticated),
            s => Err(SyncError::Network(format!("exercise fetch failed: {s}"))),
        }
    }
}
