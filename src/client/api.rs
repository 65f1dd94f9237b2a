use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{config::ClientConfig, ClientError};
use crate::{
    auth::dto::{AuthResponse, PublicUser},
    history::{
        dto::CreatedHistoryResponse,
        repo_types::{HistoryEntry, SearchMode},
    },
};

/// The slice of a history entry the list view needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistorySummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub mode: SearchMode,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewHistory {
    pub title: String,
    pub jd: String,
    pub mode: SearchMode,
    pub results: serde_json::Value,
}

#[async_trait]
pub trait HistoryApi: Send + Sync {
    async fn list_history(&self, token: &str) -> Result<Vec<HistorySummary>, ClientError>;
    async fn get_history(&self, token: &str, id: Uuid) -> Result<HistoryEntry, ClientError>;
    async fn add_history(&self, token: &str, entry: &NewHistory)
        -> Result<HistoryEntry, ClientError>;
    async fn delete_history(&self, token: &str, id: Uuid) -> Result<(), ClientError>;
}

#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;
    async fn profile(&self, token: &str) -> Result<PublicUser, ClientError>;
}

/// reqwest-backed implementation of both backend APIs.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn check(res: Response) -> Result<Response, ClientError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        debug!(%status, %message, "backend returned error");
        Err(ClientError::Status { status, message })
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
        Ok(Self::check(res).await?.json::<T>().await?)
    }
}

#[async_trait]
impl HistoryApi for HttpBackend {
    async fn list_history(&self, token: &str) -> Result<Vec<HistorySummary>, ClientError> {
        let res = self
            .client
            .get(self.url("/history"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn get_history(&self, token: &str, id: Uuid) -> Result<HistoryEntry, ClientError> {
        let res = self
            .client
            .get(self.url(&format!("/history/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn add_history(
        &self,
        token: &str,
        entry: &NewHistory,
    ) -> Result<HistoryEntry, ClientError> {
        let res = self
            .client
            .post(self.url("/history"))
            .bearer_auth(token)
            .json(entry)
            .send()
            .await?;
        let created: CreatedHistoryResponse = Self::decode(res).await?;
        Ok(created.history)
    }

    async fn delete_history(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
        let res = self
            .client
            .delete(self.url(&format!("/history/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountApi for HttpBackend {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let res = self
            .client
            .post(self.url("/users"))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let res = self
            .client
            .post(self.url("/users/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn profile(&self, token: &str) -> Result<PublicUser, ClientError> {
        let res = self
            .client
            .get(self.url("/users/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(res).await
    }
}
