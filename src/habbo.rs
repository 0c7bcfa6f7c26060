use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};

/// Profile returned by the Habbo public API.
#[derive(Debug, Clone, Deserialize)]
pub struct HabboProfile {
    pub name: String,
    #[serde(default)]
    pub motto: String,
    #[serde(default, rename = "uniqueId")]
    pub unique_id: String,
}

/// Name resolution against the hotel. Free-text nicks are normalized to the
/// canonical account name before any hierarchy lookup.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, nick: &str) -> AppResult<HabboProfile>;
}

#[derive(Debug, Clone)]
pub struct HabboClient {
    client: reqwest::Client,
    base_url: String,
}

impl HabboClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("HABBO_API_URL")
            .unwrap_or_else(|_| "https://www.habbo.com.br/api/public".to_string());

        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl IdentityResolver for HabboClient {
    async fn resolve(&self, nick: &str) -> AppResult<HabboProfile> {
        let url = format!("{}/users", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("name", nick)])
            .send()
            .await
            .map_err(|err| AppError::internal(format!("habbo api unreachable: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::not_found("Usuário inexistente no Habbo."));
        }

        response
            .json::<HabboProfile>()
            .await
            .map_err(|_| AppError::not_found("Usuário inexistente no Habbo."))
    }
}
