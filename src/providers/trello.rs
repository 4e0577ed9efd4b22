use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use super::CardSink;
use crate::config::TrelloConfig;
use crate::error::SyncError;
use crate::model::card::{CreatedCard, NewCard};

pub struct TrelloClient {
    api_key: String,
    token: String,
    client: reqwest::Client,
    api_base: String,
    card_path: String,
}

impl TrelloClient {
    pub fn new(config: &TrelloConfig) -> Self {
        Self {
            api_key: config.app_key.clone(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            card_path: config.card_path.clone(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn card_path_for(&self, list_id: &str) -> String {
        self.card_path
            .replace("{list_id}", &urlencoding::encode(list_id))
    }

    /// Call `path` under the API base and return the parsed JSON body.
    pub async fn fetch_json(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Value> {
        let url = self.endpoint(path);
        tracing::debug!("Trello {method} {url}");

        let mutating = [Method::POST, Method::PUT, Method::DELETE].contains(&method);
        let mut request = self.client.request(method, &url).query(query);
        if mutating {
            request = request
                .header(CONTENT_TYPE, "application/json; charset=utf-8")
                .header(ACCEPT, "application/json");
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Trello request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                service: "Trello",
                status,
                body,
            }
            .into());
        }

        resp.json().await.context("Failed to parse Trello response")
    }
}

#[async_trait]
impl CardSink for TrelloClient {
    fn name(&self) -> &str {
        "Trello"
    }

    async fn create_card(
        &self,
        name: &str,
        list_id: &str,
        desc: Option<&str>,
    ) -> Result<CreatedCard> {
        let card = NewCard {
            name: name.to_string(),
            id_list: list_id.to_string(),
            desc: desc.map(String::from),
        };
        let body = serde_json::to_value(&card)?;

        let resp = self
            .fetch_json(
                &self.card_path_for(list_id),
                Method::POST,
                Some(&body),
                &self.auth_params(),
            )
            .await
            .with_context(|| format!("Failed to create Trello card {name:?}"))?;

        Ok(created_card(resp))
    }
}

fn created_card(resp: Value) -> CreatedCard {
    match serde_json::from_value(resp) {
        Ok(card) => card,
        Err(e) => {
            tracing::debug!("Unexpected Trello create-card response: {e}");
            CreatedCard::default()
        }
    }
}
