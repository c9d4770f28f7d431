use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use axel_common::TokenPlaceConfig;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::repo::client_slug;

/// Model ids surfaced in quests ahead of whatever the listing puts first.
const FEATURED_PREFERENCE: [&str; 2] = ["llama-3-8b-instruct:alignment", "llama-3-8b-instruct"];

#[derive(Debug, Error)]
pub enum TokenPlaceError {
    #[error("unable to reach token.place at {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("token.place returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("token.place returned invalid JSON: {0}")]
    InvalidJson(String),
}

/// Source of the model name used to enrich quests. `None` covers every
/// failure.
pub trait ModelCatalog {
    fn featured_model(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct TokenPlaceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TokenPlaceClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .with_context(|| "failed to build token.place HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        })
    }

    pub fn from_config(config: &TokenPlaceConfig) -> Result<Self> {
        Self::new(&config.base_url, config.api_key.as_deref(), config.timeout_ms)
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    /// Model identifiers advertised by the deployment, in listing order.
    pub fn list_models(&self) -> Result<Vec<String>, TokenPlaceError> {
        let url = self.models_url();
        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().map_err(|err| TokenPlaceError::Unreachable {
            url: url.clone(),
            reason: err.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TokenPlaceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let payload = response
            .json::<Value>()
            .map_err(|err| TokenPlaceError::InvalidJson(err.to_string()))?;
        let models = extract_model_ids(&payload);
        debug!(count = models.len(), "listed token.place models");
        Ok(models)
    }
}

impl ModelCatalog for TokenPlaceClient {
    fn featured_model(&self) -> Option<String> {
        match self.list_models() {
            Ok(models) => select_featured(&models),
            Err(err) => {
                warn!(error = %err, "token.place enrichment unavailable");
                None
            }
        }
    }
}

/// Accepts `{"data": [...]}`, `{"models": [...]}` or a bare array whose items
/// are strings or objects carrying `id`, `model` or `name`.
fn extract_model_ids(payload: &Value) -> Vec<String> {
    let items = match payload {
        Value::Object(map) => map
            .get("data")
            .and_then(Value::as_array)
            .or_else(|| map.get("models").and_then(Value::as_array)),
        Value::Array(items) => Some(items),
        _ => None,
    };

    let mut seen = HashSet::new();
    items
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.as_str()),
            Value::Object(fields) => ["id", "model", "name"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

fn select_featured(models: &[String]) -> Option<String> {
    FEATURED_PREFERENCE
        .iter()
        .find(|preferred| models.iter().any(|model| model == *preferred))
        .map(|preferred| preferred.to_string())
        .or_else(|| models.first().cloned())
}

/// Quest text for a pairing that involves token.place.
pub fn quest_detail(token_slug: &str, other_slug: &str, featured: Option<&str>) -> String {
    match featured {
        Some(model) => format!(
            "{token_slug} can broker token.place auth via {model} while gabriel audits secrets so {other_slug} ships safely."
        ),
        None => format!(
            "{token_slug} can broker token.place auth while gabriel audits secrets so {other_slug} ships safely."
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIntegration {
    pub token_repo: String,
    pub client_repo: String,
    pub detail: String,
}

/// Pairs every token.place repository with every other repository.
pub fn plan_client_integrations<'a, I>(
    repos: I,
    catalog: Option<&dyn ModelCatalog>,
) -> Vec<ClientIntegration>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let unique: Vec<String> = repos
        .into_iter()
        .filter_map(client_slug)
        .filter(|slug| seen.insert(slug.to_lowercase()))
        .collect();

    let (token_repos, client_repos): (Vec<&String>, Vec<&String>) = unique
        .iter()
        .partition(|slug| slug.to_lowercase().contains("token"));
    if token_repos.is_empty() || client_repos.is_empty() {
        return Vec::new();
    }

    let featured = catalog.and_then(|catalog| catalog.featured_model());
    let featured = featured.as_deref();
    token_repos
        .iter()
        .flat_map(|token_repo| {
            client_repos.iter().map(move |client_repo| ClientIntegration {
                token_repo: token_repo.to_string(),
                client_repo: client_repo.to_string(),
                detail: quest_detail(token_repo, client_repo, featured),
            })
        })
        .collect()
}
