use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{IngredientSection, RecipeCandidate};
use crate::config::RecipeConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("recipe provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("recipe provider returned {status}: {message}")]
    Status { status: i64, message: String },
    #[error("recipe {0} not found")]
    NotFound(String),
    #[error("invalid recipe id {0:?}")]
    InvalidId(String),
}

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]{0,199}$").unwrap();
}

/// Recipe ids end up in the upstream URL path, so only plain slugs pass.
pub fn check_slug(id: &str) -> Result<&str, ProviderError> {
    if SLUG_RE.is_match(id) {
        Ok(id)
    } else {
        Err(ProviderError::InvalidId(id.to_string()))
    }
}

impl ProviderError {
    pub fn status(&self) -> axum::http::StatusCode {
        match self {
            ProviderError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ProviderError::InvalidId(_) => axum::http::StatusCode::BAD_REQUEST,
            _ => axum::http::StatusCode::BAD_GATEWAY,
        }
    }
}

/// Source of recipe candidates. Failures are surfaced, never retried here.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<RecipeCandidate>, ProviderError>;
    async fn fetch_detail(&self, id: &str) -> Result<RecipeCandidate, ProviderError>;
}

// ---- Yummy API wire types ----

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    recipes: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    id: String,
    title: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Detail {
    id: String,
    title: String,
    slug: String,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cooking_time: Option<u32>,
    #[serde(default)]
    serving_min: u32,
    #[serde(default)]
    serving_max: u32,
    #[serde(default)]
    ingredient_type: Vec<DetailSection>,
    #[serde(default)]
    tags: Vec<DetailTag>,
}

#[derive(Debug, Deserialize)]
struct DetailSection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    ingredients: Vec<DetailIngredient>,
}

#[derive(Debug, Deserialize)]
struct DetailIngredient {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct DetailTag {
    name: String,
}

fn difficulty_from_tags(tags: &[DetailTag]) -> &'static str {
    for tag in tags {
        let t = tag.name.to_lowercase();
        if t.contains("mudah") || t.contains("easy") {
            return "Easy";
        }
        if t.contains("sulit") || t.contains("hard") {
            return "Hard";
        }
    }
    "Medium"
}

fn servings_label(min: u32, max: u32) -> Option<String> {
    match (min, max) {
        (0, 0) => None,
        (min, max) if max > min => Some(format!("{min}-{max} porsi")),
        (min, _) => Some(format!("{min} porsi")),
    }
}

impl From<Detail> for RecipeCandidate {
    fn from(d: Detail) -> Self {
        Self {
            difficulty: Some(difficulty_from_tags(&d.tags).to_string()),
            servings: servings_label(d.serving_min, d.serving_max),
            id: d.id,
            slug: d.slug,
            title: d.title,
            description: d.description.filter(|s| !s.is_empty()),
            image_url: d.cover_url.filter(|s| !s.is_empty()),
            cooking_minutes: d.cooking_time,
            sections: d
                .ingredient_type
                .into_iter()
                .map(|s| IngredientSection {
                    name: s.name,
                    items: s.ingredients.into_iter().map(|i| i.description).collect(),
                })
                .collect(),
        }
    }
}

fn unwrap_envelope<T>(env: Envelope<T>) -> Result<T, ProviderError> {
    if env.status != 200 {
        return Err(ProviderError::Status {
            status: env.status,
            message: env.message,
        });
    }
    env.data.ok_or(ProviderError::Status {
        status: env.status,
        message: "missing data".into(),
    })
}

#[derive(Clone)]
pub struct YummyProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YummyProvider {
    pub fn new(cfg: &RecipeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RecipeProvider for YummyProvider {
    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<RecipeCandidate>, ProviderError> {
        let url = format!("{}/api/recipes", self.base_url);
        let list: Envelope<ListData> = self.client.get(&url).send().await?.json().await?;
        let entries = unwrap_envelope(list)?.recipes;

        let mut out = Vec::with_capacity(limit.min(entries.len()));
        for entry in entries.into_iter().take(limit) {
            match self.fetch_detail(&entry.slug).await {
                Ok(detail) => out.push(detail),
                Err(e) => {
                    // keep the bare entry; with no ingredients it is never ranked
                    warn!(error = %e, slug = %entry.slug, "recipe detail fetch failed");
                    out.push(RecipeCandidate {
                        id: entry.id,
                        slug: entry.slug,
                        title: entry.title,
                        description: None,
                        image_url: None,
                        cooking_minutes: None,
                        servings: None,
                        difficulty: None,
                        sections: Vec::new(),
                    });
                }
            }
        }
        debug!(count = out.len(), "recipe candidates fetched");
        Ok(out)
    }

    async fn fetch_detail(&self, id: &str) -> Result<RecipeCandidate, ProviderError> {
        let slug = check_slug(id)?;
        let url = format!("{}/api/recipe/detail/{}", self.base_url, slug);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        let detail: Envelope<Detail> = resp.json().await?;
        Ok(unwrap_envelope(detail)?.into())
    }
}
