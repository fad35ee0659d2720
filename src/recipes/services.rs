use tracing::{debug, instrument};

use super::provider::{ProviderError, RecipeProvider};
use super::ranking::{rank_recipes, RankingOptions, Recommendations};
use crate::config::RecipeConfig;

/// Fetches candidates and ranks them against the pantry. With an empty
/// pantry only a short unscored list is fetched.
#[instrument(skip(provider, pantry_names, cfg), fields(pantry = pantry_names.len()))]
pub async fn recommend(
    provider: &dyn RecipeProvider,
    pantry_names: &[String],
    cfg: &RecipeConfig,
) -> Result<Recommendations, ProviderError> {
    let opts = RankingOptions {
        top_n: cfg.top_n,
        fallback_size: cfg.fallback_size,
    };

    let limit = if pantry_names.is_empty() {
        cfg.fallback_size
    } else {
        cfg.fetch_limit
    };

    let candidates = provider.fetch_candidates(limit).await?;
    let result = rank_recipes(candidates, pantry_names, opts);
    debug!(returned = result.len(), "recommendations ready");
    Ok(result)
}
