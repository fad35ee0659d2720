use serde::Serialize;

use crate::matching::{match_all, match_percentage, MatchResult};

use super::model::RecipeCandidate;

/// Share of ingredients on hand at which a recipe is flagged cookable.
pub const CAN_MAKE_PERCENTAGE: u8 = 70;

#[derive(Debug, Clone, Copy)]
pub struct RankingOptions {
    pub top_n: usize,
    pub fallback_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeScore {
    pub matched_count: usize,
    pub total_count: usize,
    pub match_percentage: u8,
    pub can_make: bool,
    pub matches: Vec<MatchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedRecipe {
    #[serde(flatten)]
    pub recipe: RecipeCandidate,
    #[serde(rename = "match")]
    pub score: RecipeScore,
}

/// Either a scored shortlist, or unscored candidates when nothing could be
/// scored (empty pantry, or no candidate carried ingredients).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "recipes", rename_all = "snake_case")]
pub enum Recommendations {
    Ranked(Vec<RankedRecipe>),
    Fallback(Vec<RecipeCandidate>),
}

impl Recommendations {
    pub fn len(&self) -> usize {
        match self {
            Recommendations::Ranked(r) => r.len(),
            Recommendations::Fallback(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fallback(mut candidates: Vec<RecipeCandidate>, size: usize) -> Recommendations {
    candidates.truncate(size);
    Recommendations::Fallback(candidates)
}

fn score(recipe: &RecipeCandidate, pantry_names: &[String]) -> Option<RecipeScore> {
    let ingredients = recipe.ingredient_texts();
    if ingredients.is_empty() {
        return None;
    }

    let summary = match_all(&ingredients, pantry_names);
    let pct = match_percentage(summary.matched_count, summary.total_count);

    Some(RecipeScore {
        matched_count: summary.matched_count,
        total_count: summary.total_count,
        match_percentage: pct,
        can_make: pct >= CAN_MAKE_PERCENTAGE,
        matches: summary.matches,
    })
}

/// Scores every candidate against the pantry and returns the best `top_n`,
/// by match percentage then matched count. Equal keys keep provider order.
pub fn rank_recipes(
    candidates: Vec<RecipeCandidate>,
    pantry_names: &[String],
    opts: RankingOptions,
) -> Recommendations {
    if pantry_names.is_empty() {
        return fallback(candidates, opts.fallback_size);
    }

    let mut ranked: Vec<RankedRecipe> = candidates
        .iter()
        .filter_map(|recipe| {
            score(recipe, pantry_names).map(|score| RankedRecipe {
                recipe: recipe.clone(),
                score,
            })
        })
        .collect();

    if ranked.is_empty() {
        return fallback(candidates, opts.fallback_size);
    }

    ranked.sort_by(|a, b| {
        b.score
            .match_percentage
            .cmp(&a.score.match_percentage)
            .then(b.score.matched_count.cmp(&a.score.matched_count))
    });
    ranked.truncate(opts.top_n);

    Recommendations::Ranked(ranked)
}
