use serde::Serialize;

use super::normalize::normalize;
use super::synonyms::same_concept;

/// Lowest score that counts an ingredient as available.
pub const MIN_MATCH_SCORE: u8 = 40;

/// Shorter terms are ignored by the substring and word-overlap tiers.
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    None,
    WordOverlap,
    Substring,
    Synonym,
    Exact,
}

impl MatchTier {
    pub fn score(self) -> u8 {
        match self {
            MatchTier::None => 0,
            MatchTier::WordOverlap => 40,
            MatchTier::Substring => 60,
            MatchTier::Synonym => 80,
            MatchTier::Exact => 100,
        }
    }
}

/// Best pantry hit for one recipe ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub ingredient: String,
    pub matched_with: Option<String>,
    pub score: u8,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.score >= MIN_MATCH_SCORE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub matched_count: usize,
    pub total_count: usize,
    pub matches: Vec<MatchResult>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Tier for two already-normalized strings. Tiers are checked from the
/// strongest down and the first hit wins.
fn tier_normalized(recipe: &str, pantry: &str) -> MatchTier {
    if recipe == pantry {
        return MatchTier::Exact;
    }

    if same_concept(recipe, pantry) {
        return MatchTier::Synonym;
    }

    if (recipe.contains(pantry) || pantry.contains(recipe))
        && char_len(recipe) >= MIN_TERM_CHARS
        && char_len(pantry) >= MIN_TERM_CHARS
    {
        return MatchTier::Substring;
    }

    let recipe_words: Vec<&str> = recipe.split_whitespace().collect();
    let pantry_words: Vec<&str> = pantry
        .split_whitespace()
        .filter(|w| char_len(w) >= MIN_TERM_CHARS)
        .collect();

    // Short recipe words never match but still count in the denominator.
    let matching = recipe_words
        .iter()
        .filter(|rw| char_len(rw) >= MIN_TERM_CHARS)
        .filter(|rw| {
            pantry_words
                .iter()
                .any(|pw| rw == &pw || rw.contains(pw) || pw.contains(*rw))
        })
        .count();

    if matching > 0 && matching * 100 / recipe_words.len() >= 50 {
        return MatchTier::WordOverlap;
    }

    MatchTier::None
}

pub fn match_tier(recipe_ingredient: &str, pantry_item: &str) -> MatchTier {
    tier_normalized(&normalize(recipe_ingredient), &normalize(pantry_item))
}

/// Score in {0, 40, 60, 80, 100}. Not symmetric: word overlap is measured
/// against the recipe side.
pub fn match_score(recipe_ingredient: &str, pantry_item: &str) -> u8 {
    match_tier(recipe_ingredient, pantry_item).score()
}

/// Matches every recipe ingredient against the whole pantry, keeping the
/// first best-scoring pantry name per ingredient.
pub fn match_all<R, P>(recipe_ingredients: &[R], pantry_names: &[P]) -> MatchSummary
where
    R: AsRef<str>,
    P: AsRef<str>,
{
    let pantry: Vec<(&str, String)> = pantry_names
        .iter()
        .map(|p| (p.as_ref(), normalize(p.as_ref())))
        .collect();

    let matches: Vec<MatchResult> = recipe_ingredients
        .iter()
        .map(|ingredient| {
            let ingredient = ingredient.as_ref();
            let norm = normalize(ingredient);

            let mut best: Option<(&str, u8)> = None;
            for (original, pantry_norm) in &pantry {
                let score = tier_normalized(&norm, pantry_norm).score();
                if score > best.map_or(0, |(_, s)| s) {
                    best = Some((*original, score));
                    if score == MatchTier::Exact.score() {
                        break;
                    }
                }
            }

            match best {
                Some((name, score)) if score >= MIN_MATCH_SCORE => MatchResult {
                    ingredient: ingredient.to_string(),
                    matched_with: Some(name.to_string()),
                    score,
                },
                _ => MatchResult {
                    ingredient: ingredient.to_string(),
                    matched_with: None,
                    score: 0,
                },
            }
        })
        .collect();

    MatchSummary {
        matched_count: matches.iter().filter(|m| m.is_matched()).count(),
        total_count: recipe_ingredients.len(),
        matches,
    }
}

/// Integer percentage, truncated.
pub fn match_percentage(matched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (matched.min(total) * 100 / total) as u8
}
