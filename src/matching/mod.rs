//! Fuzzy matching of recipe ingredient lines against pantry item names.

mod matcher;
mod normalize;
mod synonyms;

pub use matcher::{
    match_all, match_percentage, match_score, match_tier, MatchResult, MatchSummary, MatchTier,
    MIN_MATCH_SCORE,
};
pub use normalize::normalize;
