use serde::{Deserialize, Serialize};

/// A titled group of ingredient lines ("Bumbu halus", "Main", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSection {
    pub name: String,
    pub items: Vec<String>,
}

/// Recipe as delivered by the provider. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCandidate {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub cooking_minutes: Option<u32>,
    pub servings: Option<String>,
    pub difficulty: Option<String>,
    pub sections: Vec<IngredientSection>,
}

impl RecipeCandidate {
    /// Flat, non-blank ingredient lines across every section, in order.
    pub fn ingredient_texts(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter())
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn candidate(id: &str, ingredients: &[&str]) -> RecipeCandidate {
    RecipeCandidate {
        id: id.into(),
        slug: id.into(),
        title: format!("Recipe {id}"),
        description: None,
        image_url: None,
        cooking_minutes: None,
        servings: None,
        difficulty: None,
        sections: vec![IngredientSection {
            name: "Bahan".into(),
            items: ingredients.iter().map(|s| s.to_string()).collect(),
        }],
    }
}
