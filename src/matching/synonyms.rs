use std::collections::HashMap;

use lazy_static::lazy_static;

use super::normalize::normalize;

/// Base ingredient (Indonesian) and the alternate spellings/languages that
/// name the same thing.
pub static INGREDIENT_SYNONYMS: &[(&str, &[&str])] = &[
    ("gula", &["gula pasir", "gula putih", "gula halus", "sugar"]),
    ("garam", &["salt", "garam dapur"]),
    ("merica", &["lada", "pepper", "merica bubuk", "lada bubuk"]),
    ("bawang putih", &["garlic", "bawang putih bubuk"]),
    ("bawang merah", &["bawang bombai", "shallot", "onion"]),
    ("tomat", &["tomato", "tomatoes"]),
    ("cabai", &["cabe", "chili", "chilli", "lombok"]),
    ("telur", &["egg", "eggs", "telor"]),
    ("ayam", &["chicken", "daging ayam"]),
    ("daging sapi", &["beef", "sapi"]),
    ("ikan", &["fish"]),
    ("udang", &["shrimp", "prawn"]),
    ("susu", &["milk", "susu cair", "susu segar"]),
    ("mentega", &["butter", "margarin", "margarine"]),
    ("minyak", &["oil", "minyak goreng", "cooking oil"]),
    ("tepung terigu", &["flour", "tepung", "all purpose flour"]),
    ("kecap", &["kecap manis", "soy sauce", "sweet soy sauce"]),
    ("saus tiram", &["oyster sauce"]),
    ("keju", &["cheese"]),
    ("wortel", &["carrot", "carrots"]),
    ("kentang", &["potato", "potatoes"]),
    ("beras", &["rice", "nasi"]),
];

lazy_static! {
    // normalized term -> indices of every entry it belongs to
    static ref TERM_INDEX: HashMap<String, Vec<usize>> = {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, (base, variants)) in INGREDIENT_SYNONYMS.iter().enumerate() {
            for term in std::iter::once(base).chain(variants.iter()) {
                let entries = index.entry(normalize(term)).or_default();
                if !entries.contains(&i) {
                    entries.push(i);
                }
            }
        }
        index
    };
}

/// True when both normalized terms name the same synonym entry, whether
/// either of them is the base or one of its variants.
pub fn same_concept(a: &str, b: &str) -> bool {
    match (TERM_INDEX.get(a), TERM_INDEX.get(b)) {
        (Some(left), Some(right)) => left.iter().any(|i| right.contains(i)),
        _ => false,
    }
}
