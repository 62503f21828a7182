use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::request::ExperienceLevel;

// =============================================================================
// Catalog Types
// =============================================================================

/// What kind of record a catalog item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A single exercise movement.
    Exercise,
    /// A food or dish.
    Food,
}

/// A single record of the fixed catalog.
///
/// Tags are stored lowercased; see [`normalize_tag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable, unique identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Exercise or food.
    pub kind: ItemKind,

    /// Category tags (e.g. `strength`, `cardio`, `breakfast`).
    #[serde(default)]
    pub categories: BTreeSet<String>,

    /// Equipment required to perform the item. Empty means none.
    #[serde(default)]
    pub equipment: BTreeSet<String>,

    /// Body-region (exercise) or cuisine (food) tags.
    #[serde(default)]
    pub regions: BTreeSet<String>,

    /// Conditions the item is unsafe for (injuries, allergens).
    #[serde(default)]
    pub contraindications: BTreeSet<String>,

    /// Minimum experience level; `None` for items without a difficulty.
    #[serde(default)]
    pub difficulty: Option<ExperienceLevel>,

    /// Media reference (image, GIF or video URI).
    #[serde(default)]
    pub media_ref: String,

    /// Step-by-step instructions shown with the item.
    #[serde(default)]
    pub instructions: Vec<String>,

    /// Calories per serving, for food items.
    #[serde(default)]
    pub calories_per_serving: Option<u32>,
}

impl CatalogItem {
    /// Iterate over every tag the item carries, across all tag sets.
    pub fn all_tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories
            .iter()
            .chain(self.equipment.iter())
            .chain(self.regions.iter())
            .chain(self.contraindications.iter())
            .map(String::as_str)
    }

    /// Tags describing what the item *is*, used for similarity ranking.
    pub fn descriptive_tags(&self) -> BTreeSet<&str> {
        self.categories
            .iter()
            .chain(self.regions.iter())
            .chain(self.equipment.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether any tag of the item matches one of the given exclusions.
    pub fn matches_any(&self, exclusions: &BTreeSet<String>) -> bool {
        !exclusions.is_empty() && self.all_tags().any(|t| exclusions.contains(t))
    }

    /// Lowercase and trim every tag set in place.
    pub fn normalize(&mut self) {
        for set in [
            &mut self.categories,
            &mut self.equipment,
            &mut self.regions,
            &mut self.contraindications,
        ] {
            *set = std::mem::take(set)
                .into_iter()
                .map(|t| normalize_tag(&t))
                .filter(|t| !t.is_empty())
                .collect();
        }
        self.id = self.id.trim().to_string();
        self.media_ref = self.media_ref.trim().to_string();
    }
}

/// Canonical form of a tag: trimmed, lowercase, inner whitespace as `_`.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
