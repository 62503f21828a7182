use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::catalog::{normalize_tag, ItemKind};
use crate::error::{Error, Result};

// =============================================================================
// Request Types
// =============================================================================

/// Training experience of the requesting user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// Kind of workout requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Strength,
    Cardio,
    Hiit,
    Mobility,
    FullBody,
}

impl WorkoutType {
    /// Catalog category tag this workout type favours.
    pub fn focus_tag(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Cardio => "cardio",
            Self::Hiit => "hiit",
            Self::Mobility => "mobility",
            Self::FullBody => "full_body",
        }
    }
}

/// Meal slot requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub fn focus_tag(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

/// What the caller wants generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Workout {
        #[serde(rename = "workoutType")]
        workout_type: WorkoutType,
    },
    Meal {
        #[serde(rename = "mealSlot")]
        meal_slot: MealSlot,
    },
}

impl Intent {
    pub fn category(&self) -> IntentCategory {
        match self {
            Self::Workout { .. } => IntentCategory::Workout,
            Self::Meal { .. } => IntentCategory::Meal,
        }
    }

    pub fn focus_tag(&self) -> &'static str {
        match self {
            Self::Workout { workout_type } => workout_type.focus_tag(),
            Self::Meal { meal_slot } => meal_slot.focus_tag(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category().as_str(), self.focus_tag())
    }
}

/// Coarse intent grouping that cache policy is configured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Workout,
    Meal,
}

impl IntentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::Meal => "meal",
        }
    }

    /// Catalog item kind this category draws from.
    pub fn item_kind(self) -> ItemKind {
        match self {
            Self::Workout => ItemKind::Exercise,
            Self::Meal => ItemKind::Food,
        }
    }
}

/// User constraints the plan must respect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Equipment available to the user.
    #[serde(default)]
    pub equipment: BTreeSet<String>,

    /// Experience level.
    pub experience_level: ExperienceLevel,

    /// Injuries, allergies and other excluded conditions.
    #[serde(default)]
    pub exclusions: BTreeSet<String>,
}

/// An incoming generation request.
///
/// Construct through [`GenerationRequest::normalized`] so that tag sets are
/// canonical before fingerprinting and filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Verified user key supplied by the auth layer.
    #[serde(default)]
    pub identity: Option<String>,

    /// Constraints on the generated plan.
    pub constraints: Constraints,

    /// Workout or meal intent.
    pub intent: Intent,

    /// Minutes for workouts, kilocalories for meals.
    #[serde(alias = "targetDurationOrCalories")]
    pub target: f64,
}

impl GenerationRequest {
    /// Validate and canonicalize a request.
    pub fn normalized(mut self) -> Result<Self> {
        if !self.target.is_finite() || self.target <= 0.0 {
            return Err(Error::invalid_request(format!(
                "target must be a positive number, got {}",
                self.target
            )));
        }

        self.identity = self
            .identity
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty());

        self.constraints.equipment = normalize_set(&self.constraints.equipment);
        self.constraints.exclusions = normalize_set(&self.constraints.exclusions);
        Ok(self)
    }

    /// Number of plan entries to ask the provider for.
    pub fn desired_entries(&self) -> usize {
        match self.intent.category() {
            IntentCategory::Workout => ((self.target / 5.0).round() as usize).clamp(3, 12),
            IntentCategory::Meal => ((self.target / 250.0).round() as usize).clamp(1, 6),
        }
    }
}

fn normalize_set(tags: &BTreeSet<String>) -> BTreeSet<String> {
    tags.iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect()
}
