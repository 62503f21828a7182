use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::catalog::CatalogItem;
use super::fingerprint::RequestFingerprint;
use super::request::Intent;

// =============================================================================
// Plan Types
// =============================================================================

/// Generation parameters attached to a plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryParams {
    /// Exercise prescription.
    Sets {
        sets: u32,
        reps: u32,
        #[serde(rename = "restSeconds")]
        rest_seconds: u32,
    },
    /// Food portion.
    Portion { servings: f32, calories: u32 },
}

/// One entry of a generated plan.
///
/// Built only from a resolved [`CatalogItem`], so `name` and `media_ref`
/// always come from the catalog and never from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub item_id: String,
    pub name: String,
    pub media_ref: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,
    pub params: EntryParams,
    /// Set when the entry replaced an invalid model suggestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_note: Option<String>,
}

impl PlanEntry {
    pub fn from_item(item: &CatalogItem, params: EntryParams) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            media_ref: item.media_ref.clone(),
            instructions: item.instructions.clone(),
            params,
            replacement_note: None,
        }
    }

    pub fn with_replacement_note(mut self, note: impl Into<String>) -> Self {
        self.replacement_note = Some(note.into());
        self
    }
}

/// A validated, catalog-backed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    pub intent: Intent,
    #[serde(default)]
    pub title: Option<String>,
    pub entries: Vec<PlanEntry>,
}

// =============================================================================
// Report Types
// =============================================================================

/// Input/output sizes of one filter pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPass {
    pub name: String,
    pub input: usize,
    pub output: usize,
}

/// Statistics recorded while narrowing the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub catalog_size: usize,
    pub passes: Vec<FilterPass>,
    pub candidate_count: usize,
}

/// Outcome of validating and repairing raw model output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub exercises_validated: bool,
    pub invalid_found: usize,
    pub replacements_made: usize,
    pub dropped: usize,
    pub warnings: Vec<String>,
}

// =============================================================================
// Cache Types
// =============================================================================

/// Where a served plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Fast,
    Durable,
    Fresh,
}

impl CacheSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Durable => "durable",
            Self::Fresh => "fresh",
        }
    }
}

/// A plan as stored in a cache tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPlan {
    pub fingerprint: RequestFingerprint,
    pub payload: GeneratedPlan,
    pub filter_stats: FilterStats,
    pub validation: ValidationReport,
    pub source: CacheSource,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl CachedPlan {
    /// Wrap a freshly generated plan.
    pub fn fresh(
        fingerprint: RequestFingerprint,
        payload: GeneratedPlan,
        filter_stats: FilterStats,
        validation: ValidationReport,
    ) -> Self {
        let now = Utc::now();
        Self {
            fingerprint,
            payload,
            filter_stats,
            validation,
            source: CacheSource::Fresh,
            created_at: now,
            expires_at: now,
            hit_count: 0,
            last_accessed_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Copy of this plan expiring `ttl` from now, as written into a tier.
    pub fn for_tier(&self, ttl: Duration) -> Self {
        let mut copy = self.clone();
        copy.expires_at = Utc::now() + to_chrono(ttl);
        copy
    }

    /// Time left before expiry; zero when already expired.
    pub fn remaining_ttl(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn to_chrono(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36_500))
}
