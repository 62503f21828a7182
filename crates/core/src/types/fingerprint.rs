use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::request::GenerationRequest;

/// Deterministic digest of a normalized request, used as cache and
/// single-flight key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(pub String);

impl RequestFingerprint {
    /// Compute the fingerprint of a request.
    ///
    /// Tag sets are ordered sets, so field ordering in the incoming payload
    /// never changes the digest. `identity` only participates when
    /// `include_identity` is set.
    pub fn compute(
        request: &GenerationRequest,
        schema_version: &str,
        include_identity: bool,
    ) -> Self {
        let c = &request.constraints;
        let mut canonical = Canonical::default();
        canonical.field("schema", schema_version);
        canonical.field("intent", &request.intent.to_string());
        canonical.field("level", c.experience_level.as_str());
        canonical.set("equipment", c.equipment.iter());
        canonical.set("exclusions", c.exclusions.iter());
        canonical.field("target", &format!("{:.1}", request.target));
        canonical.field("entries", &request.desired_entries().to_string());
        match (&request.identity, include_identity) {
            (Some(id), true) => canonical.field("identity", id),
            _ => canonical.absent("identity"),
        }

        Self(format!("{:x}", canonical.hasher.finalize()))
    }

    /// Wrap an already computed digest (e.g. from an invalidation call).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length-prefixed encoding fed straight into the digest, so no tag or
/// identity value can forge a field or set boundary.
#[derive(Default)]
struct Canonical {
    hasher: Sha256,
}

impl Canonical {
    fn bytes(&mut self, value: &[u8]) {
        self.hasher.update((value.len() as u64).to_be_bytes());
        self.hasher.update(value);
    }

    fn field(&mut self, name: &str, value: &str) {
        self.bytes(name.as_bytes());
        self.hasher.update([1u8]);
        self.bytes(value.as_bytes());
    }

    fn absent(&mut self, name: &str) {
        self.bytes(name.as_bytes());
        self.hasher.update([0u8]);
    }

    fn set<'a>(&mut self, name: &str, tags: impl ExactSizeIterator<Item = &'a String>) {
        self.bytes(name.as_bytes());
        self.hasher.update((tags.len() as u64).to_be_bytes());
        for tag in tags {
            self.bytes(tag.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::request::{Constraints, ExperienceLevel, Intent, MealSlot, WorkoutType};

    fn request(equipment: &[&str], identity: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            identity: identity.map(String::from),
            constraints: Constraints {
                equipment: equipment.iter().map(|s| s.to_string()).collect(),
                experience_level: ExperienceLevel::Beginner,
                exclusions: Default::default(),
            },
            intent: Intent::Workout {
                workout_type: WorkoutType::Cardio,
            },
            target: 30.0,
        }
        .normalized()
        .unwrap()
    }

    #[test]
    fn test_order_independent() {
        let a = RequestFingerprint::compute(&request(&["kettlebell", "band"], None), "v1", false);
        let b = RequestFingerprint::compute(&request(&["Band", "kettlebell"], None), "v1", false);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_schema_version_changes_digest() {
        let req = request(&["band"], None);
        assert_ne!(
            RequestFingerprint::compute(&req, "v1", false),
            RequestFingerprint::compute(&req, "v2", false)
        );
    }

    #[test]
    fn test_identity_only_when_requested() {
        let alice = request(&["band"], Some("alice"));
        let bob = request(&["band"], Some("bob"));

        assert_eq!(
            RequestFingerprint::compute(&alice, "v1", false),
            RequestFingerprint::compute(&bob, "v1", false)
        );
        assert_ne!(
            RequestFingerprint::compute(&alice, "v1", true),
            RequestFingerprint::compute(&bob, "v1", true)
        );
    }

    fn with_exclusions(exclusions: &[&str], identity: Option<&str>) -> GenerationRequest {
        let mut req = request(&["bodyweight"], identity);
        req.constraints.exclusions = exclusions.iter().map(|s| s.to_string()).collect();
        req.normalized().unwrap()
    }

    #[test]
    fn test_tag_separators_do_not_collide() {
        let joined = with_exclusions(&["knee_injury,zzz"], None);
        let split = with_exclusions(&["knee_injury", "zzz"], None);
        assert_ne!(
            RequestFingerprint::compute(&joined, "v1", false),
            RequestFingerprint::compute(&split, "v1", false)
        );

        // A tag moved between sets is a different request.
        let mut moved = request(&["bodyweight", "zzz"], None);
        moved.constraints.exclusions = ["knee_injury".to_string()].into();
        assert_ne!(
            RequestFingerprint::compute(&moved, "v1", false),
            RequestFingerprint::compute(&split, "v1", false)
        );
    }

    #[test]
    fn test_star_identity_is_not_anonymous() {
        let star = request(&["band"], Some("*"));
        let anonymous = request(&["band"], None);
        assert_ne!(
            RequestFingerprint::compute(&star, "v1", true),
            RequestFingerprint::compute(&anonymous, "v1", true)
        );
    }

    #[test]
    fn test_targets_with_different_plan_sizes_differ() {
        let meal = |target: f64| {
            let mut req = request(&[], None);
            req.intent = Intent::Meal {
                meal_slot: MealSlot::Dinner,
            };
            req.target = target;
            req
        };
        let below = meal(374.96);
        let above = meal(375.04);
        assert_ne!(below.desired_entries(), above.desired_entries());
        assert_ne!(
            RequestFingerprint::compute(&below, "v1", false),
            RequestFingerprint::compute(&above, "v1", false)
        );
    }
}
