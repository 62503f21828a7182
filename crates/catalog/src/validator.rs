//! Response validator and repairer.
//!
//! The only path from untrusted [`RawPlan`] to [`GeneratedPlan`]. Every
//! emitted entry is built from a resolved [`CatalogItem`] that is also a
//! filter candidate, so media references come from the catalog and never
//! from model output.

use std::collections::{BTreeSet, HashSet};

use fitforge_core::{
    CatalogItem, EntryParams, Error, ExperienceLevel, GeneratedPlan, GenerationRequest, ItemKind,
    PlanEntry, RawEntry, RawPlan, Result, ValidationReport,
};

use crate::filter::Candidates;
use crate::index::CatalogIndex;

const MAX_TITLE_LEN: usize = 120;

/// Why a raw entry could not be used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingId,
    Unknown,
    NotCandidate,
    Excluded,
    Duplicate,
}

impl Rejection {
    fn describe(self) -> &'static str {
        match self {
            Self::MissingId => "no id given",
            Self::Unknown => "not in catalog",
            Self::NotCandidate => "outside the allowed candidates",
            Self::Excluded => "matches an exclusion",
            Self::Duplicate => "already in plan",
        }
    }
}

/// Validates raw model output against the catalog and the filtered
/// candidates, substituting safe replacements where needed.
#[derive(Debug, Clone, Copy)]
pub struct PlanValidator<'a> {
    catalog: &'a CatalogIndex,
}

impl<'a> PlanValidator<'a> {
    pub fn new(catalog: &'a CatalogIndex) -> Self {
        Self { catalog }
    }

    /// Validate and repair `raw`.
    ///
    /// Invalid entries are replaced by the unused candidate with the largest
    /// tag overlap; when candidates run out the entry is dropped. Fails with
    /// `GenerationUnusable` if nothing survives.
    pub fn validate(
        &self,
        raw: &RawPlan,
        candidates: &Candidates<'_>,
        request: &GenerationRequest,
    ) -> Result<(GeneratedPlan, ValidationReport)> {
        let level = request.constraints.experience_level;
        let exclusions = &request.constraints.exclusions;

        let mut report = ValidationReport::default();
        let mut used: HashSet<String> = HashSet::new();
        // Candidates the model proposed itself are kept for their own entries.
        let reserved: HashSet<&str> = raw
            .entries
            .iter()
            .filter_map(|e| e.id.as_deref().map(str::trim))
            .filter(|id| candidates.contains(id))
            .collect();
        let mut entries = Vec::with_capacity(raw.entries.len());

        for (pos, entry) in raw.entries.iter().enumerate() {
            let label = entry
                .id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("entry #{}", pos + 1));

            let resolved = entry.id.as_deref().and_then(|id| self.catalog.lookup(id));

            let verdict = match (entry.id.as_deref().map(str::trim), resolved) {
                (None, _) | (Some(""), _) => Err(Rejection::MissingId),
                (_, None) => Err(Rejection::Unknown),
                (_, Some(item)) if item.matches_any(exclusions) => Err(Rejection::Excluded),
                (_, Some(item)) if !candidates.contains(&item.id) => Err(Rejection::NotCandidate),
                (_, Some(item)) if used.contains(&item.id) => Err(Rejection::Duplicate),
                (_, Some(item)) => Ok(item),
            };

            let rejection = match verdict {
                Ok(item) => {
                    used.insert(item.id.clone());
                    let params = build_params(entry, item, level, &mut report);
                    entries.push(PlanEntry::from_item(item, params));
                    continue;
                }
                Err(rejection) => rejection,
            };

            report.invalid_found += 1;
            let implied = implied_tags(entry, resolved);

            match nearest_unused(candidates, &used, &reserved, &implied) {
                Some(replacement) => {
                    let note = format!(
                        "Replaced '{}' ({}) with '{}'",
                        label,
                        rejection.describe(),
                        replacement.name
                    );
                    tracing::debug!(
                        original = %label,
                        replacement = %replacement.id,
                        reason = rejection.describe(),
                        "Repaired plan entry"
                    );
                    used.insert(replacement.id.clone());
                    report.replacements_made += 1;
                    report.warnings.push(note.clone());
                    let params = build_params(entry, replacement, level, &mut report);
                    entries.push(PlanEntry::from_item(replacement, params).with_replacement_note(note));
                }
                None => {
                    let err = Error::NoSafeReplacement(format!(
                        "'{}' ({}) dropped, candidates exhausted",
                        label,
                        rejection.describe()
                    ));
                    tracing::warn!(original = %label, "{}", err);
                    report.dropped += 1;
                    report.warnings.push(err.to_string());
                }
            }
        }

        if entries.is_empty() {
            return Err(Error::GenerationUnusable(format!(
                "no valid entries among {} proposed",
                raw.entries.len()
            )));
        }

        self.assert_media(&entries)?;
        report.exercises_validated = true;

        let plan = GeneratedPlan {
            intent: request.intent,
            title: raw
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| t.chars().take(MAX_TITLE_LEN).collect()),
            entries,
        };
        Ok((plan, report))
    }

    /// Every entry must resolve to a catalog item with a media reference.
    /// Holds by construction; a failure here is a bug.
    fn assert_media(&self, entries: &[PlanEntry]) -> Result<()> {
        for entry in entries {
            match self.catalog.lookup(&entry.item_id) {
                Some(item) if !item.media_ref.is_empty() && item.media_ref == entry.media_ref => {}
                _ => {
                    return Err(Error::internal(format!(
                        "entry '{}' lost its catalog media reference",
                        entry.item_id
                    )))
                }
            }
        }
        Ok(())
    }
}

fn implied_tags(entry: &RawEntry, resolved: Option<&CatalogItem>) -> BTreeSet<String> {
    match resolved {
        Some(item) => item.descriptive_tags().into_iter().map(str::to_string).collect(),
        None => entry.implied_tags().into_iter().collect(),
    }
}

/// Unused candidate with the largest tag overlap; earliest wins ties.
fn nearest_unused<'c>(
    candidates: &Candidates<'c>,
    used: &HashSet<String>,
    reserved: &HashSet<&str>,
    implied: &BTreeSet<String>,
) -> Option<&'c CatalogItem> {
    let mut best: Option<(&'c CatalogItem, usize)> = None;
    for &item in candidates.items() {
        if used.contains(&item.id) || reserved.contains(item.id.as_str()) {
            continue;
        }
        let score = item
            .descriptive_tags()
            .iter()
            .filter(|t| implied.contains(**t))
            .count();
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((item, score));
        }
    }
    best.map(|(item, _)| item)
}

// =============================================================================
// Parameters
// =============================================================================

struct SetDefaults {
    sets: u32,
    reps: u32,
    rest_seconds: u32,
}

fn set_defaults(level: ExperienceLevel) -> SetDefaults {
    match level {
        ExperienceLevel::Beginner => SetDefaults {
            sets: 3,
            reps: 10,
            rest_seconds: 90,
        },
        ExperienceLevel::Intermediate => SetDefaults {
            sets: 4,
            reps: 10,
            rest_seconds: 75,
        },
        ExperienceLevel::Advanced => SetDefaults {
            sets: 5,
            reps: 8,
            rest_seconds: 60,
        },
    }
}

/// Clamp a raw value into `[lo, hi]`; `None` when it is missing.
/// The flag is set when the value was absent or out of range.
fn clamp_or(raw: Option<f64>, lo: f64, hi: f64, default: f64) -> (f64, bool) {
    match raw {
        Some(v) if v.is_finite() => {
            let c = v.clamp(lo, hi);
            (c, c != v)
        }
        _ => (default, true),
    }
}

fn build_params(
    entry: &RawEntry,
    item: &CatalogItem,
    level: ExperienceLevel,
    report: &mut ValidationReport,
) -> EntryParams {
    let (params, adjusted) = match item.kind {
        ItemKind::Exercise => {
            let d = set_defaults(level);
            let (sets, a) = clamp_or(entry.sets(), 1.0, 10.0, d.sets as f64);
            let (reps, b) = clamp_or(entry.reps(), 1.0, 50.0, d.reps as f64);
            let (rest, c) = clamp_or(entry.rest_seconds(), 10.0, 300.0, d.rest_seconds as f64);
            (
                EntryParams::Sets {
                    sets: sets.round() as u32,
                    reps: reps.round() as u32,
                    rest_seconds: rest.round() as u32,
                },
                a || b || c,
            )
        }
        ItemKind::Food => {
            let (servings, a) = clamp_or(entry.servings(), 0.25, 4.0, 1.0);
            let (calories, b) = match item.calories_per_serving {
                Some(per) => ((per as f64 * servings).round(), false),
                None => clamp_or(entry.calories(), 0.0, 3000.0, 0.0),
            };
            (
                EntryParams::Portion {
                    servings: servings as f32,
                    calories: calories as u32,
                },
                a || b,
            )
        }
    };

    if adjusted {
        report
            .warnings
            .push(format!("Parameters for '{}' were missing or out of range and were adjusted", item.id));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CandidateFilter;
    use fitforge_core::mocks::synthetic_catalog;
    use fitforge_core::{Constraints, Intent, RawModelOutput, WorkoutType};
    use serde_json::json;

    fn request(exclusions: &[&str]) -> GenerationRequest {
        GenerationRequest {
            identity: None,
            constraints: Constraints {
                equipment: ["bodyweight".to_string()].into(),
                experience_level: ExperienceLevel::Beginner,
                exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
            },
            intent: Intent::Workout {
                workout_type: WorkoutType::Strength,
            },
            target: 30.0,
        }
    }

    fn raw(value: serde_json::Value) -> RawPlan {
        RawModelOutput::Structured(value).parse_plan().unwrap()
    }

    #[test]
    fn test_valid_entries_pass_through() {
        let index = CatalogIndex::load(synthetic_catalog(120)).unwrap();
        let req = request(&[]);
        let candidates = CandidateFilter::new(&index).filter(&req.constraints, &req.intent).unwrap();
        let ids = candidates.ids(3);

        let plan = raw(json!({ "entries": ids.iter().map(|id| json!({ "id": id, "sets": 3, "reps": 12, "rest_seconds": 60 })).collect::<Vec<_>>() }));
        let (plan, report) = PlanValidator::new(&index).validate(&plan, &candidates, &req).unwrap();

        assert_eq!(plan.entries.len(), 3);
        assert_eq!(report.invalid_found, 0);
        assert_eq!(report.replacements_made, 0);
        assert!(report.exercises_validated);
        assert!(report.warnings.is_empty());
        assert_eq!(
            plan.entries[0].params,
            EntryParams::Sets { sets: 3, reps: 12, rest_seconds: 60 }
        );
    }

    #[test]
    fn test_hallucinated_id_is_replaced() {
        let index = CatalogIndex::load(synthetic_catalog(120)).unwrap();
        let req = request(&[]);
        let candidates = CandidateFilter::new(&index).filter(&req.constraints, &req.intent).unwrap();
        let ids = candidates.ids(2);

        let plan = raw(json!({ "entries": [
            { "id": ids[0] },
            { "id": "bulgarian-split-squat-9000", "name": "Bulgarian Split Squat", "category": "strength legs" },
            { "id": ids[1] },
        ]}));
        let (plan, report) = PlanValidator::new(&index).validate(&plan, &candidates, &req).unwrap();

        assert_eq!(plan.entries.len(), 3);
        assert_eq!(report.invalid_found, 1);
        assert_eq!(report.replacements_made, 1);
        for entry in &plan.entries {
            assert!(candidates.contains(&entry.item_id));
            assert!(index.lookup(&entry.item_id).is_some());
        }
        let replaced = &plan.entries[1];
        assert!(replaced.replacement_note.as_deref().unwrap().contains("not in catalog"));
        assert_ne!(replaced.item_id, plan.entries[0].item_id);
        assert_ne!(replaced.item_id, plan.entries[2].item_id);

        // Replacement prefers the unused candidate with the most overlapping tags.
        let chosen = index.lookup(&replaced.item_id).unwrap();
        assert!(chosen.categories.contains("strength"));
        assert!(chosen.regions.contains("legs"));
    }

    #[test]
    fn test_excluded_and_duplicate_entries_replaced() {
        let index = CatalogIndex::load(synthetic_catalog(120)).unwrap();
        let req = request(&["knee_injury"]);
        let candidates = CandidateFilter::new(&index).filter(&req.constraints, &req.intent).unwrap();
        let first = candidates.ids(1).remove(0);

        // ex-0000 is contraindicated for knee_injury.
        let plan = raw(json!([{ "id": "ex-0000" }, { "id": first }, { "id": first }]));
        let (plan, report) = PlanValidator::new(&index).validate(&plan, &candidates, &req).unwrap();

        assert_eq!(report.invalid_found, 2);
        assert_eq!(report.replacements_made, 2);
        let unique: HashSet<_> = plan.entries.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(unique.len(), 3);
        assert!(plan.entries.iter().all(|e| e.item_id != "ex-0000"));
    }

    #[test]
    fn test_exhausted_candidates_drop_entries() {
        let index = CatalogIndex::load(synthetic_catalog(12)).unwrap();
        let req = request(&[]);
        let candidates = CandidateFilter::new(&index).filter(&req.constraints, &req.intent).unwrap();
        assert_eq!(candidates.len(), 2);

        let plan = raw(json!([{ "id": "a" }, { "id": "b" }, { "id": "c" }]));
        let (plan, report) = PlanValidator::new(&index).validate(&plan, &candidates, &req).unwrap();

        assert_eq!(plan.entries.len(), 2);
        assert_eq!(report.replacements_made, 2);
        assert_eq!(report.dropped, 1);
        assert!(report.warnings.iter().any(|w| w.contains("No safe replacement")));
    }

    #[test]
    fn test_out_of_range_params_are_clamped() {
        let index = CatalogIndex::load(synthetic_catalog(30)).unwrap();
        let req = request(&[]);
        let candidates = CandidateFilter::new(&index).filter(&req.constraints, &req.intent).unwrap();
        let id = candidates.ids(1).remove(0);

        let plan = raw(json!([{ "id": id, "sets": 40, "reps": "8-12" }]));
        let (plan, report) = PlanValidator::new(&index).validate(&plan, &candidates, &req).unwrap();

        assert_eq!(
            plan.entries[0].params,
            EntryParams::Sets { sets: 10, reps: 8, rest_seconds: 90 }
        );
        assert_eq!(report.warnings.len(), 1);
    }
}
