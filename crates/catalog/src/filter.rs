//! Candidate filter.
//!
//! Narrows the catalog to the items a plan may reference, through successive
//! passes over the previous pass's survivors:
//!
//! 1. `kind`: exercises for workouts, foods for meals.
//! 2. `equipment`: required equipment is a subset of what the user has.
//! 3. `experience`: difficulty at or below the user's level.
//! 4. `exclusions`: no tag matches an excluded condition.
//!
//! Survivors are then stably ranked so items tagged with the intent's focus
//! come first. Output is deterministic: ties keep catalog insertion order.

use std::collections::HashSet;

use fitforge_core::{
    CatalogItem, Constraints, Error, FilterPass, FilterStats, Intent, Result,
};

use crate::index::CatalogIndex;

/// Ordered candidate list with the statistics of the passes that built it.
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    items: Vec<&'a CatalogItem>,
    ids: HashSet<&'a str>,
    stats: FilterStats,
}

impl<'a> Candidates<'a> {
    fn new(items: Vec<&'a CatalogItem>, stats: FilterStats) -> Self {
        let ids = items.iter().map(|i| i.id.as_str()).collect();
        Self { items, ids, stats }
    }

    /// Candidates in rank order.
    pub fn items(&self) -> &[&'a CatalogItem] {
        &self.items
    }

    /// The first `limit` candidates, as listed in a prompt.
    pub fn prompt_slice(&self, limit: usize) -> &[&'a CatalogItem] {
        &self.items[..limit.min(self.items.len())]
    }

    /// Ids of the first `limit` candidates.
    pub fn ids(&self, limit: usize) -> Vec<String> {
        self.prompt_slice(limit).iter().map(|i| i.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Filters a [`CatalogIndex`] by request constraints.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter<'a> {
    catalog: &'a CatalogIndex,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(catalog: &'a CatalogIndex) -> Self {
        Self { catalog }
    }

    /// Run every pass; fails with `InsufficientCatalogCoverage` when nothing
    /// survives. Constraints are never widened here.
    pub fn filter(&self, constraints: &Constraints, intent: &Intent) -> Result<Candidates<'a>> {
        let kind = intent.category().item_kind();
        let mut stats = FilterStats {
            catalog_size: self.catalog.len(),
            ..Default::default()
        };

        let items: Vec<&'a CatalogItem> = self.catalog.iter().collect();

        let items = pass(&mut stats, "kind", items, |item| item.kind == kind);

        let items = pass(&mut stats, "equipment", items, |item| {
            item.equipment.is_subset(&constraints.equipment)
        });

        let items = pass(&mut stats, "experience", items, |item| {
            item.difficulty
                .map_or(true, |d| d <= constraints.experience_level)
        });

        let mut items = pass(&mut stats, "exclusions", items, |item| {
            !item.matches_any(&constraints.exclusions)
        });

        if items.is_empty() {
            let summary = stats
                .passes
                .iter()
                .map(|p| format!("{} {}->{}", p.name, p.input, p.output))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::info!(intent = %intent, passes = %summary, "Filter produced no candidates");
            return Err(Error::InsufficientCatalogCoverage(format!(
                "no {} items satisfy the constraints ({})",
                intent.category().as_str(),
                summary
            )));
        }

        // Stable: focus-tagged items first, insertion order otherwise.
        let focus = intent.focus_tag();
        items.sort_by_key(|item| !item.categories.contains(focus));

        stats.candidate_count = items.len();
        tracing::debug!(
            intent = %intent,
            catalog_size = stats.catalog_size,
            candidates = stats.candidate_count,
            "Filter complete"
        );

        Ok(Candidates::new(items, stats))
    }
}

fn pass<'a>(
    stats: &mut FilterStats,
    name: &str,
    items: Vec<&'a CatalogItem>,
    keep: impl Fn(&CatalogItem) -> bool,
) -> Vec<&'a CatalogItem> {
    let input = items.len();
    let out: Vec<_> = items.into_iter().filter(|item| keep(item)).collect();
    stats.passes.push(FilterPass {
        name: name.to_string(),
        input,
        output: out.len(),
    });
    out
}
