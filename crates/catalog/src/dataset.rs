//! Built-in seed catalog, used when no dataset path is configured.

use fitforge_core::Result;

use crate::index::CatalogIndex;

/// Seed dataset shipped with the binary.
pub const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Load the seed dataset.
pub fn builtin() -> Result<CatalogIndex> {
    CatalogIndex::from_json(BUILTIN_CATALOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitforge_core::ItemKind;

    #[test]
    fn test_builtin_catalog_loads() {
        let index = builtin().unwrap();
        assert!(index.iter().any(|i| i.kind == ItemKind::Exercise));
        assert!(index.iter().any(|i| i.kind == ItemKind::Food));
        assert!(index
            .iter()
            .filter(|i| i.kind == ItemKind::Food)
            .all(|i| i.calories_per_serving.is_some()));
    }
}
