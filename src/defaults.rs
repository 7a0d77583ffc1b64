//! Default ingredient list used to seed a fresh store.

use uuid::Uuid;

use crate::models::InventoryItem;

/// Fixed stall ingredient list: `(name, ideal quantity)`.
pub const DEFAULT_INVENTORY: &[(&str, i64)] = &[
    ("たこ焼き粉（1kg）", 4),
    ("タコ（1袋）", 2),
    ("サラダ油（8個入り）", 8),
    ("出汁セット", 3),
    ("紅生姜", 3),
    ("青のり", 2),
    ("かつお節", 4),
    ("たこ焼きソース", 6),
    ("マヨネーズ", 5),
    ("天かす", 3),
];

/// Generates a fresh, never-reused item identifier.
pub fn generate_item_id() -> String {
    format!("item-{}", Uuid::new_v4())
}

/// Builds the seed inventory: fresh unique ids, `current = ideal`.
pub fn seed_inventory() -> Vec<InventoryItem> {
    DEFAULT_INVENTORY
        .iter()
        .map(|(name, ideal)| InventoryItem {
            id: generate_item_id(),
            name: (*name).to_string(),
            ideal: *ideal,
            current: *ideal,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_inventory_current_equals_ideal() {
        for item in seed_inventory() {
            assert_eq!(item.current, item.ideal, "{}", item.name);
        }
    }

    #[test]
    fn test_seed_inventory_unique_ids() {
        let items = seed_inventory();
        let ids: HashSet<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), items.len());
    }

    #[test]
    fn test_item_id_format() {
        let id = generate_item_id();
        assert!(id.starts_with("item-"));
        assert_ne!(id, generate_item_id());
    }
}
