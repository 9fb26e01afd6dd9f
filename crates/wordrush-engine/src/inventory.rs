use serde::{Deserialize, Serialize};

use crate::feature::FeatureKind;
use crate::trap::TrapKind;

/// Hard cap on unused items a racer can hold.
pub const INVENTORY_CAPACITY: usize = 3;

/// What an inventory item turns into when used. Power-ups apply
/// immediately on use; trap items are consumed by a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    PowerUp(FeatureKind),
    Trap(TrapKind),
}

impl ItemKind {
    pub fn is_trap(self) -> bool {
        matches!(self, ItemKind::Trap(_))
    }
}

/// An item held in a racer's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: u64,
    pub kind: ItemKind,
}

/// Add an item, silently dropping it when the inventory is full.
/// Returns whether the item was stored.
pub fn add_item(inventory: &mut Vec<InventoryItem>, item: InventoryItem) -> bool {
    if inventory.len() >= INVENTORY_CAPACITY {
        tracing::debug!(item_id = item.id, "inventory full, item dropped");
        return false;
    }
    inventory.push(item);
    true
}

/// Remove and return the item with the given id.
pub fn take_item(inventory: &mut Vec<InventoryItem>, item_id: u64) -> Option<InventoryItem> {
    let pos = inventory.iter().position(|i| i.id == item_id)?;
    Some(inventory.remove(pos))
}
