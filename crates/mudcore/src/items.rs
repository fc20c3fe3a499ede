//! Item classes and item instances.
//!
//! An item class is a [`crate::classes::ClassDef`] carrying an [`ItemSpec`]
//! payload; an [`Item`] is an instance of such a class plus optional opaque
//! state. State participates in equality: two potions with different `hp`
//! fields are different items even though they share a class.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EquipSlot {
    RightHand,
    LeftHand,
    Head,
    Body,
    Hands,
    Legs,
    Feet,
}

impl EquipSlot {
    pub fn all() -> &'static [EquipSlot] {
        &[
            EquipSlot::RightHand,
            EquipSlot::LeftHand,
            EquipSlot::Head,
            EquipSlot::Body,
            EquipSlot::Hands,
            EquipSlot::Legs,
            EquipSlot::Feet,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EquipSlot::RightHand => "right hand",
            EquipSlot::LeftHand => "left hand",
            EquipSlot::Head => "head",
            EquipSlot::Body => "body",
            EquipSlot::Hands => "hands",
            EquipSlot::Legs => "legs",
            EquipSlot::Feet => "feet",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "right hand" | "righthand" | "right" | "wield" | "mainhand" | "main-hand" => {
                Some(EquipSlot::RightHand)
            }
            "left hand" | "lefthand" | "left" | "offhand" | "off-hand" | "shield" => {
                Some(EquipSlot::LeftHand)
            }
            "head" | "helm" | "helmet" => Some(EquipSlot::Head),
            "body" | "torso" | "chest" | "armor" | "armour" => Some(EquipSlot::Body),
            "hands" | "hand" | "gloves" | "gauntlets" => Some(EquipSlot::Hands),
            "legs" | "pants" | "trousers" => Some(EquipSlot::Legs),
            "feet" | "boots" | "shoes" => Some(EquipSlot::Feet),
            _ => None,
        }
    }
}

/// Item payload on a class definition.
#[derive(Debug, Clone, Default)]
pub struct ItemSpec {
    pub slot: Option<EquipSlot>,
    pub aliases: Vec<String>,
    pub description: String,
}

impl ItemSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(mut self, s: EquipSlot) -> Self {
        self.slot = Some(s);
        self
    }

    pub fn alias(mut self, a: &str) -> Self {
        self.aliases.push(a.trim().to_ascii_lowercase());
        self
    }

    pub fn description(mut self, d: &str) -> Self {
        self.description = d.to_string();
        self
    }

    pub fn matches_token(&self, token: &str) -> bool {
        let t = token.trim().to_ascii_lowercase();
        !t.is_empty() && self.aliases.iter().any(|a| *a == t)
    }
}

/// Opaque per-item state. Keys are field names, values arbitrary JSON.
pub type ItemData = BTreeMap<String, serde_json::Value>;

/// "No data" and an empty map are the same state.
pub fn data_is_empty(data: &Option<ItemData>) -> bool {
    match data {
        None => true,
        Some(d) => d.is_empty(),
    }
}

pub fn data_eq(a: &Option<ItemData>, b: &Option<ItemData>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => data_is_empty(a) && data_is_empty(b),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub class: crate::ClassId,
    pub data: Option<ItemData>,
}

impl Item {
    pub fn new(class: crate::ClassId) -> Self {
        Self { class, data: None }
    }

    pub fn with_data(class: crate::ClassId, data: ItemData) -> Self {
        Self {
            class,
            data: Some(data),
        }
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    pub fn set_field(&mut self, key: &str, value: serde_json::Value) {
        self.data
            .get_or_insert_with(ItemData::new)
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slot_parse_accepts_aliases() {
        assert_eq!(EquipSlot::parse("wield"), Some(EquipSlot::RightHand));
        assert_eq!(EquipSlot::parse("  OFFHAND "), Some(EquipSlot::LeftHand));
        assert_eq!(EquipSlot::parse("helm"), Some(EquipSlot::Head));
        assert_eq!(EquipSlot::parse("elbow"), None);
    }

    #[test]
    fn every_slot_round_trips_its_own_name() {
        for s in EquipSlot::all() {
            assert_eq!(EquipSlot::parse(s.as_str()), Some(*s));
        }
    }

    #[test]
    fn absent_data_equals_empty_data() {
        assert!(data_eq(&None, &Some(ItemData::new())));
        let mut d = ItemData::new();
        d.insert("hp".to_string(), json!(10));
        assert!(!data_eq(&None, &Some(d.clone())));
        assert!(data_eq(&Some(d.clone()), &Some(d)));
    }

    #[test]
    fn item_state_participates_in_equality() {
        let mut a = Item::new(3);
        let b = Item::new(3);
        assert_eq!(a, b);
        a.set_field("hp", json!(10));
        assert_ne!(a, b);
        assert_eq!(a.field("hp"), Some(&json!(10)));
    }
}
