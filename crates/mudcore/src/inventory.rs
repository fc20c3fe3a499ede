//! Counted item stacks grouped by class and serialized state.
//!
//! A bucket holds every stack sharing one (case-folded) display name; a
//! stack counts structurally-identical items: same class, same state. Two
//! stacks with equal `(class, data)` are always merged, never left side by
//! side. Lookups range from exact (add/remove) through partial field
//! queries (find) down to loose player-typed tokens (equip/drop).

use std::collections::HashMap;

use crate::classes::ClassRegistry;
use crate::items::{data_eq, data_is_empty, Item, ItemData};
use crate::ClassId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    NoMatchingStack,
    ShortStack { have: u32, want: u32 },
    UnknownItemType(String),
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::NoMatchingStack => write!(f, "no matching item stack"),
            InventoryError::ShortStack { have, want } => {
                write!(f, "stack too small: have {have}, want {want}")
            }
            InventoryError::UnknownItemType(t) => write!(f, "unknown item type: {t}"),
        }
    }
}

impl std::error::Error for InventoryError {}

/// Invariant: `amount > 0` for every stack held by an [`Inventory`].
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub class: ClassId,
    pub amount: u32,
    pub data: Option<ItemData>,
}

impl ItemStack {
    pub fn new(class: ClassId, amount: u32, data: Option<ItemData>) -> Self {
        Self {
            class,
            amount,
            data,
        }
    }

    /// Partial-match test. Every given criterion must hold:
    /// - `class`: this stack's class is that class or a subclass of it;
    /// - `exact`: state equal, with absent state equal to `{}`;
    /// - `optional`: fields present in the state must agree, absent ones
    ///   are ignored;
    /// - `must_have`: fields must be present and agree (stateless stacks
    ///   satisfy only an empty `must_have`).
    ///
    /// No criteria at all matches everything.
    pub fn matches(&self, registry: &ClassRegistry, q: &ItemQuery) -> bool {
        if let Some(want) = q.class {
            if !registry.is_subclass(self.class, want) {
                return false;
            }
        }
        if let Some(exact) = &q.exact {
            let same = match &self.data {
                None => exact.is_empty(),
                Some(d) => d == exact,
            };
            if !same {
                return false;
            }
        }
        if let Some(opt) = &q.optional {
            if let Some(d) = &self.data {
                for (k, v) in opt {
                    if let Some(have) = d.get(k) {
                        if have != v {
                            return false;
                        }
                    }
                }
            }
        }
        if !q.must_have.is_empty() {
            let Some(d) = &self.data else {
                return false;
            };
            for (k, v) in &q.must_have {
                if d.get(k) != Some(v) {
                    return false;
                }
            }
        }
        true
    }

    /// A fresh item carrying this stack's class and a copy of its state.
    pub fn to_item(&self) -> Item {
        Item {
            class: self.class,
            data: self.data.clone(),
        }
    }

    pub fn to_save(&self, registry: &ClassRegistry) -> StackSave {
        StackSave {
            item_type: registry.get(self.class).name.clone(),
            amount: self.amount,
            data: if data_is_empty(&self.data) {
                None
            } else {
                self.data.clone()
            },
        }
    }
}

/// Save form of one stack.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSave {
    pub item_type: String,
    pub amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ItemData>,
}

impl StackSave {
    pub fn resolve(&self, registry: &ClassRegistry) -> Result<ItemStack, InventoryError> {
        let class = registry
            .by_name(&self.item_type)
            .ok_or_else(|| InventoryError::UnknownItemType(self.item_type.clone()))?;
        Ok(ItemStack::new(class, self.amount, self.data.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub class: Option<ClassId>,
    pub exact: Option<ItemData>,
    pub optional: Option<ItemData>,
    pub must_have: ItemData,
}

impl ItemQuery {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, c: ClassId) -> Self {
        self.class = Some(c);
        self
    }

    pub fn with_exact(mut self, d: ItemData) -> Self {
        self.exact = Some(d);
        self
    }

    pub fn with_optional(mut self, d: ItemData) -> Self {
        self.optional = Some(d);
        self
    }

    /// Require a field to be present with this value.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.must_have.insert(key.to_string(), value);
        self
    }
}

/// Outcome of resolving a player-typed token against an inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenMatch {
    None,
    One(Item),
    Many,
}

/// Invariant: no empty buckets; within a bucket no two stacks share equal
/// `(class, data)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    buckets: HashMap<String, Vec<ItemStack>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket_key(registry: &ClassRegistry, class: ClassId) -> String {
        registry.get(class).label.to_lowercase()
    }

    /// Add `amount` copies of `item`, merging into an existing stack with
    /// the same class and state if one exists.
    pub fn add(&mut self, registry: &ClassRegistry, item: &Item, amount: u32) {
        if amount == 0 {
            return;
        }
        let key = Self::bucket_key(registry, item.class);
        let stacks = self.buckets.entry(key).or_default();
        for s in stacks.iter_mut() {
            if s.class == item.class && data_eq(&s.data, &item.data) {
                s.amount += amount;
                return;
            }
        }
        stacks.push(ItemStack::new(item.class, amount, item.data.clone()));
    }

    /// Remove `amount` copies of `item` from its exact stack.
    pub fn remove(
        &mut self,
        registry: &ClassRegistry,
        item: &Item,
        amount: u32,
    ) -> Result<(), InventoryError> {
        let key = Self::bucket_key(registry, item.class);
        let stacks = self
            .buckets
            .get_mut(&key)
            .ok_or(InventoryError::NoMatchingStack)?;
        let i = stacks
            .iter()
            .position(|s| s.class == item.class && data_eq(&s.data, &item.data))
            .ok_or(InventoryError::NoMatchingStack)?;
        let have = stacks[i].amount;
        if amount > have {
            return Err(InventoryError::ShortStack { have, want: amount });
        }
        if amount == have {
            stacks.remove(i);
            if stacks.is_empty() {
                self.buckets.remove(&key);
            }
        } else {
            stacks[i].amount -= amount;
        }
        Ok(())
    }

    /// Every stack matching the query, as fresh items with amounts — never
    /// the stored stacks themselves. A `name` restricts the search to that
    /// bucket (case-folded); results come back in bucket order.
    pub fn find(
        &self,
        registry: &ClassRegistry,
        name: Option<&str>,
        q: &ItemQuery,
    ) -> Vec<(Item, u32)> {
        let mut out = Vec::new();
        match name {
            Some(n) => {
                let key = n.trim().to_lowercase();
                if let Some(stacks) = self.buckets.get(&key) {
                    for s in stacks {
                        if s.matches(registry, q) {
                            out.push((s.to_item(), s.amount));
                        }
                    }
                }
            }
            None => {
                let mut keys: Vec<&String> = self.buckets.keys().collect();
                keys.sort_unstable();
                for k in keys {
                    for s in &self.buckets[k] {
                        if s.matches(registry, q) {
                            out.push((s.to_item(), s.amount));
                        }
                    }
                }
            }
        }
        out
    }

    /// Resolve a player-typed token. An exact bucket-name hit wins
    /// outright; otherwise bucket-name prefixes and class aliases are
    /// tried, and anything but a single surviving stack is ambiguous.
    pub fn find_by_token(&self, registry: &ClassRegistry, token: &str) -> TokenMatch {
        let t = token.trim().to_lowercase();
        if t.is_empty() {
            return TokenMatch::None;
        }
        if let Some(stacks) = self.buckets.get(&t) {
            return match stacks.len() {
                1 => TokenMatch::One(stacks[0].to_item()),
                _ => TokenMatch::Many,
            };
        }
        let mut hits: Vec<&ItemStack> = Vec::new();
        let mut keys: Vec<&String> = self.buckets.keys().collect();
        keys.sort_unstable();
        for k in keys {
            let stacks = &self.buckets[k];
            let by_prefix = k.starts_with(&t);
            for s in stacks {
                let by_alias = registry
                    .get(s.class)
                    .item
                    .as_ref()
                    .is_some_and(|spec| spec.matches_token(&t));
                if by_prefix || by_alias {
                    hits.push(s);
                }
            }
        }
        match hits.len() {
            0 => TokenMatch::None,
            1 => TokenMatch::One(hits[0].to_item()),
            _ => TokenMatch::Many,
        }
    }

    /// Buckets and stacks in deterministic order, for rendering and saves.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemStack)> {
        let mut keys: Vec<&String> = self.buckets.keys().collect();
        keys.sort_unstable();
        keys.into_iter()
            .flat_map(|k| self.buckets[k].iter().map(move |s| (k.as_str(), s)))
    }

    pub fn to_save(&self, registry: &ClassRegistry) -> Vec<StackSave> {
        self.iter().map(|(_, s)| s.to_save(registry)).collect()
    }

    pub fn from_save(
        registry: &ClassRegistry,
        saves: &[StackSave],
    ) -> Result<Inventory, InventoryError> {
        let mut inv = Inventory::new();
        for sv in saves {
            let stack = sv.resolve(registry)?;
            let item = stack.to_item();
            inv.add(registry, &item, stack.amount);
        }
        Ok(inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassBuilder;
    use crate::items::ItemSpec;
    use serde_json::json;

    fn registry() -> ClassRegistry {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("item")).unwrap();
        reg.define(
            ClassBuilder::new("potion")
                .parent("item")
                .label("Potion")
                .item(ItemSpec::new().alias("phial")),
        )
        .unwrap();
        reg.define(
            ClassBuilder::new("health_potion")
                .parent("potion")
                .label("Health Potion")
                .item(ItemSpec::new().alias("potion").alias("hp")),
        )
        .unwrap();
        reg.define(
            ClassBuilder::new("sword")
                .parent("item")
                .label("Sword")
                .item(ItemSpec::new().alias("blade")),
        )
        .unwrap();
        reg
    }

    fn hp_item(reg: &ClassRegistry, hp: i64) -> Item {
        let mut d = ItemData::new();
        d.insert("hp".to_string(), json!(hp));
        Item::with_data(reg.by_name("health_potion").unwrap(), d)
    }

    #[test]
    fn equal_state_merges_distinct_state_stacks() {
        let reg = registry();
        let mut inv = Inventory::new();
        inv.add(&reg, &hp_item(&reg, 10), 1);
        inv.add(&reg, &hp_item(&reg, 5), 1);

        let all = inv.find(&reg, Some("Health Potion"), &ItemQuery::any());
        assert_eq!(all.len(), 2);

        inv.add(&reg, &hp_item(&reg, 10), 1);
        let tens = inv.find(
            &reg,
            None,
            &ItemQuery::any().with_field("hp", json!(10)),
        );
        assert_eq!(tens.len(), 1);
        assert_eq!(tens[0].1, 2);
    }

    #[test]
    fn add_then_remove_restores_prior_state_exactly() {
        let reg = registry();
        let sword = Item::new(reg.by_name("sword").unwrap());

        let mut inv = Inventory::new();
        inv.add(&reg, &hp_item(&reg, 10), 3);
        let before = inv.clone();

        inv.add(&reg, &sword, 2);
        inv.remove(&reg, &sword, 2).unwrap();
        assert_eq!(inv, before);

        // The bucket itself disappears, not just the stack.
        assert!(inv.find(&reg, Some("sword"), &ItemQuery::any()).is_empty());
    }

    #[test]
    fn remove_errors_are_explicit() {
        let reg = registry();
        let mut inv = Inventory::new();
        inv.add(&reg, &hp_item(&reg, 10), 2);

        assert_eq!(
            inv.remove(&reg, &hp_item(&reg, 99), 1),
            Err(InventoryError::NoMatchingStack)
        );
        assert_eq!(
            inv.remove(&reg, &hp_item(&reg, 10), 3),
            Err(InventoryError::ShortStack { have: 2, want: 3 })
        );
        // Failed removals leave the stack untouched.
        assert_eq!(
            inv.find(&reg, None, &ItemQuery::any())[0].1,
            2
        );
    }

    #[test]
    fn matches_with_no_criteria_is_always_true() {
        let reg = registry();
        let s = ItemStack::new(reg.by_name("sword").unwrap(), 1, None);
        assert!(s.matches(&reg, &ItemQuery::any()));
    }

    #[test]
    fn exact_empty_means_no_data() {
        let reg = registry();
        let plain = ItemStack::new(reg.by_name("sword").unwrap(), 1, None);
        let with_data = ItemStack::new(
            reg.by_name("sword").unwrap(),
            1,
            Some(ItemData::from([("nicked".to_string(), json!(true))])),
        );
        let q = ItemQuery::any().with_exact(ItemData::new());
        assert!(plain.matches(&reg, &q));
        assert!(!with_data.matches(&reg, &q));
    }

    #[test]
    fn optional_ignores_absent_fields_but_must_have_requires_them() {
        let reg = registry();
        let stack = ItemStack::new(
            reg.by_name("health_potion").unwrap(),
            1,
            Some(ItemData::from([("hp".to_string(), json!(10))])),
        );

        let opt = ItemQuery::any().with_optional(ItemData::from([
            ("hp".to_string(), json!(10)),
            ("label".to_string(), json!("minty")),
        ]));
        assert!(stack.matches(&reg, &opt));

        let opt_bad = ItemQuery::any()
            .with_optional(ItemData::from([("hp".to_string(), json!(5))]));
        assert!(!stack.matches(&reg, &opt_bad));

        let must = ItemQuery::any().with_field("label", json!("minty"));
        assert!(!stack.matches(&reg, &must));

        // A stateless stack satisfies only an empty must-have.
        let bare = ItemStack::new(reg.by_name("health_potion").unwrap(), 1, None);
        assert!(bare.matches(&reg, &ItemQuery::any()));
        assert!(!bare.matches(&reg, &ItemQuery::any().with_field("hp", json!(10))));
    }

    #[test]
    fn class_criterion_accepts_subclasses() {
        let reg = registry();
        let potion = reg.by_name("potion").unwrap();
        let stack = ItemStack::new(reg.by_name("health_potion").unwrap(), 1, None);
        assert!(stack.matches(&reg, &ItemQuery::any().with_class(potion)));
        let sword = ItemStack::new(reg.by_name("sword").unwrap(), 1, None);
        assert!(!sword.matches(&reg, &ItemQuery::any().with_class(potion)));
    }

    #[test]
    fn find_yields_fresh_items_not_live_state() {
        let reg = registry();
        let mut inv = Inventory::new();
        inv.add(&reg, &hp_item(&reg, 10), 1);

        let mut found = inv.find(&reg, None, &ItemQuery::any());
        let (item, _) = found.pop().unwrap();
        let mut mutated = item.clone();
        mutated.set_field("hp", json!(999));

        // The stored stack still answers with the original state.
        let again = inv.find(&reg, None, &ItemQuery::any().with_field("hp", json!(10)));
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn token_resolution_handles_prefixes_aliases_and_ambiguity() {
        let reg = registry();
        let mut inv = Inventory::new();
        let sword = Item::new(reg.by_name("sword").unwrap());
        inv.add(&reg, &sword, 1);

        assert_eq!(inv.find_by_token(&reg, "sword"), TokenMatch::One(sword.clone()));
        assert_eq!(inv.find_by_token(&reg, "sw"), TokenMatch::One(sword.clone()));
        assert_eq!(inv.find_by_token(&reg, "blade"), TokenMatch::One(sword));
        assert_eq!(inv.find_by_token(&reg, "axe"), TokenMatch::None);

        inv.add(&reg, &hp_item(&reg, 10), 1);
        inv.add(&reg, &hp_item(&reg, 5), 1);
        // Two stacks in the bucket: an exact name is still ambiguous.
        assert_eq!(inv.find_by_token(&reg, "health potion"), TokenMatch::Many);
    }

    #[test]
    fn save_form_round_trips() {
        let reg = registry();
        let mut inv = Inventory::new();
        inv.add(&reg, &hp_item(&reg, 10), 2);
        inv.add(&reg, &Item::new(reg.by_name("sword").unwrap()), 1);

        let saves = inv.to_save(&reg);
        let js = serde_json::to_string(&saves).unwrap();
        assert!(js.contains("\"itemType\":\"health_potion\""));
        let back: Vec<StackSave> = serde_json::from_str(&js).unwrap();
        assert_eq!(Inventory::from_save(&reg, &back).unwrap(), inv);

        let bogus = StackSave {
            item_type: "anvil".to_string(),
            amount: 1,
            data: None,
        };
        assert_eq!(
            Inventory::from_save(&reg, &[bogus]),
            Err(InventoryError::UnknownItemType("anvil".to_string()))
        );
    }
}
