//! Whitelist/blacklist permission filters attached to action descriptors.
//!
//! A filter answers one question: may this character (or this class) use
//! the grant it guards? Specific characters can be pinned in or out ahead
//! of any class decision; the class decision walks the subject's linearized
//! ancestry. "Not found" resolves to the opposite of what "found" would
//! grant, so an empty blacklist permits everyone and an empty whitelist
//! permits no one.
//!
//! Filters are satellite data: a descriptor and everything derived from it
//! share one filter by reference, so a filter attached once at class
//! definition time governs every per-character specialization. Character
//! references inside filters are non-owning; the [`FilterBook`] strips a
//! destroyed character out of every live filter.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::classes::ClassRegistry;
use crate::{ActorId, ClassId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Whitelist,
    Blacklist,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::Whitelist => "whitelist",
            FilterMode::Blacklist => "blacklist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" => Some(FilterMode::Whitelist),
            "blacklist" => Some(FilterMode::Blacklist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    UnknownMode(String),
    UnknownClass(String),
    UnknownChar(String),
    BothSets(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::UnknownMode(m) => write!(f, "unknown filter mode: {m}"),
            FilterError::UnknownClass(c) => write!(f, "filter references unknown class: {c}"),
            FilterError::UnknownChar(c) => write!(f, "filter references unknown character: {c}"),
            FilterError::BothSets(c) => {
                write!(f, "character in both include and exclude sets: {c}")
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Invariant: no actor id is ever in both actor sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    mode: FilterMode,
    classes: HashSet<ClassId>,
    include_actors: HashSet<ActorId>,
    exclude_actors: HashSet<ActorId>,
}

impl Filter {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            classes: HashSet::new(),
            include_actors: HashSet::new(),
            exclude_actors: HashSet::new(),
        }
    }

    /// An empty blacklist: permits everyone.
    pub fn open() -> Self {
        Self::new(FilterMode::Blacklist)
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn with_class(mut self, c: ClassId) -> Self {
        self.classes.insert(c);
        self
    }

    /// Grant to a class. On a whitelist this records the class; on a
    /// blacklist it lifts a recorded denial (blacklists track only denials).
    pub fn include_class(&mut self, c: ClassId) {
        match self.mode {
            FilterMode::Whitelist => {
                self.classes.insert(c);
            }
            FilterMode::Blacklist => {
                self.classes.remove(&c);
            }
        }
    }

    /// Deny to a class. Mirror of [`Filter::include_class`].
    pub fn exclude_class(&mut self, c: ClassId) {
        match self.mode {
            FilterMode::Whitelist => {
                self.classes.remove(&c);
            }
            FilterMode::Blacklist => {
                self.classes.insert(c);
            }
        }
    }

    /// Pin a specific character in, clearing any pin-out first.
    pub fn include_actor(&mut self, a: ActorId) {
        self.exclude_actors.remove(&a);
        self.include_actors.insert(a);
    }

    /// Pin a specific character out, clearing any pin-in first.
    pub fn exclude_actor(&mut self, a: ActorId) {
        self.include_actors.remove(&a);
        self.exclude_actors.insert(a);
    }

    /// Drop every reference to `a`. Returns whether anything was removed.
    pub fn forget_actor(&mut self, a: ActorId) -> bool {
        let inc = self.include_actors.remove(&a);
        let exc = self.exclude_actors.remove(&a);
        inc || exc
    }

    pub fn permits_actor(&self, registry: &ClassRegistry, actor: ActorId, class: ClassId) -> bool {
        if self.include_actors.contains(&actor) {
            return true;
        }
        if self.exclude_actors.contains(&actor) {
            return false;
        }
        self.permits_class(registry, class)
    }

    pub fn permits_class(&self, registry: &ClassRegistry, class: ClassId) -> bool {
        let found = registry
            .linearize(class)
            .iter()
            .any(|c| self.classes.contains(c));
        match self.mode {
            FilterMode::Whitelist => found,
            FilterMode::Blacklist => !found,
        }
    }

    pub fn to_spec(&self, registry: &ClassRegistry, names: &HashMap<ActorId, String>) -> FilterSpec {
        let mut classes: Vec<String> = self
            .classes
            .iter()
            .map(|c| registry.get(*c).name.clone())
            .collect();
        classes.sort_unstable();
        let mut include_chars: Vec<String> = self
            .include_actors
            .iter()
            .filter_map(|a| names.get(a).cloned())
            .collect();
        include_chars.sort_unstable();
        let mut exclude_chars: Vec<String> = self
            .exclude_actors
            .iter()
            .filter_map(|a| names.get(a).cloned())
            .collect();
        exclude_chars.sort_unstable();
        FilterSpec {
            mode: self.mode.as_str().to_string(),
            classes,
            include_chars,
            exclude_chars,
        }
    }
}

/// Save/load form of a filter. Everything but `mode` defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_chars: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_chars: Vec<String>,
}

impl FilterSpec {
    /// Resolve names against the class registry and a character name table.
    pub fn resolve(
        &self,
        registry: &ClassRegistry,
        chars: &HashMap<String, ActorId>,
    ) -> Result<Filter, FilterError> {
        let mode = FilterMode::parse(&self.mode)
            .ok_or_else(|| FilterError::UnknownMode(self.mode.clone()))?;
        let mut f = Filter::new(mode);
        for name in &self.classes {
            let id = registry
                .by_name(name)
                .ok_or_else(|| FilterError::UnknownClass(name.clone()))?;
            f.classes.insert(id);
        }
        let lookup = |name: &str| -> Result<ActorId, FilterError> {
            chars
                .get(&name.trim().to_ascii_lowercase())
                .copied()
                .ok_or_else(|| FilterError::UnknownChar(name.to_string()))
        };
        for name in &self.include_chars {
            f.include_actors.insert(lookup(name)?);
        }
        for name in &self.exclude_chars {
            let id = lookup(name)?;
            if f.include_actors.contains(&id) {
                return Err(FilterError::BothSets(name.clone()));
            }
            f.exclude_actors.insert(id);
        }
        Ok(f)
    }
}

/// Shared handle to a filter. Cloning shares, never copies: mutating the
/// filter through one handle is visible through every descriptor derived
/// from the original.
#[derive(Clone, Debug)]
pub struct FilterHandle(Arc<RwLock<Filter>>);

impl FilterHandle {
    fn new(f: Filter) -> Self {
        Self(Arc::new(RwLock::new(f)))
    }

    pub fn permits_actor(&self, registry: &ClassRegistry, actor: ActorId, class: ClassId) -> bool {
        self.0.read().permits_actor(registry, actor, class)
    }

    pub fn permits_class(&self, registry: &ClassRegistry, class: ClassId) -> bool {
        self.0.read().permits_class(registry, class)
    }

    pub fn include_actor(&self, a: ActorId) {
        self.0.write().include_actor(a);
    }

    pub fn exclude_actor(&self, a: ActorId) {
        self.0.write().exclude_actor(a);
    }

    pub fn include_class(&self, c: ClassId) {
        self.0.write().include_class(c);
    }

    pub fn exclude_class(&self, c: ClassId) {
        self.0.write().exclude_class(c);
    }

    pub fn snapshot(&self) -> Filter {
        self.0.read().clone()
    }
}

/// Mints filter handles and remembers a weak reference to each, so a
/// destroyed character can be stripped out of every filter still alive —
/// filters never extend a character's lifetime.
#[derive(Debug, Default)]
pub struct FilterBook {
    minted: Vec<Weak<RwLock<Filter>>>,
}

impl FilterBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, f: Filter) -> FilterHandle {
        let h = FilterHandle::new(f);
        self.minted.push(Arc::downgrade(&h.0));
        h
    }

    /// Remove `a` from every live filter. Returns how many filters held a
    /// reference to it. Dead weak entries are compacted away as a side
    /// effect.
    pub fn invalidate_actor(&mut self, a: ActorId) -> usize {
        let mut touched = 0;
        self.minted.retain(|w| match w.upgrade() {
            Some(f) => {
                if f.write().forget_actor(a) {
                    touched += 1;
                }
                true
            }
            None => false,
        });
        touched
    }

    pub fn live_count(&self) -> usize {
        self.minted.iter().filter(|w| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{ClassBuilder, ClassRegistry};

    fn registry() -> ClassRegistry {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("creature")).unwrap();
        reg.define(ClassBuilder::new("humanoid").parent("creature"))
            .unwrap();
        reg.define(ClassBuilder::new("goblin").parent("humanoid"))
            .unwrap();
        reg
    }

    #[test]
    fn blacklist_by_default_permits_everyone() {
        let reg = registry();
        let goblin = reg.by_name("goblin").unwrap();
        let f = Filter::open();
        assert!(f.permits_class(&reg, goblin));
        assert!(f.permits_actor(&reg, 1, goblin));
    }

    #[test]
    fn whitelist_by_default_permits_no_one() {
        let reg = registry();
        let goblin = reg.by_name("goblin").unwrap();
        let f = Filter::new(FilterMode::Whitelist);
        assert!(!f.permits_class(&reg, goblin));
    }

    #[test]
    fn class_decision_walks_ancestry() {
        let reg = registry();
        let creature = reg.by_name("creature").unwrap();
        let goblin = reg.by_name("goblin").unwrap();

        let wl = Filter::new(FilterMode::Whitelist).with_class(creature);
        assert!(wl.permits_class(&reg, goblin));

        let bl = Filter::new(FilterMode::Blacklist).with_class(creature);
        assert!(!bl.permits_class(&reg, goblin));
    }

    #[test]
    fn actor_pins_beat_the_class_decision() {
        let reg = registry();
        let goblin = reg.by_name("goblin").unwrap();

        let mut f = Filter::new(FilterMode::Whitelist);
        assert!(!f.permits_actor(&reg, 7, goblin));
        f.include_actor(7);
        assert!(f.permits_actor(&reg, 7, goblin));

        let mut g = Filter::open();
        g.exclude_actor(7);
        assert!(!g.permits_actor(&reg, 7, goblin));
        assert!(g.permits_actor(&reg, 8, goblin));
    }

    #[test]
    fn last_include_or_exclude_wins() {
        let mut f = Filter::open();
        f.include_actor(5);
        f.exclude_actor(5);
        assert!(f.exclude_actors.contains(&5));
        assert!(!f.include_actors.contains(&5));

        f.include_actor(5);
        assert!(f.include_actors.contains(&5));
        assert!(!f.exclude_actors.contains(&5));
    }

    #[test]
    fn class_edits_respect_the_mode() {
        let reg = registry();
        let goblin = reg.by_name("goblin").unwrap();

        let mut wl = Filter::new(FilterMode::Whitelist);
        // Excluding from a whitelist that never granted is a no-op.
        wl.exclude_class(goblin);
        assert!(wl.classes.is_empty());
        wl.include_class(goblin);
        assert!(wl.classes.contains(&goblin));
        wl.exclude_class(goblin);
        assert!(wl.classes.is_empty());

        let mut bl = Filter::open();
        bl.exclude_class(goblin);
        assert!(bl.classes.contains(&goblin));
        bl.include_class(goblin);
        assert!(bl.classes.is_empty());
    }

    #[test]
    fn spec_resolution_rejects_bad_configs() {
        let reg = registry();
        let mut chars = HashMap::new();
        chars.insert("alice".to_string(), 1u64);

        let bad_mode = FilterSpec {
            mode: "greylist".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(
            bad_mode.resolve(&reg, &chars),
            Err(FilterError::UnknownMode("greylist".to_string()))
        );

        let both = FilterSpec {
            mode: "blacklist".to_string(),
            include_chars: vec!["alice".to_string()],
            exclude_chars: vec!["alice".to_string()],
            ..FilterSpec::default()
        };
        assert_eq!(
            both.resolve(&reg, &chars),
            Err(FilterError::BothSets("alice".to_string()))
        );

        let unknown = FilterSpec {
            mode: "whitelist".to_string(),
            classes: vec!["dragon".to_string()],
            ..FilterSpec::default()
        };
        assert_eq!(
            unknown.resolve(&reg, &chars),
            Err(FilterError::UnknownClass("dragon".to_string()))
        );
    }

    #[test]
    fn spec_round_trips_through_json() {
        let reg = registry();
        let mut chars = HashMap::new();
        chars.insert("alice".to_string(), 1u64);
        chars.insert("bob".to_string(), 2u64);

        let spec = FilterSpec {
            mode: "whitelist".to_string(),
            classes: vec!["humanoid".to_string()],
            include_chars: vec!["alice".to_string()],
            exclude_chars: vec!["bob".to_string()],
        };
        let js = serde_json::to_string(&spec).unwrap();
        assert!(js.contains("includeChars"));
        assert!(js.contains("excludeChars"));
        let back: FilterSpec = serde_json::from_str(&js).unwrap();
        assert_eq!(back, spec);

        // A bare mode is a complete wire form.
        let minimal: FilterSpec = serde_json::from_str(r#"{"mode":"blacklist"}"#).unwrap();
        let f = minimal.resolve(&reg, &chars).unwrap();
        assert!(f.permits_actor(&reg, 1, reg.by_name("goblin").unwrap()));

        let mut names = HashMap::new();
        names.insert(1u64, "alice".to_string());
        names.insert(2u64, "bob".to_string());
        let resolved = spec.resolve(&reg, &chars).unwrap();
        assert_eq!(resolved.to_spec(&reg, &names), spec);
    }

    #[test]
    fn book_strips_destroyed_actors_from_live_filters() {
        let mut book = FilterBook::new();
        let h1 = book.mint(Filter::open());
        let h2 = book.mint(Filter::open());
        h1.exclude_actor(9);
        h2.include_actor(9);

        assert_eq!(book.invalidate_actor(9), 2);
        assert!(h1.snapshot().exclude_actors.is_empty());
        assert!(h2.snapshot().include_actors.is_empty());

        drop(h2);
        assert_eq!(book.invalidate_actor(1), 0);
        assert_eq!(book.live_count(), 1);
    }
}
