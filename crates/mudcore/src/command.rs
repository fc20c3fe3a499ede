//! Action descriptors: named, permission-guarded, partially-applied
//! invocables bound to verbs.
//!
//! Identity is structural and covers `(function, bound args, bound
//! keywords)` only. Display name, provenance label, and filter are
//! satellite data: excluded from equality and hashing, and shared (not
//! copied) through [`Action::specify`]. Two descriptors derived through
//! different `specify` chains compare equal whenever they end up with the
//! same triple — that is what lets a live table remove exactly the value
//! that was registered, re-derived from scratch at removal time.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::filter::FilterHandle;
use crate::items::EquipSlot;
use crate::world::World;
use crate::{ActorId, ClassId, EntityId};

/// Where a grant came from: an entity, or an item equipped on a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceRef {
    Entity(EntityId),
    Equipped(ActorId, EquipSlot),
}

/// Values that can be partially applied onto a descriptor. Must stay
/// cheap to clone and structurally comparable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoundValue {
    Str(String),
    Int(i64),
    Actor(ActorId),
    Entity(EntityId),
    Class(ClassId),
    Source(SourceRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// User-facing: a message for the character, state untouched.
    Reply(String),
    /// Bookkeeping went out of sync with the world. Never swallowed.
    Logic(String),
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionError::Reply(m) => write!(f, "{m}"),
            ActionError::Logic(m) => write!(f, "logic error: {m}"),
        }
    }
}

impl std::error::Error for ActionError {}

/// What a handler sees when its verb fires.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The character the verb was dispatched for.
    pub actor: ActorId,
    /// The key the verb was registered under (may carry a collision suffix).
    pub verb: String,
    pub args: Vec<BoundValue>,
    pub kwargs: BTreeMap<String, BoundValue>,
    /// Raw argument tokens from the parser boundary.
    pub tokens: Vec<String>,
}

impl Invocation {
    /// The source bound into this grant, if any.
    pub fn source(&self) -> Option<SourceRef> {
        self.args.iter().find_map(|v| match v {
            BoundValue::Source(s) => Some(*s),
            _ => None,
        })
    }
}

pub type ActionFn = fn(&mut World, &Invocation) -> Result<String, ActionError>;

#[derive(Clone, Debug)]
pub struct Action {
    func: ActionFn,
    fn_name: &'static str,
    args: Vec<BoundValue>,
    kwargs: BTreeMap<String, BoundValue>,
    display: Option<Arc<str>>,
    provenance: Option<Arc<str>>,
    filter: FilterHandle,
}

impl Action {
    pub fn new(func: ActionFn, fn_name: &'static str, filter: FilterHandle) -> Self {
        Self {
            func,
            fn_name,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            display: None,
            provenance: None,
            filter,
        }
    }

    /// Derive a descriptor with more arguments applied. Positional bindings
    /// append; keyword bindings merge with later values winning. Satellite
    /// data is shared with `self`, not copied.
    pub fn specify<A, K>(&self, args: A, kwargs: K) -> Action
    where
        A: IntoIterator<Item = BoundValue>,
        K: IntoIterator<Item = (String, BoundValue)>,
    {
        let mut out = self.clone();
        out.args.extend(args);
        for (k, v) in kwargs {
            out.kwargs.insert(k, v);
        }
        out
    }

    /// [`Action::specify`] with positional bindings only.
    pub fn specify_args<A>(&self, args: A) -> Action
    where
        A: IntoIterator<Item = BoundValue>,
    {
        self.specify(args, std::iter::empty())
    }

    /// [`Action::specify`] with keyword bindings only.
    pub fn specify_kwargs<K>(&self, kwargs: K) -> Action
    where
        K: IntoIterator<Item = (String, BoundValue)>,
    {
        self.specify(std::iter::empty(), kwargs)
    }

    pub fn invoke(
        &self,
        world: &mut World,
        actor: ActorId,
        verb: &str,
        tokens: &[String],
    ) -> Result<String, ActionError> {
        let inv = Invocation {
            actor,
            verb: verb.to_string(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            tokens: tokens.to_vec(),
        };
        (self.func)(world, &inv)
    }

    pub fn display_name(&self) -> &str {
        self.display.as_deref().unwrap_or(self.fn_name)
    }

    pub fn provenance(&self) -> Option<&str> {
        self.provenance.as_deref()
    }

    pub fn filter(&self) -> &FilterHandle {
        &self.filter
    }

    pub fn fn_name(&self) -> &'static str {
        self.fn_name
    }

    pub fn bound_args(&self) -> &[BoundValue] {
        &self.args
    }

    pub fn bound_kwargs(&self) -> &BTreeMap<String, BoundValue> {
        &self.kwargs
    }

    pub fn with_display(mut self, name: &str) -> Self {
        self.display = Some(Arc::from(name));
        self
    }

    pub(crate) fn set_provenance(&mut self, label: Arc<str>) {
        self.provenance = Some(label);
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.func as usize == other.func as usize
            && self.args == other.args
            && self.kwargs == other.kwargs
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.func as usize).hash(state);
        self.args.hash(state);
        self.kwargs.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, FilterBook};
    use std::collections::hash_map::DefaultHasher;

    fn noop(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("noop".to_string())
    }

    fn other(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("other".to_string())
    }

    fn hash_of(a: &Action) -> u64 {
        let mut h = DefaultHasher::new();
        a.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equality_ignores_satellite_data() {
        let mut book = FilterBook::new();
        let a = Action::new(noop, "wave", book.mint(Filter::open()));
        let b = Action::new(noop, "wave", book.mint(Filter::open())).with_display("flourish");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = Action::new(other, "wave", book.mint(Filter::open()));
        assert_ne!(a, c);
    }

    #[test]
    fn different_derivation_paths_compare_equal() {
        let mut book = FilterBook::new();
        let base = Action::new(noop, "wave", book.mint(Filter::open()));

        let one = base.specify(
            [BoundValue::Actor(1), BoundValue::Int(3)],
            [("force".to_string(), BoundValue::Int(2))],
        );
        let two = base
            .specify_args([BoundValue::Actor(1)])
            .specify(
                [BoundValue::Int(3)],
                [("force".to_string(), BoundValue::Int(9))],
            )
            .specify_kwargs([("force".to_string(), BoundValue::Int(2))]);

        assert_eq!(one, two);
        assert_eq!(hash_of(&one), hash_of(&two));
    }

    #[test]
    fn later_keyword_bindings_win() {
        let mut book = FilterBook::new();
        let base = Action::new(noop, "wave", book.mint(Filter::open()));
        let d = base
            .specify_kwargs([("n".to_string(), BoundValue::Int(1))])
            .specify_kwargs([("n".to_string(), BoundValue::Int(2))]);
        assert_eq!(d.bound_kwargs()["n"], BoundValue::Int(2));
    }

    #[test]
    fn derived_descriptors_share_one_filter() {
        let mut reg = crate::classes::ClassRegistry::new();
        reg.define(crate::classes::ClassBuilder::new("creature"))
            .unwrap();
        let creature = reg.by_name("creature").unwrap();

        let mut book = FilterBook::new();
        let base = Action::new(noop, "wave", book.mint(Filter::open()));
        let derived = base.specify_args([BoundValue::Actor(4)]);

        // Mutating through the derived handle is visible on the original.
        derived.filter().exclude_actor(4);
        assert!(!base.filter().permits_actor(&reg, 4, creature));
        assert!(base.filter().permits_actor(&reg, 5, creature));
    }

    #[test]
    fn display_name_defaults_to_function_name() {
        let mut book = FilterBook::new();
        let a = Action::new(noop, "wave", book.mint(Filter::open()));
        assert_eq!(a.display_name(), "wave");
        let b = a.clone().with_display("grand wave");
        assert_eq!(b.display_name(), "grand wave");
    }
}
