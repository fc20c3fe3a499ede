//! Class definitions and their action tables.
//!
//! A class declares its actions through an explicit builder; nothing is
//! discovered by introspection. At definition time the registry linearizes
//! the class's ancestry and folds every ancestor's locally-declared actions
//! into one `all_actions` table, most general first, so more-derived
//! declarations overwrite inherited ones and a class's own declarations win
//! outright — including against same-named entries inherited from a more
//! specific sibling in a diamond. Tables are immutable once defined and can
//! be shared read-only.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::command::{Action, ActionFn};
use crate::filter::{Filter, FilterBook, FilterHandle};
use crate::items::ItemSpec;
use crate::ClassId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    BadName(String),
    DuplicateName(String),
    UnknownParent(String),
}

impl std::fmt::Display for ClassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassError::BadName(n) => write!(f, "bad class name: {n:?}"),
            ClassError::DuplicateName(n) => write!(f, "class already defined: {n}"),
            ClassError::UnknownParent(n) => write!(f, "unknown parent class: {n}"),
        }
    }
}

impl std::error::Error for ClassError {}

struct ActionDecl {
    name: &'static str,
    func: ActionFn,
    filter: Option<Filter>,
    display: Option<String>,
}

pub struct ClassBuilder {
    name: String,
    label: Option<String>,
    parents: Vec<String>,
    actions: Vec<ActionDecl>,
    item: Option<ItemSpec>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            label: None,
            parents: Vec::new(),
            actions: Vec::new(),
            item: None,
        }
    }

    /// Display label, also used as the provenance stamp on this class's
    /// actions and as the inventory bucket name for item classes. Defaults
    /// to the class name.
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Parents are resolved in declaration order; an earlier parent beats a
    /// later one where their action tables overlap.
    pub fn parent(mut self, name: &str) -> Self {
        self.parents.push(name.trim().to_ascii_lowercase());
        self
    }

    pub fn action(mut self, name: &'static str, func: ActionFn) -> Self {
        self.actions.push(ActionDecl {
            name,
            func,
            filter: None,
            display: None,
        });
        self
    }

    pub fn action_filtered(mut self, name: &'static str, func: ActionFn, filter: Filter) -> Self {
        self.actions.push(ActionDecl {
            name,
            func,
            filter: Some(filter),
            display: None,
        });
        self
    }

    pub fn action_display(mut self, name: &'static str, func: ActionFn, display: &str) -> Self {
        self.actions.push(ActionDecl {
            name,
            func,
            filter: None,
            display: Some(display.to_string()),
        });
        self
    }

    pub fn item(mut self, spec: ItemSpec) -> Self {
        self.item = Some(spec);
        self
    }
}

pub struct ClassDef {
    pub id: ClassId,
    pub name: String,
    pub label: String,
    pub parents: Vec<ClassId>,
    pub item: Option<ItemSpec>,
    linear: Vec<ClassId>,
    local_actions: BTreeMap<String, Action>,
    all_actions: BTreeMap<String, Action>,
}

impl ClassDef {
    /// Actions declared directly on this class.
    pub fn local_actions(&self) -> &BTreeMap<String, Action> {
        &self.local_actions
    }

    /// The merged table: this class's declarations over its ancestry.
    pub fn all_actions(&self) -> &BTreeMap<String, Action> {
        &self.all_actions
    }

    /// Ancestry linearization, this class first, most general last.
    pub fn linear(&self) -> &[ClassId] {
        &self.linear
    }
}

#[derive(Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDef>,
    ids_by_name: HashMap<String, ClassId>,
    filters: FilterBook,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, b: ClassBuilder) -> Result<ClassId, ClassError> {
        if b.name.is_empty() {
            return Err(ClassError::BadName(b.name));
        }
        if self.ids_by_name.contains_key(&b.name) {
            return Err(ClassError::DuplicateName(b.name));
        }
        let mut parents = Vec::with_capacity(b.parents.len());
        for p in &b.parents {
            let pid = self
                .by_name(p)
                .ok_or_else(|| ClassError::UnknownParent(p.clone()))?;
            parents.push(pid);
        }

        let id = self.classes.len() as ClassId;
        let linear = self.linearize_from(id, &parents);

        let label = b.label.unwrap_or_else(|| b.name.clone());
        let prov: Arc<str> = Arc::from(label.as_str());
        let mut local_actions = BTreeMap::new();
        for decl in b.actions {
            let handle = self
                .filters
                .mint(decl.filter.unwrap_or_else(Filter::open));
            let mut act = Action::new(decl.func, decl.name, handle);
            if let Some(d) = &decl.display {
                act = act.with_display(d);
            }
            act.set_provenance(prov.clone());
            local_actions.insert(decl.name.to_string(), act);
        }

        // Fold most general first; this class's own declarations land last
        // and therefore always win.
        let mut all_actions = BTreeMap::new();
        for &c in linear.iter().rev() {
            let src = if c == id {
                &local_actions
            } else {
                &self.classes[c as usize].local_actions
            };
            for (k, v) in src {
                all_actions.insert(k.clone(), v.clone());
            }
        }

        self.ids_by_name.insert(b.name.clone(), id);
        self.classes.push(ClassDef {
            id,
            name: b.name,
            label,
            parents,
            item: b.item,
            linear,
            local_actions,
            all_actions,
        });
        Ok(id)
    }

    /// Pre-order walk over `id` and its parents' cached linearizations,
    /// deduplicated keeping the last occurrence: every class precedes all
    /// of its ancestors, and an earlier-declared parent's entries sit
    /// before a later sibling's.
    fn linearize_from(&self, id: ClassId, parents: &[ClassId]) -> Vec<ClassId> {
        let mut seq = vec![id];
        for &p in parents {
            seq.extend_from_slice(self.classes[p as usize].linear());
        }
        let mut out = Vec::with_capacity(seq.len());
        for (i, c) in seq.iter().enumerate() {
            if !seq[i + 1..].contains(c) {
                out.push(*c);
            }
        }
        out
    }

    /// Ids are minted by [`ClassRegistry::define`]; passing anything else
    /// is a caller bug.
    pub fn get(&self, id: ClassId) -> &ClassDef {
        &self.classes[id as usize]
    }

    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.ids_by_name
            .get(&name.trim().to_ascii_lowercase())
            .copied()
    }

    pub fn linearize(&self, id: ClassId) -> &[ClassId] {
        self.get(id).linear()
    }

    pub fn is_subclass(&self, sub: ClassId, ancestor: ClassId) -> bool {
        self.linearize(sub).contains(&ancestor)
    }

    pub fn mint_filter(&mut self, f: Filter) -> FilterHandle {
        self.filters.mint(f)
    }

    /// See [`FilterBook::invalidate_actor`].
    pub fn invalidate_actor(&mut self, a: crate::ActorId) -> usize {
        self.filters.invalidate_actor(a)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ActionError, Invocation};
    use crate::world::World;

    fn act_a(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("a".to_string())
    }

    fn act_b(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("b".to_string())
    }

    fn act_c(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("c".to_string())
    }

    fn act_d(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
        Ok("d".to_string())
    }

    #[test]
    fn diamond_linearization_keeps_most_general_last() {
        let mut reg = ClassRegistry::new();
        let a = reg.define(ClassBuilder::new("a")).unwrap();
        let b = reg.define(ClassBuilder::new("b").parent("a")).unwrap();
        let c = reg.define(ClassBuilder::new("c").parent("a")).unwrap();
        let d = reg
            .define(ClassBuilder::new("d").parent("b").parent("c"))
            .unwrap();
        assert_eq!(reg.linearize(d), &[d, b, c, a]);
        assert_eq!(reg.linearize(b), &[b, a]);
        assert!(reg.is_subclass(d, a));
        assert!(!reg.is_subclass(a, d));
    }

    #[test]
    fn more_derived_classes_override_inherited_actions() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("base").action("open", act_a))
            .unwrap();
        let sub = reg
            .define(ClassBuilder::new("sub").parent("base").action("open", act_b))
            .unwrap();

        let table = reg.get(sub).all_actions();
        let base_open = Action::new(act_b, "open", {
            let mut book = FilterBook::new();
            book.mint(Filter::open())
        });
        assert_eq!(table["open"], base_open);
    }

    #[test]
    fn own_declarations_beat_a_more_specific_sibling_in_a_diamond() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("a").action("open", act_a))
            .unwrap();
        reg.define(ClassBuilder::new("b").parent("a").action("open", act_b))
            .unwrap();
        reg.define(ClassBuilder::new("c").parent("a")).unwrap();
        let d = reg
            .define(
                ClassBuilder::new("d")
                    .parent("b")
                    .parent("c")
                    .action("open", act_d),
            )
            .unwrap();

        let mut book = FilterBook::new();
        assert_eq!(
            reg.get(d).all_actions()["open"],
            Action::new(act_d, "open", book.mint(Filter::open()))
        );
    }

    #[test]
    fn earlier_parent_beats_later_sibling() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("left").action("pull", act_b))
            .unwrap();
        reg.define(ClassBuilder::new("right").action("pull", act_c))
            .unwrap();
        let d = reg
            .define(ClassBuilder::new("both").parent("left").parent("right"))
            .unwrap();

        let mut book = FilterBook::new();
        assert_eq!(
            reg.get(d).all_actions()["pull"],
            Action::new(act_b, "pull", book.mint(Filter::open()))
        );
    }

    #[test]
    fn inherited_actions_flow_down_and_locals_are_stamped() {
        let mut reg = ClassRegistry::new();
        reg.define(
            ClassBuilder::new("base")
                .label("Base Creature")
                .action("look", act_a),
        )
        .unwrap();
        let sub = reg
            .define(ClassBuilder::new("sub").parent("base").action("kick", act_c))
            .unwrap();

        let def = reg.get(sub);
        assert_eq!(def.local_actions().len(), 1);
        assert_eq!(def.all_actions().len(), 2);
        assert_eq!(
            def.all_actions()["look"].provenance(),
            Some("Base Creature")
        );
        assert_eq!(def.all_actions()["kick"].provenance(), Some("sub"));
    }

    #[test]
    fn duplicate_and_unknown_names_are_rejected() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassBuilder::new("a")).unwrap();
        assert_eq!(
            reg.define(ClassBuilder::new("A")),
            Err(ClassError::DuplicateName("a".to_string()))
        );
        assert_eq!(
            reg.define(ClassBuilder::new("b").parent("ghost")),
            Err(ClassError::UnknownParent("ghost".to_string()))
        );
        assert_eq!(
            reg.define(ClassBuilder::new("  ")),
            Err(ClassError::BadName(String::new()))
        );
    }
}
