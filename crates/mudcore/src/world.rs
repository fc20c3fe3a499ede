//! The world: rooms, characters, entities, and the registration protocol
//! that keeps every character's live verb table current.
//!
//! Sources (entities in a character's room, items on its body) contribute
//! their class's action tables into the character's live table when they
//! become active and withdraw exactly what they contributed when they stop.
//! When two co-located sources would offer the same verb, each registers
//! under `"{verb}-{label}"` instead so neither silently wins. Collision
//! membership is computed from world structure alone (room population plus
//! equipment), never from the table contents, so removal can re-derive the
//! keys and descriptors it must withdraw.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::classes::ClassRegistry;
use crate::command::{Action, ActionError, BoundValue, SourceRef};
use crate::inventory::{Inventory, TokenMatch};
use crate::items::{data_eq, EquipSlot, Item};
use crate::shadow::{ShadowError, ShadowTable};
use crate::{ActorId, ClassId, EntityId};

#[derive(Debug, Clone, PartialEq)]
pub enum WorldError {
    NoSuchRoom(String),
    NoSuchActor(ActorId),
    NoSuchEntity(EntityId),
    /// A source reference that no longer resolves (entity gone, slot bare).
    StaleSource,
    UnknownVerb(String),
    NoSuchItem(String),
    NothingHere(String),
    AmbiguousItem(String),
    CannotEquip(String),
    BadSlot(String),
    SlotEmpty(EquipSlot),
    NoExit(String),
    Nowhere,
    Shadow(ShadowError),
    Inventory(crate::inventory::InventoryError),
}

impl WorldError {
    /// Recoverable player mistakes, as opposed to bookkeeping gone wrong.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            WorldError::UnknownVerb(_)
                | WorldError::NoSuchItem(_)
                | WorldError::NothingHere(_)
                | WorldError::AmbiguousItem(_)
                | WorldError::CannotEquip(_)
                | WorldError::BadSlot(_)
                | WorldError::SlotEmpty(_)
                | WorldError::NoExit(_)
        )
    }
}

impl std::fmt::Display for WorldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::NoSuchRoom(r) => write!(f, "no such room: {r}"),
            WorldError::NoSuchActor(a) => write!(f, "no such character: {a}"),
            WorldError::NoSuchEntity(e) => write!(f, "no such entity: {e}"),
            WorldError::StaleSource => write!(f, "source no longer resolves"),
            WorldError::UnknownVerb(v) => write!(f, "huh? (no such command: {v})"),
            WorldError::NoSuchItem(t) => write!(f, "you have no '{t}'"),
            WorldError::NothingHere(t) => write!(f, "you see no '{t}' here"),
            WorldError::AmbiguousItem(t) => write!(f, "which '{t}'? be more specific"),
            WorldError::CannotEquip(l) => write!(f, "the {l} cannot be equipped"),
            WorldError::BadSlot(t) => write!(f, "no such slot: {t}"),
            WorldError::SlotEmpty(s) => write!(f, "nothing is equipped on your {}", s.as_str()),
            WorldError::NoExit(t) => write!(f, "huh? (no such exit: {t})"),
            WorldError::Nowhere => write!(f, "you are nowhere"),
            WorldError::Shadow(e) => write!(f, "live action table out of sync: {e}"),
            WorldError::Inventory(e) => write!(f, "inventory out of sync: {e}"),
        }
    }
}

impl std::error::Error for WorldError {}

impl From<ShadowError> for WorldError {
    fn from(e: ShadowError) -> Self {
        WorldError::Shadow(e)
    }
}

impl From<crate::inventory::InventoryError> for WorldError {
    fn from(e: crate::inventory::InventoryError) -> Self {
        WorldError::Inventory(e)
    }
}

impl From<WorldError> for ActionError {
    fn from(e: WorldError) -> Self {
        if e.is_user_facing() {
            ActionError::Reply(e.to_string())
        } else {
            ActionError::Logic(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExitDef {
    pub dir: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct Room {
    pub name: String,
    pub description: String,
    pub exits: Vec<ExitDef>,
    items: Vec<(Item, u32)>,
}

impl Room {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            exits: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn exit(mut self, dir: &str, to: &str) -> Self {
        self.exits.push(ExitDef {
            dir: dir.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn items(&self) -> &[(Item, u32)] {
        &self.items
    }

    fn add_item(&mut self, item: &Item, amount: u32) {
        for (have, n) in self.items.iter_mut() {
            if have.class == item.class && data_eq(&have.data, &item.data) {
                *n += amount;
                return;
            }
        }
        self.items.push((item.clone(), amount));
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub class: ClassId,
    pub room: String,
}

#[derive(Debug, Clone)]
pub struct Equipped {
    pub item: Item,
    pub return_on_unequip: bool,
}

#[derive(Debug)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub class: ClassId,
    pub inventory: Inventory,
    room: Option<String>,
    equipment: HashMap<EquipSlot, Equipped>,
    live: ShadowTable<String, Action>,
}

impl Actor {
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn equipped(&self, slot: EquipSlot) -> Option<&Equipped> {
        self.equipment.get(&slot)
    }

    pub fn equipment(&self) -> impl Iterator<Item = (EquipSlot, &Equipped)> {
        let mut slots: Vec<EquipSlot> = self.equipment.keys().copied().collect();
        slots.sort_unstable();
        slots.into_iter().map(|s| (s, &self.equipment[&s]))
    }

    pub fn live(&self) -> &ShadowTable<String, Action> {
        &self.live
    }

    /// Currently dispatchable verbs, sorted.
    pub fn verbs(&self) -> Vec<&str> {
        let mut vs: Vec<&str> = self.live.keys().map(|k| k.as_str()).collect();
        vs.sort_unstable();
        vs
    }
}

pub struct World {
    pub classes: ClassRegistry,
    rooms: HashMap<String, Room>,
    actors: HashMap<ActorId, Actor>,
    entities: HashMap<EntityId, Entity>,
    next_actor: ActorId,
    next_entity: EntityId,
}

impl World {
    pub fn new(classes: ClassRegistry) -> Self {
        Self {
            classes,
            rooms: HashMap::new(),
            actors: HashMap::new(),
            entities: HashMap::new(),
            next_actor: 1,
            next_entity: 1,
        }
    }

    pub fn insert_room(&mut self, id: &str, room: Room) {
        self.rooms.insert(id.to_string(), room);
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Entities in a room, in spawn order.
    pub fn entities_in(&self, room: &str) -> Vec<EntityId> {
        let mut es: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.room == room)
            .map(|e| e.id)
            .collect();
        es.sort_unstable();
        es
    }

    fn actors_in(&self, room: &str) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| a.room.as_deref() == Some(room))
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Place a new character. Its live table is seeded from its class's
    /// merged action table, gated by each action's filter, and then every
    /// entity already in the room registers against it.
    pub fn spawn_actor(
        &mut self,
        name: &str,
        class: ClassId,
        room: &str,
    ) -> Result<ActorId, WorldError> {
        if !self.rooms.contains_key(room) {
            return Err(WorldError::NoSuchRoom(room.to_string()));
        }
        let id = self.next_actor;
        self.next_actor += 1;

        let mut live = ShadowTable::new();
        for (verb, act) in self.classes.get(class).all_actions() {
            if act.filter().permits_actor(&self.classes, id, class) {
                live.set(verb.clone(), act.clone());
            }
        }
        self.actors.insert(
            id,
            Actor {
                id,
                name: name.to_string(),
                class,
                inventory: Inventory::new(),
                room: Some(room.to_string()),
                equipment: HashMap::new(),
                live,
            },
        );
        for e in self.entities_in(room) {
            self.register_source(SourceRef::Entity(e), id)?;
        }
        info!(actor = id, name = %name, room = %room, "character spawned");
        Ok(id)
    }

    /// Destroy a character: its live table goes with it, and every filter
    /// that pinned it in or out forgets it.
    pub fn despawn_actor(&mut self, id: ActorId) -> Result<(), WorldError> {
        let mut actor = self
            .actors
            .remove(&id)
            .ok_or(WorldError::NoSuchActor(id))?;
        actor.live.clear();
        let touched = self.classes.invalidate_actor(id);
        info!(actor = id, name = %actor.name, filters = touched, "character despawned");
        Ok(())
    }

    pub fn spawn_entity(
        &mut self,
        name: &str,
        class: ClassId,
        room: &str,
    ) -> Result<EntityId, WorldError> {
        if !self.rooms.contains_key(room) {
            return Err(WorldError::NoSuchRoom(room.to_string()));
        }
        let id = self.next_entity;
        self.next_entity += 1;
        self.entities.insert(
            id,
            Entity {
                id,
                name: name.to_string(),
                class,
                room: room.to_string(),
            },
        );
        for a in self.actors_in(room) {
            self.register_source(SourceRef::Entity(id), a)?;
        }
        debug!(entity = id, name = %name, room = %room, "entity spawned");
        Ok(id)
    }

    pub fn despawn_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        let room = self
            .entities
            .get(&id)
            .ok_or(WorldError::NoSuchEntity(id))?
            .room
            .clone();
        for a in self.actors_in(&room) {
            self.unregister_source(SourceRef::Entity(id), a)?;
        }
        self.entities.remove(&id);
        debug!(entity = id, room = %room, "entity despawned");
        Ok(())
    }

    /// Move a character: withdraw every grant from the old room's entities,
    /// then collect grants from the new room's. Only the mover's table
    /// changes.
    pub fn set_location(&mut self, actor: ActorId, to: &str) -> Result<(), WorldError> {
        if !self.rooms.contains_key(to) {
            return Err(WorldError::NoSuchRoom(to.to_string()));
        }
        let from = self
            .actors
            .get(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?
            .room
            .clone();
        if let Some(from) = &from {
            for e in self.entities_in(from) {
                self.unregister_source(SourceRef::Entity(e), actor)?;
            }
        }
        if let Some(a) = self.actors.get_mut(&actor) {
            a.room = Some(to.to_string());
        }
        for e in self.entities_in(to) {
            self.register_source(SourceRef::Entity(e), actor)?;
        }
        debug!(actor, from = %from.as_deref().unwrap_or("-"), to = %to, "moved");
        Ok(())
    }

    fn source_class(&self, s: SourceRef) -> Option<ClassId> {
        match s {
            SourceRef::Entity(e) => self.entities.get(&e).map(|e| e.class),
            SourceRef::Equipped(a, slot) => self
                .actors
                .get(&a)?
                .equipment
                .get(&slot)
                .map(|eq| eq.item.class),
        }
    }

    /// Label used for collision suffixes: the entity's name, or the item
    /// class's display label, case-folded.
    fn source_label(&self, s: SourceRef) -> Option<String> {
        let label = match s {
            SourceRef::Entity(e) => self.entities.get(&e)?.name.clone(),
            SourceRef::Equipped(a, slot) => {
                let eq = self.actors.get(&a)?.equipment.get(&slot)?;
                self.classes.get(eq.item.class).label.clone()
            }
        };
        Some(label.to_lowercase())
    }

    /// Verb names `s` would offer `actor` after permission filtering.
    fn permitted_names(&self, s: SourceRef, actor: ActorId, actor_class: ClassId) -> BTreeSet<String> {
        let Some(class) = self.source_class(s) else {
            return BTreeSet::new();
        };
        self.classes
            .get(class)
            .all_actions()
            .iter()
            .filter(|(_, a)| a.filter().permits_actor(&self.classes, actor, actor_class))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Every source currently contributing to `actor`: entities sharing its
    /// room, then its equipped items, in deterministic order.
    fn active_sources(&self, actor: &Actor) -> Vec<SourceRef> {
        let mut out = Vec::new();
        if let Some(room) = &actor.room {
            out.extend(self.entities_in(room).into_iter().map(SourceRef::Entity));
        }
        let mut slots: Vec<EquipSlot> = actor.equipment.keys().copied().collect();
        slots.sort_unstable();
        out.extend(slots.into_iter().map(|s| SourceRef::Equipped(actor.id, s)));
        out
    }

    /// Verb names `source` shares with at least one other co-located source
    /// for this actor. A pure function of current world structure, so add
    /// and remove compute the same set as long as the structure has not
    /// changed in between.
    fn collision_names(
        &self,
        source: SourceRef,
        actor: ActorId,
        actor_class: ClassId,
    ) -> BTreeSet<String> {
        let Some(a) = self.actors.get(&actor) else {
            return BTreeSet::new();
        };
        let mine = self.permitted_names(source, actor, actor_class);
        let mut out = BTreeSet::new();
        for other in self.active_sources(a) {
            if other == source {
                continue;
            }
            let theirs = self.permitted_names(other, actor, actor_class);
            out.extend(mine.intersection(&theirs).cloned());
        }
        out
    }

    /// The key/descriptor pairs `source` contributes to `actor` right now.
    fn contributions(
        &self,
        source: SourceRef,
        actor: ActorId,
    ) -> Result<Vec<(String, Action)>, WorldError> {
        let actor_class = self
            .actors
            .get(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?
            .class;
        let src_class = self.source_class(source).ok_or(WorldError::StaleSource)?;
        let label = self.source_label(source).ok_or(WorldError::StaleSource)?;
        let collisions = self.collision_names(source, actor, actor_class);

        let mut out = Vec::new();
        for (verb, act) in self.classes.get(src_class).all_actions() {
            if !act.filter().permits_actor(&self.classes, actor, actor_class) {
                continue;
            }
            let key = if collisions.contains(verb) {
                format!("{verb}-{label}")
            } else {
                verb.clone()
            };
            let bound =
                act.specify_args([BoundValue::Source(source), BoundValue::Actor(actor)]);
            out.push((key, bound));
        }
        Ok(out)
    }

    fn register_source(&mut self, source: SourceRef, actor: ActorId) -> Result<(), WorldError> {
        let adds = self.contributions(source, actor)?;
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        for (key, act) in adds {
            debug!(actor, verb = %key, source = ?source, "register");
            a.live.set(key, act);
        }
        Ok(())
    }

    /// Withdraw exactly what [`World::register_source`] contributed, by
    /// re-deriving the same keys and descriptors. Errors here mean the
    /// protocol's view of the world went out of sync with the table and
    /// are surfaced, never absorbed.
    fn unregister_source(&mut self, source: SourceRef, actor: ActorId) -> Result<(), WorldError> {
        let removes = self.contributions(source, actor)?;
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        for (key, act) in removes {
            debug!(actor, verb = %key, source = ?source, "unregister");
            a.live.remove_value(&key, &act)?;
        }
        Ok(())
    }

    /// Equip an inventory item by player token. Whatever already occupies
    /// the slot is withdrawn and unequipped first (returning to the
    /// inventory if it was equipped with `return_on_unequip`), then the new
    /// item registers its grants.
    pub fn equip(
        &mut self,
        actor: ActorId,
        token: &str,
        return_on_unequip: bool,
    ) -> Result<String, WorldError> {
        let a = self.actors.get(&actor).ok_or(WorldError::NoSuchActor(actor))?;
        let item = match a.inventory.find_by_token(&self.classes, token) {
            TokenMatch::None => return Err(WorldError::NoSuchItem(token.to_string())),
            TokenMatch::Many => return Err(WorldError::AmbiguousItem(token.to_string())),
            TokenMatch::One(item) => item,
        };
        let def = self.classes.get(item.class);
        let label = def.label.to_lowercase();
        let slot = def
            .item
            .as_ref()
            .and_then(|s| s.slot)
            .ok_or_else(|| WorldError::CannotEquip(label.clone()))?;

        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.inventory.remove(&self.classes, &item, 1)?;

        if self
            .actors
            .get(&actor)
            .is_some_and(|a| a.equipment.contains_key(&slot))
        {
            self.unregister_source(SourceRef::Equipped(actor, slot), actor)?;
            let a = self
                .actors
                .get_mut(&actor)
                .ok_or(WorldError::NoSuchActor(actor))?;
            if let Some(old) = a.equipment.remove(&slot) {
                if old.return_on_unequip {
                    a.inventory.add(&self.classes, &old.item, 1);
                }
            }
        }

        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.equipment.insert(
            slot,
            Equipped {
                item,
                return_on_unequip,
            },
        );
        self.register_source(SourceRef::Equipped(actor, slot), actor)?;
        info!(actor, item = %label, slot = %slot.as_str(), "equipped");
        Ok(format!("you equip the {label} ({}).", slot.as_str()))
    }

    /// Unequip by slot token. The item's grants are withdrawn before the
    /// slot empties so the withdrawal sees the same world it was added in.
    pub fn unequip(&mut self, actor: ActorId, slot_token: &str) -> Result<String, WorldError> {
        let slot =
            EquipSlot::parse(slot_token).ok_or_else(|| WorldError::BadSlot(slot_token.to_string()))?;
        let occupied = self
            .actors
            .get(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?
            .equipment
            .contains_key(&slot);
        if !occupied {
            return Err(WorldError::SlotEmpty(slot));
        }
        self.unregister_source(SourceRef::Equipped(actor, slot), actor)?;
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        let Some(old) = a.equipment.remove(&slot) else {
            return Err(WorldError::SlotEmpty(slot));
        };
        let label = self.classes.get(old.item.class).label.to_lowercase();
        if old.return_on_unequip {
            a.inventory.add(&self.classes, &old.item, 1);
        }
        info!(actor, item = %label, slot = %slot.as_str(), "unequipped");
        Ok(format!("you unequip the {label}."))
    }

    /// Drop one of an inventory item onto the floor of the current room.
    pub fn drop_item(&mut self, actor: ActorId, token: &str) -> Result<String, WorldError> {
        let a = self.actors.get(&actor).ok_or(WorldError::NoSuchActor(actor))?;
        let room = a.room.clone().ok_or(WorldError::Nowhere)?;
        let item = match a.inventory.find_by_token(&self.classes, token) {
            TokenMatch::None => return Err(WorldError::NoSuchItem(token.to_string())),
            TokenMatch::Many => return Err(WorldError::AmbiguousItem(token.to_string())),
            TokenMatch::One(item) => item,
        };
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.inventory.remove(&self.classes, &item, 1)?;
        let label = self.classes.get(item.class).label.to_lowercase();
        if let Some(r) = self.rooms.get_mut(&room) {
            r.add_item(&item, 1);
        }
        Ok(format!("you drop the {label}."))
    }

    /// Pick one matching item up off the floor.
    pub fn take_item(&mut self, actor: ActorId, token: &str) -> Result<String, WorldError> {
        let a = self.actors.get(&actor).ok_or(WorldError::NoSuchActor(actor))?;
        let room_id = a.room.clone().ok_or(WorldError::Nowhere)?;
        let t = token.trim().to_lowercase();
        let room = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| WorldError::NoSuchRoom(room_id.clone()))?;

        let mut hits: Vec<usize> = Vec::new();
        for (i, (item, _)) in room.items.iter().enumerate() {
            let def = self.classes.get(item.class);
            let label = def.label.to_lowercase();
            let by_name = label == t || label.starts_with(&t);
            let by_alias = def
                .item
                .as_ref()
                .is_some_and(|spec| spec.matches_token(&t));
            if by_name || by_alias {
                hits.push(i);
            }
        }
        let i = match hits.len() {
            0 => return Err(WorldError::NothingHere(token.to_string())),
            1 => hits[0],
            _ => return Err(WorldError::AmbiguousItem(token.to_string())),
        };

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| WorldError::NoSuchRoom(room_id.clone()))?;
        let taken = room.items[i].0.clone();
        room.items[i].1 -= 1;
        if room.items[i].1 == 0 {
            room.items.remove(i);
        }
        let label = self.classes.get(taken.class).label.to_lowercase();
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.inventory.add(&self.classes, &taken, 1);
        Ok(format!("you pick up the {label}."))
    }

    /// Hand an item straight to a character, bypassing the floor. Used by
    /// the loader and by scripted rewards.
    pub fn give_item(&mut self, actor: ActorId, item: &Item, amount: u32) -> Result<(), WorldError> {
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.inventory.add(&self.classes, item, amount);
        Ok(())
    }

    /// Use up carried items (a potion drunk, a bandage spent). The exact
    /// stack must exist with at least `amount` in it.
    pub fn consume_item(
        &mut self,
        actor: ActorId,
        item: &Item,
        amount: u32,
    ) -> Result<(), WorldError> {
        let a = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::NoSuchActor(actor))?;
        a.inventory.remove(&self.classes, item, amount)?;
        Ok(())
    }

    /// Put an item on a room's floor. Loader entry point.
    pub fn place_item(&mut self, room: &str, item: &Item, amount: u32) -> Result<(), WorldError> {
        let r = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| WorldError::NoSuchRoom(room.to_string()))?;
        r.add_item(item, amount);
        Ok(())
    }

    pub fn find_exit(&self, room_id: &str, token: &str) -> Option<&ExitDef> {
        let room = self.rooms.get(room_id)?;
        let t = token.trim();
        if t.is_empty() {
            return None;
        }
        if let Some(ex) = room.exits.iter().find(|e| e.dir.eq_ignore_ascii_case(t)) {
            return Some(ex);
        }
        let canon = normalize_dir_token(t)?;
        room.exits
            .iter()
            .find(|e| e.dir.eq_ignore_ascii_case(canon))
    }

    /// Move through a named exit, returning the new room's rendering.
    pub fn move_actor(&mut self, actor: ActorId, exit_token: &str) -> Result<String, WorldError> {
        let a = self.actors.get(&actor).ok_or(WorldError::NoSuchActor(actor))?;
        let room_id = a.room.clone().ok_or(WorldError::Nowhere)?;
        let to = self
            .find_exit(&room_id, exit_token)
            .map(|e| e.to.clone())
            .ok_or_else(|| WorldError::NoExit(exit_token.to_string()))?;
        self.set_location(actor, &to)?;
        Ok(self.render_room(&to))
    }

    pub fn render_exits(&self, room_id: &str) -> String {
        let Some(room) = self.rooms.get(room_id) else {
            return "exits: (room not found)\n".to_string();
        };
        if room.exits.is_empty() {
            return "exits: none\n".to_string();
        }
        let mut xs = room
            .exits
            .iter()
            .map(|e| format_exit_label(e.dir.as_str()))
            .collect::<Vec<_>>();
        xs.sort_unstable();
        format!("exits: {}\n", xs.join(", "))
    }

    pub fn render_room(&self, room_id: &str) -> String {
        let Some(room) = self.rooms.get(room_id) else {
            return "room not found\n".to_string();
        };
        let mut s = String::new();
        s.push_str(&format!("== {} [{}] ==\n", room.name, room_id));
        if !room.description.is_empty() {
            s.push_str(room.description.trim_end());
            s.push('\n');
        }
        let here = self
            .entities_in(room_id)
            .into_iter()
            .filter_map(|e| self.entities.get(&e).map(|e| e.name.clone()))
            .collect::<Vec<_>>();
        if !here.is_empty() {
            s.push_str(&format!("here: {}\n", here.join(", ")));
        }
        if !room.items.is_empty() {
            let xs = room
                .items
                .iter()
                .map(|(item, n)| {
                    let label = self.classes.get(item.class).label.to_lowercase();
                    if *n > 1 {
                        format!("{label} x{n}")
                    } else {
                        label
                    }
                })
                .collect::<Vec<_>>();
            s.push_str(&format!("on the ground: {}\n", xs.join(", ")));
        }
        s.push_str(&self.render_exits(room_id));
        s
    }

    /// Look a verb up in the character's live table and fire it.
    pub fn dispatch(
        &mut self,
        actor: ActorId,
        verb: &str,
        tokens: &[String],
    ) -> Result<String, ActionError> {
        let act = {
            let a = self
                .actors
                .get(&actor)
                .ok_or(WorldError::NoSuchActor(actor))?;
            a.live
                .get(verb)
                .cloned()
                .ok_or_else(|| WorldError::UnknownVerb(verb.to_string()))?
        };
        act.invoke(self, actor, verb, tokens)
    }
}

fn normalize_dir_token(line: &str) -> Option<&'static str> {
    match line.to_ascii_lowercase().as_str() {
        "north" | "n" => Some("north"),
        "south" | "s" => Some("south"),
        "east" | "e" => Some("east"),
        "west" | "w" => Some("west"),
        "up" | "u" => Some("up"),
        "down" | "d" => Some("down"),
        _ => None,
    }
}

fn format_exit_label(dir: &str) -> String {
    match dir.to_ascii_lowercase().as_str() {
        "north" => "north (n)".to_string(),
        "south" => "south (s)".to_string(),
        "east" => "east (e)".to_string(),
        "west" => "west (w)".to_string(),
        "up" => "up (u)".to_string(),
        "down" => "down (d)".to_string(),
        _ => dir.to_string(),
    }
}
