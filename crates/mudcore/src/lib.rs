//! `mudcore`: the runtime command registry and inventory engine of a shard.
//!
//! Every character carries a live verb table that is, at every instant, the
//! union of what its class grants, what its equipped items grant, and what
//! the entities sharing its room grant — each grant gated by a permission
//! filter, newer grants shadowing older ones, and same-named grants from
//! different co-located sources disambiguated by suffixing the source label.
//! World mutations (movement, equip/unequip, spawn/despawn) keep the table
//! current incrementally; nothing ever re-scans the whole world.
//!
//! The crate is single-threaded and synchronous: one world event runs to
//! completion before the next is considered. Class action tables are built
//! once at class definition time and are immutable afterwards.

pub mod classes;
pub mod command;
pub mod filter;
pub mod inventory;
pub mod items;
pub mod shadow;
pub mod world;

pub type ActorId = u64;
pub type EntityId = u64;
pub type ClassId = u32;

pub use classes::{ClassBuilder, ClassDef, ClassError, ClassRegistry};
pub use command::{Action, ActionError, ActionFn, BoundValue, Invocation, SourceRef};
pub use filter::{Filter, FilterBook, FilterError, FilterHandle, FilterMode, FilterSpec};
pub use inventory::{Inventory, InventoryError, ItemQuery, ItemStack, StackSave, TokenMatch};
pub use items::{EquipSlot, Item, ItemData, ItemSpec};
pub use shadow::{ShadowError, ShadowTable};
pub use world::{Actor, Entity, Equipped, ExitDef, Room, World, WorldError};
