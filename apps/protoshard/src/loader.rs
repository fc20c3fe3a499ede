//! Engine-facing world files: a YAML zone of rooms plus their starting
//! entity and item populations. The loader builds rooms first, then drives
//! the same spawn/place entry points the runtime uses, so a loaded world
//! and a played one are indistinguishable to the core.

use std::collections::HashSet;

use anyhow::Context;

use mudcore::{Item, ItemData, Room, World};

#[derive(Debug, serde::Deserialize)]
pub struct WorldFile {
    #[allow(dead_code)]
    version: u32,
    zone_id: String,
    zone_name: Option<String>,
    start_room: Option<String>,
    rooms: Vec<RoomFile>,
}

#[derive(Debug, serde::Deserialize)]
struct RoomFile {
    id: String,
    name: String,
    desc: Option<String>,
    exits: Option<Vec<ExitFile>>,
    entities: Option<Vec<EntityFile>>,
    items: Option<Vec<ItemFile>>,
}

#[derive(Debug, serde::Deserialize)]
struct ExitFile {
    dir: String,
    to: String,
}

#[derive(Debug, serde::Deserialize)]
struct EntityFile {
    name: String,
    class: String,
}

#[derive(Debug, serde::Deserialize)]
struct ItemFile {
    class: String,
    amount: Option<u32>,
    data: Option<ItemData>,
}

pub struct LoadedZone {
    pub zone_id: String,
    pub zone_name: String,
    pub start_room: String,
    pub room_count: usize,
}

pub fn load_world(world: &mut World, yaml: &str) -> anyhow::Result<LoadedZone> {
    let wf: WorldFile = serde_yaml::from_str(yaml).context("parse world yaml")?;
    if wf.rooms.is_empty() {
        anyhow::bail!("world file has no rooms");
    }

    let known: HashSet<&str> = wf.rooms.iter().map(|r| r.id.as_str()).collect();

    for r in &wf.rooms {
        let mut room = Room::new(&r.name, r.desc.as_deref().unwrap_or("").trim());
        if let Some(exits) = &r.exits {
            for e in exits {
                let dir = e.dir.trim();
                let to = e.to.trim();
                // Only keep exits that point at rooms in this file.
                if !dir.is_empty() && known.contains(to) {
                    room = room.exit(dir, to);
                }
            }
        }
        world.insert_room(&r.id, room);
    }

    for r in &wf.rooms {
        if let Some(entities) = &r.entities {
            for e in entities {
                let class = world
                    .classes
                    .by_name(&e.class)
                    .with_context(|| format!("room {}: unknown entity class {}", r.id, e.class))?;
                world
                    .spawn_entity(&e.name, class, &r.id)
                    .with_context(|| format!("spawn {} in {}", e.name, r.id))?;
            }
        }
        if let Some(items) = &r.items {
            for it in items {
                let class = world
                    .classes
                    .by_name(&it.class)
                    .with_context(|| format!("room {}: unknown item class {}", r.id, it.class))?;
                let item = match &it.data {
                    Some(d) => Item::with_data(class, d.clone()),
                    None => Item::new(class),
                };
                world
                    .place_item(&r.id, &item, it.amount.unwrap_or(1))
                    .with_context(|| format!("place {} in {}", it.class, r.id))?;
            }
        }
    }

    let start_room = wf
        .start_room
        .filter(|s| known.contains(s.as_str()))
        .unwrap_or_else(|| wf.rooms[0].id.clone());

    Ok(LoadedZone {
        zone_name: wf.zone_name.unwrap_or_else(|| wf.zone_id.clone()),
        zone_id: wf.zone_id,
        start_room,
        room_count: wf.rooms.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::define_classes;
    use mudcore::ItemQuery;

    const WORLD: &str = include_str!("../world/keep.yaml");

    #[test]
    fn embedded_world_loads_and_populates() {
        let mut world = World::new(define_classes().unwrap());
        let zone = load_world(&mut world, WORLD).unwrap();

        assert_eq!(zone.zone_id, "proto_keep");
        assert_eq!(zone.start_room, "keep.gate");
        assert_eq!(zone.room_count, 3);
        assert!(world.room("keep.yard").is_some());

        // The yard holds the two colliding pull-sources.
        assert_eq!(world.entities_in("keep.yard").len(), 2);

        // Strong potions at the shrine, the weak one at the gate.
        let shrine = world.room("keep.shrine").unwrap();
        assert_eq!(shrine.items().len(), 1);
        assert_eq!(shrine.items()[0].1, 2);
        assert_eq!(world.room("keep.gate").unwrap().items().len(), 1);
    }

    #[test]
    fn exits_to_unknown_rooms_are_dropped() {
        let mut world = World::new(define_classes().unwrap());
        let yaml = r#"
version: 1
zone_id: z
rooms:
  - id: a
    name: A
    exits:
      - dir: north
        to: b
      - dir: east
        to: nowhere
  - id: b
    name: B
"#;
        let zone = load_world(&mut world, yaml).unwrap();
        assert_eq!(zone.start_room, "a");
        assert_eq!(world.room("a").unwrap().exits.len(), 1);
    }

    #[test]
    fn a_player_can_walk_the_keep_and_fight_the_ambiguity() {
        let mut world = World::new(define_classes().unwrap());
        let zone = load_world(&mut world, WORLD).unwrap();
        let hero = world.classes.by_name("hero").unwrap();
        let a = world.spawn_actor("tess", hero, &zone.start_room).unwrap();

        let toks = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        // Gate: the postern door grants open; the weak potion is here.
        assert!(world.actor(a).unwrap().live().contains("open"));
        world.dispatch(a, "get", &toks(&["potion"])).unwrap();

        // Yard: bell and winch both grant pull, so both are suffixed.
        world.dispatch(a, "go", &toks(&["north"])).unwrap();
        {
            let live = world.actor(a).unwrap().live();
            assert!(live.contains("pull-bell"));
            assert!(live.contains("pull-winch"));
            assert!(!live.contains("pull"));
        }

        // Pick up the sword and arm up.
        world.dispatch(a, "get", &toks(&["sword"])).unwrap();
        world.dispatch(a, "equip", &toks(&["sword"])).unwrap();
        assert!(world.actor(a).unwrap().live().contains("swing"));

        // Shrine: blessing is whitelisted to heroes; the strong potion
        // joins the weak one as a second stack in the same bucket.
        world.dispatch(a, "go", &toks(&["east"])).unwrap();
        assert!(world.actor(a).unwrap().live().contains("bless"));
        world.dispatch(a, "get", &toks(&["potion"])).unwrap();
        let carried = world
            .actor(a)
            .unwrap()
            .inventory
            .find(&world.classes, Some("Health Potion"), &ItemQuery::any());
        assert_eq!(carried.len(), 2);

        // With both strengths carried, the bare name no longer resolves.
        match world.dispatch(a, "drink", &toks(&["potion"])) {
            Err(mudcore::ActionError::Reply(m)) => assert!(m.starts_with("which")),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        let out = world.dispatch(a, "drink", &toks(&["potion", "10"])).unwrap();
        assert!(out.contains("+10 hp"));
    }
}
