//! Demo world classes and their verb handlers.
//!
//! Everything a player can type is a registered action on some class: the
//! hero's own class grants the basic verbs, entities grant theirs while the
//! hero shares their room, items grant theirs while equipped. The shard
//! never matches on verb strings itself.

use anyhow::Context;
use serde_json::json;

use mudcore::{
    ActionError, ClassBuilder, ClassRegistry, EquipSlot, Filter, FilterMode, Invocation, ItemQuery,
    ItemSpec, SourceRef, TokenMatch, World, WorldError,
};

pub fn define_classes() -> anyhow::Result<ClassRegistry> {
    let mut reg = ClassRegistry::new();

    reg.define(
        ClassBuilder::new("adventurer")
            .action("look", act_look)
            .action("go", act_go)
            .action("inventory", act_inventory)
            .action("equipment", act_equipment)
            .action("equip", act_equip)
            .action("unequip", act_unequip)
            .action("get", act_get)
            .action("drop", act_drop)
            .action("drink", act_drink)
            .action("help", act_help)
            .action("wave", act_wave),
    )
    .context("define adventurer")?;
    reg.define(ClassBuilder::new("hero").parent("adventurer"))
        .context("define hero")?;
    // Grant target that never spawns; its verbs stay invisible to players.
    reg.define(ClassBuilder::new("ghoul"))
        .context("define ghoul")?;
    let hero = reg.by_name("hero").context("hero class missing")?;
    let ghoul = reg.by_name("ghoul").context("ghoul class missing")?;

    reg.define(
        ClassBuilder::new("door")
            .label("Door")
            .action("open", act_open)
            .action("close", act_close),
    )
    .context("define door")?;
    reg.define(
        ClassBuilder::new("lever")
            .label("Lever")
            .action("pull", act_pull),
    )
    .context("define lever")?;
    reg.define(
        ClassBuilder::new("gong")
            .label("Gong")
            .action("pull", act_pull)
            .action("ring", act_ring),
    )
    .context("define gong")?;
    reg.define(
        ClassBuilder::new("shrine")
            .label("Shrine")
            .action_filtered(
                "bless",
                act_bless,
                Filter::new(FilterMode::Whitelist).with_class(hero),
            )
            .action_filtered(
                "desecrate",
                act_desecrate,
                Filter::new(FilterMode::Whitelist).with_class(ghoul),
            ),
    )
    .context("define shrine")?;

    reg.define(
        ClassBuilder::new("sword")
            .label("Sword")
            .item(
                ItemSpec::new()
                    .slot(EquipSlot::RightHand)
                    .alias("blade")
                    .description("a plain arming sword, point slightly shy of true."),
            )
            .action("swing", act_swing),
    )
    .context("define sword")?;
    reg.define(
        ClassBuilder::new("buckler")
            .label("Buckler")
            .item(
                ItemSpec::new()
                    .slot(EquipSlot::LeftHand)
                    .alias("shield")
                    .description("a light wooden buckler, rim chewed by old blows."),
            )
            .action("raise", act_raise),
    )
    .context("define buckler")?;
    reg.define(
        ClassBuilder::new("health_potion")
            .label("Health Potion")
            .item(
                ItemSpec::new()
                    .alias("potion")
                    .alias("hp")
                    .description("a stoppered phial of red liquid."),
            ),
    )
    .context("define health_potion")?;

    Ok(reg)
}

fn actor_room(world: &World, inv: &Invocation) -> Result<String, ActionError> {
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;
    Ok(a.room().ok_or(WorldError::Nowhere)?.to_string())
}

fn source_entity_name(world: &World, inv: &Invocation) -> String {
    inv.source()
        .and_then(|s| match s {
            SourceRef::Entity(e) => world.entity(e).map(|e| e.name.clone()),
            SourceRef::Equipped(..) => None,
        })
        .unwrap_or_else(|| "something".to_string())
}

fn act_look(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let room = actor_room(world, inv)?;
    Ok(world.render_room(&room))
}

fn act_go(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(dir) = inv.tokens.first() else {
        return Err(ActionError::Reply("huh? (try: go <exit>)".to_string()));
    };
    Ok(world.move_actor(inv.actor, dir)?)
}

fn act_inventory(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;
    if a.inventory.is_empty() {
        return Ok("you are empty-handed.\n".to_string());
    }
    let mut s = String::from("you carry:\n");
    for (bucket, stack) in a.inventory.iter() {
        s.push_str("  ");
        s.push_str(bucket);
        if stack.amount > 1 {
            s.push_str(&format!(" x{}", stack.amount));
        }
        if let Some(d) = &stack.data {
            if !d.is_empty() {
                let fields = d
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                s.push_str(&format!(" ({fields})"));
            }
        }
        s.push('\n');
    }
    Ok(s)
}

fn act_equipment(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;
    let mut lines = Vec::new();
    for (slot, eq) in a.equipment() {
        let label = world.classes.get(eq.item.class).label.to_lowercase();
        lines.push(format!("  {}: {label}", slot.as_str()));
    }
    if lines.is_empty() {
        return Ok("you are wearing nothing of note.\n".to_string());
    }
    Ok(format!("you are wearing:\n{}\n", lines.join("\n")))
}

fn act_equip(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(tok) = inv.tokens.first() else {
        return Err(ActionError::Reply("huh? (try: equip <item>)".to_string()));
    };
    Ok(world.equip(inv.actor, tok, true)?)
}

fn act_unequip(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(tok) = inv.tokens.first() else {
        return Err(ActionError::Reply("huh? (try: unequip <slot>)".to_string()));
    };
    Ok(world.unequip(inv.actor, tok)?)
}

fn act_get(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(tok) = inv.tokens.first() else {
        return Err(ActionError::Reply("huh? (try: get <item>)".to_string()));
    };
    Ok(world.take_item(inv.actor, tok)?)
}

fn act_drop(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(tok) = inv.tokens.first() else {
        return Err(ActionError::Reply("huh? (try: drop <item>)".to_string()));
    };
    Ok(world.drop_item(inv.actor, tok)?)
}

/// `drink <item> [strength]` — with two potion stacks of different
/// strengths in the same bucket, the bare name is ambiguous and the
/// number narrows it down.
fn act_drink(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let Some(tok) = inv.tokens.first() else {
        return Err(ActionError::Reply(
            "huh? (try: drink <item> [strength])".to_string(),
        ));
    };
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;

    let item = if let Some(n) = inv.tokens.get(1).and_then(|t| t.parse::<i64>().ok()) {
        let mut hits = a
            .inventory
            .find(&world.classes, None, &ItemQuery::any().with_field("hp", json!(n)));
        match hits.len() {
            0 => return Err(WorldError::NoSuchItem(format!("{tok} {n}")).into()),
            1 => hits.remove(0).0,
            _ => return Err(WorldError::AmbiguousItem(tok.clone()).into()),
        }
    } else {
        match a.inventory.find_by_token(&world.classes, tok) {
            TokenMatch::None => return Err(WorldError::NoSuchItem(tok.clone()).into()),
            TokenMatch::Many => return Err(WorldError::AmbiguousItem(tok.clone()).into()),
            TokenMatch::One(item) => item,
        }
    };

    let Some(hp) = item.field("hp").and_then(|v| v.as_i64()) else {
        return Err(ActionError::Reply("you can't drink that.".to_string()));
    };
    world.consume_item(inv.actor, &item, 1)?;
    Ok(format!("you drink it down. warmth spreads (+{hp} hp)."))
}

fn act_help(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;
    Ok(format!("commands: {}\n", a.verbs().join(", ")))
}

fn act_wave(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    let a = world
        .actor(inv.actor)
        .ok_or(WorldError::NoSuchActor(inv.actor))?;
    Ok(format!("{} waves.", a.name))
}

fn act_open(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    Ok(format!("the {} creaks open.", source_entity_name(world, inv)))
}

fn act_close(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    Ok(format!("the {} shuts.", source_entity_name(world, inv)))
}

fn act_pull(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    Ok(format!(
        "you haul on the {}. somewhere, metal complains.",
        source_entity_name(world, inv)
    ))
}

fn act_ring(world: &mut World, inv: &Invocation) -> Result<String, ActionError> {
    Ok(format!(
        "the {} booms; the note hangs in the air a long time.",
        source_entity_name(world, inv)
    ))
}

fn act_bless(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
    Ok("a thin warmth settles on your shoulders.".to_string())
}

fn act_desecrate(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
    Ok("the wax hisses.".to_string())
}

fn act_swing(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
    Ok("you cut a whistling arc through the air.".to_string())
}

fn act_raise(_: &mut World, _: &Invocation) -> Result<String, ActionError> {
    Ok("you tuck in behind the buckler.".to_string())
}
