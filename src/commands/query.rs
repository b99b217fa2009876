use anyhow::Result;
use saltkit::{Client, ResourcePayload};

use super::{connect, target};
use crate::Context;
use crate::ui;

pub fn minions(ctx: &Context, expression: &str) -> Result<()> {
    let client = connect(ctx)?;
    let minions = client.active_minions(&target(ctx, expression))?;

    if minions.is_empty() {
        ui::warn(&format!("No minion answered on {expression}"));
        return Ok(());
    }

    for minion in &minions {
        println!("{minion}");
    }
    if !ctx.quiet {
        ui::info(&format!("{} minion(s) answered", minions.len()));
    }
    Ok(())
}

pub fn pillar(ctx: &Context, expression: &str, key: &str) -> Result<()> {
    let client = connect(ctx)?;
    show(ctx, &client, expression, key, Client::pillar)
}

pub fn grain(ctx: &Context, expression: &str, key: &str) -> Result<()> {
    let client = connect(ctx)?;
    show(ctx, &client, expression, key, Client::grain)
}

type Query = fn(&Client, &saltkit::Target, &str) -> saltkit::Result<Vec<(String, ResourcePayload)>>;

fn show(ctx: &Context, client: &Client, expression: &str, key: &str, query: Query) -> Result<()> {
    let values = query(client, &target(ctx, expression), key)?;

    if !ctx.quiet {
        ui::header(key);
    }
    for (node, value) in &values {
        ui::kv(node, &value.render());
    }
    Ok(())
}
