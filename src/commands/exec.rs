use anyhow::Result;

use super::state::finish;
use super::{connect, parse_value, run_options, target};
use crate::Context;

pub fn cmd(ctx: &Context, expression: &str, command: &str, check: bool) -> Result<()> {
    let client = connect(ctx)?;
    let (response, summary) = client.run_command(
        &target(ctx, expression),
        command,
        check,
        &run_options(ctx, true),
    )?;

    log::info!(
        "`{command}` finished on {} node(s)",
        response.first_round().len()
    );
    finish(ctx, &format!("`{command}`"), &summary)
}

pub fn function(
    ctx: &Context,
    expression: &str,
    function: &str,
    args: &[String],
    print: bool,
) -> Result<()> {
    let client = connect(ctx)?;
    let args = args.iter().map(|arg| parse_value(arg)).collect();
    let summary = client.run_function(
        &target(ctx, expression),
        function,
        args,
        &run_options(ctx, print),
    )?;
    finish(ctx, function, &summary)
}
