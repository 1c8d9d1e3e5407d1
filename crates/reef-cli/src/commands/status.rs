//! `reef status` - show the stack status for one environment.

use super::CommandContext;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    match ctx.stack.status().await {
        Some(status) => println!("{}: {status}", ctx.environment),
        None => println!("{}: no stack", ctx.environment),
    }
    Ok(())
}
