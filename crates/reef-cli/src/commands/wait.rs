//! `reef wait` - block until the environment's operation settles.

use super::CommandContext;
use anyhow::bail;

pub async fn run(ctx: &CommandContext, expect: Option<&str>) -> anyhow::Result<()> {
    if ctx.stack.status().await.is_none() {
        bail!("no stack exists for the '{}' environment", ctx.environment);
    }

    // Without --expect, any terminal status ends the wait.
    let outcome = ctx.stack.wait_for(expect.unwrap_or_default()).await?;
    let outcome = match expect {
        Some(expected) => outcome.expect_success(expected)?,
        None => outcome,
    };
    println!("{}", outcome.status);
    Ok(())
}
