//! `reef delete` - tear down an environment.
//!
//! Stored secrets outlive the stack, so they are removed once the stack
//! is confirmed gone.

use super::CommandContext;
use reef_runtime::provider::SecretStore;
use reef_runtime::stack;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    ctx.stack.delete().await?;
    println!("stack '{}' deletion started", ctx.stack.name());

    ctx.stack
        .wait_for(stack::DELETED)
        .await?
        .expect_success(stack::DELETED)?;

    let names = ctx.providers.secrets.list_parameters().await?;
    for name in &names {
        ctx.providers.secrets.delete_parameter(name).await?;
    }
    println!("stack and {} secrets deleted", names.len());
    Ok(())
}
