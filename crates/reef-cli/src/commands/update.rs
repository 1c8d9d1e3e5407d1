//! `reef update` - change the changeable settings of an environment.

use super::CommandContext;
use anyhow::anyhow;
use reef_runtime::params::UpdateParams;
use reef_runtime::provider::{DnsZones, SecretStore};
use reef_runtime::stack;

pub struct UpdateArgs {
    pub domain: Option<String>,
    pub certificate_arn: Option<String>,
    pub db_storage: Option<u32>,
    pub db_instance_class: Option<String>,
    pub cache_node_type: Option<String>,
    pub task_cpu: Option<String>,
    pub task_memory: Option<String>,
    pub disable: bool,
}

pub async fn run(ctx: &CommandContext, args: UpdateArgs) -> anyhow::Result<()> {
    let mut changes = UpdateParams {
        certificate_arn: args.certificate_arn,
        db_storage_gb: args.db_storage,
        db_instance_class: args.db_instance_class,
        cache_node_type: args.cache_node_type,
        task_cpu: args.task_cpu,
        task_memory: args.task_memory,
        ..UpdateParams::default()
    };

    if let Some(domain) = args.domain {
        let root = reef_core::root_domain(&domain);
        let zone_id = ctx
            .providers
            .dns
            .hosted_zone_id(&root)
            .await?
            .ok_or_else(|| anyhow!("no hosted zone found for '{root}'"))?;
        changes.domain = Some(domain);
        changes.root_domain = Some(root);
        changes.hosted_zone_id = Some(zone_id);
    }

    // The template is re-rendered against the currently stored secrets so
    // the update never drops existing secret references.
    let secrets = ctx.providers.secrets.list_parameter_arns().await?;
    ctx.stack
        .update(!args.disable, &secrets, &changes, &ctx.template_path)
        .await?;
    println!("stack '{}' update started", ctx.stack.name());

    let outcome = ctx
        .stack
        .wait_for(stack::UPDATE_COMPLETE)
        .await?
        .expect_success(stack::UPDATE_COMPLETE)?;
    println!("stack updated ({} polls)", outcome.tries);
    Ok(())
}
