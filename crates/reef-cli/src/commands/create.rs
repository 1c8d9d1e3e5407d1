//! `reef create` - provision a complete environment.
//!
//! Issues the certificate first so the stack can reference its ARN, then
//! creates the stack disabled, then hands off to the post-provision
//! coordinator which enables it once secrets and the schema exist.

use super::CommandContext;
use anyhow::anyhow;
use reef_runtime::certificate::CertificateWorkflow;
use reef_runtime::credentials;
use reef_runtime::params::CreateParams;
use reef_runtime::provider::DnsZones;
use reef_runtime::provision::{PostProvisionCoordinator, ProvisionInputs};
use reef_runtime::stack;
use std::sync::Arc;

pub struct CreateArgs {
    pub application_image: String,
    pub webserver_image: String,
    pub db_instance_class: String,
    pub db_storage: u32,
    pub db_engine_version: String,
    pub cache_node_type: String,
    pub task_cpu: String,
    pub task_memory: String,
}

pub async fn run(ctx: &CommandContext, args: CreateArgs) -> anyhow::Result<()> {
    let region = ctx.region()?;
    let domain = ctx.domain()?;
    let root = reef_core::root_domain(&domain);

    let zone_id = ctx
        .providers
        .dns
        .hosted_zone_id(&root)
        .await?
        .ok_or_else(|| anyhow!("no hosted zone found for '{root}'"))?;

    let workflow = CertificateWorkflow::new(
        Arc::clone(&ctx.providers.certificates),
        Arc::clone(&ctx.providers.dns),
    );
    let certificate_arn = workflow.issue(&domain, &zone_id).await?;
    println!("certificate issued: {certificate_arn}");

    let db_username = credentials::database_username();
    let db_password = credentials::database_password();

    let params = CreateParams {
        enabled: false,
        project_name: ctx.config.project_name.clone(),
        project_id: ctx.config.project_id.clone(),
        environment: ctx.environment,
        domain: domain.clone(),
        root_domain: root,
        hosted_zone_id: zone_id,
        certificate_arn,
        db_storage_gb: args.db_storage,
        db_instance_class: args.db_instance_class,
        db_availability_zone: format!("{region}a"),
        db_engine_version: args.db_engine_version,
        db_master_username: db_username.clone(),
        db_master_password: db_password.clone(),
        cache_node_type: args.cache_node_type,
        application_image: args.application_image,
        webserver_image: args.webserver_image,
        task_cpu: args.task_cpu,
        task_memory: args.task_memory,
    };

    ctx.stack.create(&params, &ctx.template_path).await?;
    println!("stack '{}' creation started", ctx.stack.name());

    ctx.stack
        .wait_for(stack::CREATE_COMPLETE)
        .await?
        .expect_success(stack::CREATE_COMPLETE)?;
    println!("stack created, provisioning the environment");

    let coordinator = PostProvisionCoordinator::new(
        ctx.providers.clone(),
        Arc::clone(&ctx.stack),
        ctx.template_path.clone(),
    );
    let report = coordinator
        .run(&ProvisionInputs {
            region,
            db_username,
            db_password,
            required_variables: ctx.env_config.required_variables(),
        })
        .await?;

    println!("environment ready at https://{}", report.domain);
    println!("database schema: {}", report.database_name);
    println!("secrets stored: {}", report.secret_names.len());
    println!("migration task: {}", report.migration_task_arn);
    Ok(())
}
