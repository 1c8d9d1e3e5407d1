//! Stack output keys the post-provision coordinator depends on.
//!
//! Outputs publish asynchronously after the stack reaches a terminal
//! success status; callers treat a missing key as "not yet available".

pub const DOMAIN_NAME: &str = "DomainName";
pub const DB_HOST: &str = "DbHost";
pub const DB_PORT: &str = "DbPort";
pub const DB_ADMIN_ACCESS_PREFIX_LIST_ID: &str = "DbAdminAccessPrefixListId";
pub const APP_ACCESS_PREFIX_LIST_ID: &str = "AppAccessPrefixListId";
pub const CACHE_ENDPOINT_ADDRESS: &str = "CacheEndpointAddress";
pub const CACHE_ENDPOINT_PORT: &str = "CacheEndpointPort";
pub const QUEUE_URL: &str = "QueueUrl";
pub const BUCKET_NAME: &str = "BucketName";
pub const DB_SECURITY_GROUP_ID: &str = "DbSecurityGroupId";
pub const CONTAINERS_SECURITY_GROUP_ID: &str = "ContainersSecurityGroupId";
pub const CACHE_SECURITY_GROUP_ID: &str = "CacheSecurityGroupId";
pub const MIGRATE_TASK_DEFINITION_ARN: &str = "MigrateTaskDefinitionArn";
pub const CONTAINER_CLUSTER_ARN: &str = "ContainerClusterArn";
pub const SUBNET_1_ID: &str = "Subnet1Id";

/// Everything the coordinator reads right after a successful create.
pub const POST_CREATE_KEYS: &[&str] = &[
    DOMAIN_NAME,
    DB_HOST,
    DB_PORT,
    DB_ADMIN_ACCESS_PREFIX_LIST_ID,
    APP_ACCESS_PREFIX_LIST_ID,
    CACHE_ENDPOINT_ADDRESS,
    CACHE_ENDPOINT_PORT,
    QUEUE_URL,
    BUCKET_NAME,
    DB_SECURITY_GROUP_ID,
    CONTAINERS_SECURITY_GROUP_ID,
    CACHE_SECURITY_GROUP_ID,
    MIGRATE_TASK_DEFINITION_ARN,
    SUBNET_1_ID,
];

/// Volatile outputs re-read after the secrets update to confirm the stack
/// actually refreshed.
pub const POST_UPDATE_KEYS: &[&str] = &[MIGRATE_TASK_DEFINITION_ARN, CONTAINER_CLUSTER_ARN];
