//! Secrets synchronization.
//!
//! Secret values materialize ARNs asynchronously after being stored.
//! Referencing a not-yet-existent ARN from the stack template produces a
//! broken update, so the workflow refuses to return until the store
//! reports every required name.

use crate::error::{OrchestratorError, Result};
use crate::provider::SecretStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 120;

pub struct SecretsSync {
    store: Arc<dyn SecretStore>,
}

impl SecretsSync {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Stores every value, then waits until all names have ARNs.
    pub async fn create_and_wait(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        for (name, value) in values {
            self.store.put_parameter(name, value).await?;
            info!(name, "stored secret");
        }

        let required: Vec<String> = values.keys().cloned().collect();
        self.wait_for_all(&required).await
    }

    /// Polls the store every 5 seconds until every required name is
    /// present, returning the complete name-to-ARN mapping.
    ///
    /// Bounded at 120 polls (ten minutes); exhaustion surfaces a timeout
    /// like every other wait in the system.
    pub async fn wait_for_all(&self, required: &[String]) -> Result<BTreeMap<String, String>> {
        for polls in 1..=MAX_POLLS {
            let arns = self.store.list_parameter_arns().await?;
            if required.iter().all(|name| arns.contains_key(name)) {
                return Ok(arns);
            }

            info!(
                polls,
                materialized = arns.len(),
                required = required.len(),
                "secrets still materializing"
            );
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(OrchestratorError::Timeout {
            tries: MAX_POLLS,
            waited: POLL_INTERVAL * MAX_POLLS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Secret store whose ARN listing follows a fixed script.
    struct ScriptedStore {
        listings: Mutex<Vec<Vec<&'static str>>>,
        probes: Mutex<u32>,
    }

    impl ScriptedStore {
        fn new(listings: Vec<Vec<&'static str>>) -> Self {
            Self {
                listings: Mutex::new(listings),
                probes: Mutex::new(0),
            }
        }

        fn probes(&self) -> u32 {
            *self.probes.lock().unwrap()
        }
    }

    #[async_trait]
    impl SecretStore for ScriptedStore {
        async fn put_parameter(&self, _name: &str, _value: &str) -> ProviderResult<()> {
            Ok(())
        }

        async fn delete_parameter(&self, _name: &str) -> ProviderResult<()> {
            Ok(())
        }

        async fn list_parameters(&self) -> ProviderResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn list_parameter_arns(&self) -> ProviderResult<BTreeMap<String, String>> {
            let mut probes = self.probes.lock().unwrap();
            *probes += 1;
            let mut listings = self.listings.lock().unwrap();
            if listings.is_empty() {
                return Err(ProviderError::Remote("script exhausted".to_string()));
            }
            let names = if listings.len() == 1 {
                listings[0].clone()
            } else {
                listings.remove(0)
            };
            Ok(names
                .into_iter()
                .map(|n| (n.to_string(), format!("arn:cloud:param/{n}")))
                .collect())
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_exactly_two_probes_once_all_names_materialize() {
        let store = Arc::new(ScriptedStore::new(vec![
            vec!["A", "B", "C"],
            vec!["A", "B", "C", "D", "E"],
        ]));
        let sync = SecretsSync::new(Arc::clone(&store) as Arc<dyn SecretStore>);

        let arns = sync
            .wait_for_all(&names(&["A", "B", "C", "D", "E"]))
            .await
            .unwrap();

        assert_eq!(store.probes(), 2);
        assert_eq!(arns.len(), 5);
        assert_eq!(arns["D"], "arn:cloud:param/D");
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_completeness_takes_one_probe() {
        let store = Arc::new(ScriptedStore::new(vec![vec!["A", "B"]]));
        let sync = SecretsSync::new(Arc::clone(&store) as Arc<dyn SecretStore>);

        sync.wait_for_all(&names(&["A", "B"])).await.unwrap();
        assert_eq!(store.probes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_materializing_times_out() {
        let store = Arc::new(ScriptedStore::new(vec![vec!["A"]]));
        let sync = SecretsSync::new(Arc::clone(&store) as Arc<dyn SecretStore>);

        let err = sync.wait_for_all(&names(&["A", "B"])).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Timeout { tries: 120, .. }
        ));
    }
}
