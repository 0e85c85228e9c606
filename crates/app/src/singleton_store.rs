//! Singleton store — schema-aware access to persisted driver/device state.
//!
//! A write-through layer over the raw [`SingletonRepository`]: reads
//! materialize the structural zero value when nothing was persisted yet, so
//! every driver and device always has *some* valid singleton before its
//! first script invocation, and both directions are validated against the
//! schema the driver's code declares.
//!
//! The store also hands out per-key async locks. Driver invocations hold
//! them around their whole read → execute → write sequence, making singleton
//! access single-writer per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use homestead_domain::error::HomesteadError;
use homestead_domain::id::SingletonKey;
use homestead_domain::script::SingletonSchema;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ports::SingletonRepository;

/// Schema-aware singleton access on top of a raw repository.
pub struct SingletonStore<R> {
    repo: R,
    locks: Mutex<HashMap<SingletonKey, Arc<AsyncMutex<()>>>>,
}

impl<R: SingletonRepository> SingletonStore<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive lock for one singleton key.
    ///
    /// The guard must be held for the full read → execute → write sequence
    /// of a driver invocation.
    pub async fn lock(&self, key: &SingletonKey) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().expect("singleton lock table poisoned");
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    /// Read the singleton stored under `key`.
    ///
    /// A key with no prior value yields the schema's structural zero value —
    /// never an absence error. A stored value that no longer matches the
    /// declared schema (driver code changed underneath it) is replaced by
    /// the zero value as well, with a warning.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the underlying repository.
    pub async fn get(
        &self,
        key: &SingletonKey,
        schema: &SingletonSchema,
    ) -> Result<Value, HomesteadError> {
        match self.repo.get(key).await? {
            None => Ok(schema.zero_value()),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) if schema.validate(&value) => Ok(value),
                Ok(_) | Err(_) => {
                    tracing::warn!(%key, "stored singleton does not match its declared schema, using zero value");
                    Ok(schema.zero_value())
                }
            },
        }
    }

    /// Persist `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the underlying repository.
    pub async fn put(&self, key: &SingletonKey, value: &Value) -> Result<(), HomesteadError> {
        let raw = serde_json::to_string(value).map_err(|err| HomesteadError::Storage(Box::new(err)))?;
        self.repo.put(key, &raw).await
    }

    #[cfg(test)]
    pub(crate) fn repo(&self) -> &R {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homestead_domain::id::{DeviceId, DriverKey};
    use homestead_domain::script::ScriptType;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::future::Future;

    struct InMemorySingletonRepo {
        store: Mutex<HashMap<SingletonKey, String>>,
    }

    impl InMemorySingletonRepo {
        fn new() -> Self {
            Self {
                store: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SingletonRepository for InMemorySingletonRepo {
        fn get(
            &self,
            key: &SingletonKey,
        ) -> impl Future<Output = Result<Option<String>, HomesteadError>> + Send {
            let result = self.store.lock().unwrap().get(key).cloned();
            async move { Ok(result) }
        }

        fn put(
            &self,
            key: &SingletonKey,
            json: &str,
        ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
            self.store
                .lock()
                .unwrap()
                .insert(key.clone(), json.to_string());
            async { Ok(()) }
        }
    }

    fn schema() -> SingletonSchema {
        SingletonSchema::new(BTreeMap::from([("on".to_string(), ScriptType::Bool)]))
    }

    fn device_key() -> SingletonKey {
        SingletonKey::Device(DeviceId::new("lamp"))
    }

    #[tokio::test]
    async fn should_return_zero_value_when_nothing_persisted() {
        let store = SingletonStore::new(InMemorySingletonRepo::new());
        let value = store.get(&device_key(), &schema()).await.unwrap();
        assert_eq!(value, json!({"on": false}));
    }

    #[tokio::test]
    async fn should_roundtrip_value_through_put_and_get() {
        let store = SingletonStore::new(InMemorySingletonRepo::new());
        let key = device_key();
        store.put(&key, &json!({"on": true})).await.unwrap();
        let value = store.get(&key, &schema()).await.unwrap();
        assert_eq!(value, json!({"on": true}));
    }

    #[tokio::test]
    async fn should_fall_back_to_zero_value_on_schema_mismatch() {
        let store = SingletonStore::new(InMemorySingletonRepo::new());
        let key = device_key();
        store.put(&key, &json!({"on": "yes"})).await.unwrap();
        let value = store.get(&key, &schema()).await.unwrap();
        assert_eq!(value, json!({"on": false}));
    }

    #[tokio::test]
    async fn should_fall_back_to_zero_value_on_corrupt_json() {
        let repo = InMemorySingletonRepo::new();
        repo.store
            .lock()
            .unwrap()
            .insert(device_key(), "{not json".to_string());
        let store = SingletonStore::new(repo);
        let value = store.get(&device_key(), &schema()).await.unwrap();
        assert_eq!(value, json!({"on": false}));
    }

    #[tokio::test]
    async fn should_hand_out_independent_locks_per_key() {
        let store = SingletonStore::new(InMemorySingletonRepo::new());
        let driver = SingletonKey::Driver(DriverKey::new("shelly", "plug-s"));
        let _device_guard = store.lock(&device_key()).await;
        // A different key must not block.
        let _driver_guard = store.lock(&driver).await;
    }

    #[tokio::test]
    async fn should_serialize_access_to_one_key() {
        let store = Arc::new(SingletonStore::new(InMemorySingletonRepo::new()));
        let guard = store.lock(&device_key()).await;
        let contended = Arc::clone(&store);
        let waiter = tokio::spawn(async move {
            let _guard = contended.lock(&device_key()).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
