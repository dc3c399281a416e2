//! Process-local registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ActiveRegistry, RegistryError};

/// In-memory active record, shareable between instances in one process.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    value: Mutex<Option<String>>,
    failures: AtomicU32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry already holding `address`.
    pub fn with_active(address: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(address.into())),
            failures: AtomicU32::new(0),
        }
    }

    /// Make the next `count` operations fail with `Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Current value without going through the trait.
    pub fn peek(&self) -> Option<String> {
        self.value.lock().expect("registry mutex poisoned").clone()
    }

    /// Overwrite or clear the value without going through the trait.
    pub fn force(&self, value: Option<String>) {
        *self.value.lock().expect("registry mutex poisoned") = value;
    }

    fn check_failure(&self) -> Result<(), RegistryError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(RegistryError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ActiveRegistry for MemoryRegistry {
    async fn get_active(&self) -> Result<Option<String>, RegistryError> {
        self.check_failure()?;
        Ok(self.peek())
    }

    async fn set_active(&self, address: &str) -> Result<(), RegistryError> {
        self.check_failure()?;
        self.force(Some(address.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_write_wins() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.get_active().await.unwrap(), None);

        registry.set_active("10.0.0.1:8081").await.unwrap();
        registry.set_active("10.0.0.2:8081").await.unwrap();
        assert_eq!(registry.get_active().await.unwrap().as_deref(), Some("10.0.0.2:8081"));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let registry = MemoryRegistry::with_active("10.0.0.1:8081");
        registry.fail_next(2);

        assert!(registry.get_active().await.is_err());
        assert!(registry.set_active("x:1").await.is_err());
        assert_eq!(registry.get_active().await.unwrap().as_deref(), Some("10.0.0.1:8081"));
    }
}
