//! RAII handle for a store listener

use std::sync::Weak;

/// Type-erased access to a store's listener list
pub(super) trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64);
}

/// Keeps a listener registered; dropping it unsubscribes
///
/// The handle holds only a weak reference to the store, so it never keeps a
/// store alive on its own.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    registry: Option<Weak<dyn Unsubscribe>>,
    id: u64,
}

impl Subscription {
    pub(super) fn new(registry: Weak<dyn Unsubscribe>, id: u64) -> Self {
        Self {
            registry: Some(registry),
            id,
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.registry.is_some())
            .finish()
    }
}
