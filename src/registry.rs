//! Provider Registry - Injected, Ordered Provider Set
//!
//! # Purpose
//!
//! Holds every AI backend the router may use, together with its static
//! [`ProviderDescriptor`] and a runtime availability flag.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              ProviderRegistry (registration order)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  0: openai     descriptor  Arc<dyn AIProvider>  [up]        │
//! │  1: anthropic  descriptor  Arc<dyn AIProvider>  [up]        │
//! │  2: gemini     descriptor  Arc<dyn AIProvider>  [down]      │
//! │  3: local      descriptor  Arc<dyn AIProvider>  [up]        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Registration order matters: it is the last-resort routing order and the
//! order in which fallback candidates are appended.
//!
//! Availability toggles take `&self`, so a registry shared behind an `Arc`
//! can be marked up or down while requests are in flight.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register(ProviderDescriptor::new("mock"), Arc::new(MockProvider::new("mock")));
//! registry.mark_down("mock")?;
//! assert!(!registry.is_available("mock"));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, RouterError};
use crate::traits::AIProvider;
use crate::types::ProviderDescriptor;

struct RegisteredProvider {
    descriptor: ProviderDescriptor,
    adapter: Arc<dyn AIProvider>,
    available: AtomicBool,
}

/// Ordered set of providers with availability flags.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .field("available", &self.available_ids())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// The initial availability comes from `descriptor.available`. If a
    /// provider with the same id exists it is replaced in place, keeping its
    /// registration slot.
    pub fn register(&mut self, descriptor: ProviderDescriptor, adapter: Arc<dyn AIProvider>) {
        let entry = RegisteredProvider {
            available: AtomicBool::new(descriptor.available),
            descriptor,
            adapter,
        };

        match self.position(&entry.descriptor.id) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove a provider, returning its adapter.
    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn AIProvider>> {
        let index = self.position(id)?;
        Some(self.entries.remove(index).adapter)
    }

    /// Set the availability flag of a provider.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ProviderNotFound`] for an unknown id.
    pub fn set_available(&self, id: &str, available: bool) -> Result<()> {
        let entry = self
            .entry(id)
            .ok_or_else(|| RouterError::ProviderNotFound(id.to_string()))?;
        let previous = entry.available.swap(available, Ordering::SeqCst);
        if previous != available {
            info!(provider = id, available, "Provider availability changed");
        }
        Ok(())
    }

    /// Mark a provider as available.
    pub fn mark_up(&self, id: &str) -> Result<()> {
        self.set_available(id, true)
    }

    /// Mark a provider as unavailable.
    pub fn mark_down(&self, id: &str) -> Result<()> {
        self.set_available(id, false)
    }

    /// Whether a provider is registered and currently available.
    pub fn is_available(&self, id: &str) -> bool {
        self.entry(id)
            .map(|e| e.available.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Whether a provider is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Snapshot of a provider's descriptor with the current availability.
    pub fn descriptor(&self, id: &str) -> Option<ProviderDescriptor> {
        self.entry(id).map(|e| {
            let mut descriptor = e.descriptor.clone();
            descriptor.available = e.available.load(Ordering::SeqCst);
            descriptor
        })
    }

    /// Adapter for a provider.
    pub fn adapter(&self, id: &str) -> Option<Arc<dyn AIProvider>> {
        self.entry(id).map(|e| e.adapter.clone())
    }

    /// All provider ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.descriptor.id.clone()).collect()
    }

    /// Available provider ids in registration order.
    pub fn available_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.available.load(Ordering::SeqCst))
            .map(|e| e.descriptor.id.clone())
            .collect()
    }

    /// Descriptors of every provider, lowest `priority` first. Ties keep
    /// registration order. Routing never reads this ordering.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut descriptors: Vec<ProviderDescriptor> = self
            .entries
            .iter()
            .filter_map(|e| self.descriptor(&e.descriptor.id))
            .collect();
        descriptors.sort_by_key(|d| d.priority);
        descriptors
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.descriptor.id == id)
    }

    fn entry(&self, id: &str) -> Option<&RegisteredProvider> {
        self.entries.iter().find(|e| e.descriptor.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    fn registry_with(ids: &[&str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for id in ids {
            registry.register(ProviderDescriptor::new(*id), Arc::new(MockProvider::new(*id)));
        }
        registry
    }

    #[test]
    fn test_registry_default_is_empty() {
        let registry = ProviderRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.ids().is_empty());
        assert!(registry.available_ids().is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = registry_with(&["c", "a", "b"]);
        assert_eq!(registry.ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_descriptors_listed_by_priority() {
        let mut registry = ProviderRegistry::new();
        for (id, priority) in [("slow", 3), ("fast", 1), ("tie-a", 2), ("tie-b", 2)] {
            registry.register(
                ProviderDescriptor::new(id).with_priority(priority),
                Arc::new(MockProvider::new(id)),
            );
        }
        registry.mark_down("fast").unwrap();

        let listed: Vec<(String, bool)> = registry
            .descriptors()
            .into_iter()
            .map(|d| (d.id, d.available))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("fast".to_string(), false),
                ("tie-a".to_string(), true),
                ("tie-b".to_string(), true),
                ("slow".to_string(), true),
            ]
        );
        // routing order is untouched
        assert_eq!(registry.ids(), vec!["slow", "fast", "tie-a", "tie-b"]);
    }

    #[test]
    fn test_reregister_keeps_slot() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.register(
            ProviderDescriptor::new("b").with_cost_per_token(0.5),
            Arc::new(MockProvider::new("b")),
        );

        assert_eq!(registry.ids(), vec!["a", "b", "c"]);
        assert_eq!(registry.descriptor("b").unwrap().cost_per_token, 0.5);
    }

    #[test]
    fn test_initial_availability_from_descriptor() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderDescriptor::new("down").with_available(false),
            Arc::new(MockProvider::new("down")),
        );
        assert!(registry.contains("down"));
        assert!(!registry.is_available("down"));
    }

    #[test]
    fn test_mark_down_and_up() {
        let registry = registry_with(&["a", "b"]);

        registry.mark_down("a").unwrap();
        assert!(!registry.is_available("a"));
        assert_eq!(registry.available_ids(), vec!["b"]);
        assert!(!registry.descriptor("a").unwrap().available);

        registry.mark_up("a").unwrap();
        assert_eq!(registry.available_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_set_available_unknown_provider() {
        let registry = registry_with(&["a"]);
        let err = registry.mark_down("nope").unwrap_err();
        assert!(matches!(err, RouterError::ProviderNotFound(_)));
    }

    #[test]
    fn test_unknown_provider_is_not_available() {
        let registry = registry_with(&["a"]);
        assert!(!registry.is_available("zzz"));
        assert!(registry.descriptor("zzz").is_none());
        assert!(registry.adapter("zzz").is_none());
    }

    #[test]
    fn test_remove_provider() {
        let mut registry = registry_with(&["a", "b"]);
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_adapter_returns_cloned_arc() {
        let registry = registry_with(&["a"]);
        let p1 = registry.adapter("a").unwrap();
        let p2 = registry.adapter("a").unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }
}
