//! Build-wide registry of produced components.
//!
//! The only mutable state shared between build nodes. Writers go through a
//! mutex; readers get a cloned snapshot and never observe a half-written
//! entry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::core::component::{Component, Verdict};

/// A produced component and its verification verdict, if checked yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub component: Component,
    pub verdict: Option<Verdict>,
}

impl RegistryEntry {
    pub fn is_verified(&self) -> bool {
        matches!(self.verdict, Some(Verdict::Pass { .. }))
    }
}

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegistryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a produced component. Re-registering a name replaces the old
    /// entry and clears its verdict.
    pub fn register(&self, component: Component) {
        let mut entries = self.lock();
        let entry = RegistryEntry {
            component,
            verdict: None,
        };
        match entries
            .iter_mut()
            .find(|e| e.component.name == entry.component.name)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Record the verdict for a registered component. Returns false when no
    /// component of that name is registered.
    pub fn record_verdict(&self, name: &str, verdict: Verdict) -> bool {
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.component.name == name) {
            Some(entry) => {
                entry.verdict = Some(verdict);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.lock()
            .iter()
            .find(|e| e.component.name == name)
            .cloned()
    }

    /// Components with a passing verdict.
    pub fn verified(&self) -> Vec<Component> {
        self.lock()
            .iter()
            .filter(|e| e.is_verified())
            .map(|e| e.component.clone())
            .collect()
    }

    /// Components without a passing verdict.
    pub fn unverified(&self) -> Vec<RegistryEntry> {
        self.lock()
            .iter()
            .filter(|e| !e.is_verified())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn component(name: &str) -> Component {
        Component {
            name: name.to_string(),
            objects: Vec::new(),
            include_dirs: Vec::new(),
            profile: "hosted".to_string(),
            output: PathBuf::from(format!("/out/{}.comp", name)),
            map: None,
        }
    }

    #[test]
    fn test_verdicts() {
        let registry = ComponentRegistry::new();
        registry.register(component("net"));
        registry.register(component("disk"));

        assert!(registry.record_verdict(
            "disk",
            Verdict::Pass {
                digest: "00".to_string()
            }
        ));
        assert!(registry.record_verdict(
            "net",
            Verdict::Fail {
                symbols: vec!["hal_init".to_string()]
            }
        ));
        assert!(!registry.record_verdict("vga", Verdict::Fail { symbols: Vec::new() }));

        let verified: Vec<_> = registry.verified().into_iter().map(|c| c.name).collect();
        assert_eq!(verified, ["disk"]);
        assert_eq!(registry.unverified()[0].component.name, "net");
    }

    #[test]
    fn test_reregister_clears_verdict() {
        let registry = ComponentRegistry::new();
        registry.register(component("net"));
        registry.record_verdict(
            "net",
            Verdict::Pass {
                digest: "00".to_string(),
            },
        );
        registry.register(component("net"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("net").unwrap().verdict, None);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ComponentRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register(component(&format!("c{}", i))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
    }
}
