//! Claim registry - which binder owns which control
//!
//! One registry is shared by every binder of an application (cheap `Clone`,
//! same underlying table). A binder registers its name on construction,
//! claims identifiers as it hooks them and releases everything on drop.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{FormSyncError, Result};

/// Binder name → claimed control identifiers
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    claims: Rc<RefCell<FxHashMap<String, Vec<String>>>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binder name with no claims yet
    pub fn register(&self, binder: &str) -> Result<()> {
        let mut claims = self.claims.borrow_mut();
        if claims.contains_key(binder) {
            return Err(FormSyncError::DuplicateBinder {
                name: binder.to_string(),
            });
        }
        claims.insert(binder.to_string(), Vec::new());
        Ok(())
    }

    /// Fail if another binder already claims `identifier`
    pub fn check_unclaimed(&self, binder: &str, identifier: &str) -> Result<()> {
        match self.owner_of_other(Some(binder), identifier) {
            Some(owner) => Err(FormSyncError::DuplicateHook {
                identifier: identifier.to_string(),
                owner,
            }),
            None => Ok(()),
        }
    }

    /// Record `identifier` as claimed by `binder`
    pub fn claim(&self, binder: &str, identifier: &str) {
        let mut claims = self.claims.borrow_mut();
        let owned = claims.entry(binder.to_string()).or_default();
        if !owned.iter().any(|id| id == identifier) {
            owned.push(identifier.to_string());
        }
    }

    /// Drop the binder and all its claims
    pub fn release(&self, binder: &str) {
        if let Some(released) = self.claims.borrow_mut().remove(binder) {
            debug!(binder, claims = released.len(), "claims released");
        }
    }

    /// First binder (by name) claiming `identifier`
    pub fn owner_of(&self, identifier: &str) -> Option<String> {
        self.owner_of_other(None, identifier)
    }

    fn owner_of_other(&self, exclude: Option<&str>, identifier: &str) -> Option<String> {
        let claims = self.claims.borrow();
        let mut owners: Vec<&String> = claims
            .iter()
            .filter(|(name, ids)| {
                exclude != Some(name.as_str()) && ids.iter().any(|id| id == identifier)
            })
            .map(|(name, _)| name)
            .collect();
        owners.sort();
        owners.first().map(|name| name.to_string())
    }

    pub fn claims_of(&self, binder: &str) -> Vec<String> {
        self.claims
            .borrow()
            .get(binder)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_registered(&self, binder: &str) -> bool {
        self.claims.borrow().contains_key(binder)
    }

    /// Forget every binder (test isolation, application reset)
    pub fn clear(&self) {
        self.claims.borrow_mut().clear();
    }

    /// Number of registered binders
    pub fn len(&self) -> usize {
        self.claims.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.borrow().is_empty()
    }
}
