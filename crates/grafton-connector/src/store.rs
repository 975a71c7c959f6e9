// crates/grafton-connector/src/store.rs
// ============================================================================
// Module: Platform Store
// Description: In-memory resources, credentials, and usage measures.
// Purpose: Back the connector's resource routes with provisioned state.
// Dependencies: grafton-core, time
// ============================================================================

//! ## Overview
//! A map-backed store of what the harness has provisioned. Deleting a
//! resource removes its credentials; measures are append-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use grafton_core::ObjectId;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::types::Credential;
use crate::types::MeasureRecord;
use crate::types::MeasureReport;
use crate::types::Resource;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store contents guarded by one lock.
#[derive(Debug, Default)]
struct Tables {
    /// Resources by id.
    resources: BTreeMap<ObjectId, Resource>,
    /// Credentials by id.
    credentials: BTreeMap<ObjectId, Credential>,
    /// Measures by resource, in receipt order.
    measures: BTreeMap<ObjectId, Vec<MeasureRecord>>,
}

/// In-memory platform store.
#[derive(Debug, Default)]
pub struct PlatformStore {
    /// Guarded tables.
    tables: Mutex<Tables>,
}

impl PlatformStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the tables, recovering from poisoning.
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a resource.
    pub fn put_resource(&self, resource: Resource) {
        self.tables().resources.insert(resource.id, resource);
    }

    /// Returns a resource by id.
    #[must_use]
    pub fn resource(&self, id: ObjectId) -> Option<Resource> {
        self.tables().resources.get(&id).cloned()
    }

    /// Number of stored resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.tables().resources.len()
    }

    /// Updates a resource's plan and features; false when unknown.
    pub fn change_plan(
        &self,
        id: ObjectId,
        plan: &str,
        features: BTreeMap<String, serde_json::Value>,
    ) -> bool {
        let mut tables = self.tables();
        let Some(resource) = tables.resources.get_mut(&id) else {
            return false;
        };
        plan.clone_into(&mut resource.plan);
        resource.features = features;
        resource.updated_at = now_rfc3339();
        true
    }

    /// Deletes a resource and its credentials; false when unknown.
    pub fn delete_resource(&self, id: ObjectId) -> bool {
        let mut tables = self.tables();
        if tables.resources.remove(&id).is_none() {
            return false;
        }
        tables.credentials.retain(|_, credential| credential.resource_id != Some(id));
        true
    }

    /// Stores a credential; it must name its resource.
    ///
    /// Returns false when `resource_id` is unset.
    pub fn put_credential(&self, credential: Credential) -> bool {
        if credential.resource_id.is_none() {
            return false;
        }
        self.tables().credentials.insert(credential.id, credential);
        true
    }

    /// Returns a credential by id.
    #[must_use]
    pub fn credential(&self, id: ObjectId) -> Option<Credential> {
        self.tables().credentials.get(&id).cloned()
    }

    /// Returns every credential attached to `resource_id`.
    #[must_use]
    pub fn credentials_for(&self, resource_id: ObjectId) -> Vec<Credential> {
        self.tables()
            .credentials
            .values()
            .filter(|credential| credential.resource_id == Some(resource_id))
            .cloned()
            .collect()
    }

    /// Deletes a credential; false when unknown.
    pub fn delete_credential(&self, id: ObjectId) -> bool {
        self.tables().credentials.remove(&id).is_some()
    }

    /// Appends a usage report for `resource_id`.
    pub fn put_measures(&self, resource_id: ObjectId, report: MeasureReport) {
        let record = MeasureRecord {
            resource_id,
            report,
            updated_at: now_rfc3339(),
        };
        self.tables().measures.entry(resource_id).or_default().push(record);
    }

    /// Returns every usage report for `resource_id`.
    #[must_use]
    pub fn measures_for(&self, resource_id: ObjectId) -> Vec<MeasureRecord> {
        self.tables().measures.get(&resource_id).cloned().unwrap_or_default()
    }
}

/// Current UTC time in RFC3339; empty if formatting fails.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]

    use std::collections::BTreeMap;

    use grafton_core::IdKind;
    use grafton_core::ObjectId;

    use super::PlatformStore;
    use super::now_rfc3339;
    use crate::types::Credential;
    use crate::types::Resource;

    fn resource() -> Resource {
        Resource {
            id: ObjectId::generate(IdKind::Resource),
            name: "bonnets".to_string(),
            label: "bonnets".to_string(),
            plan: "small".to_string(),
            product: "bonnets".to_string(),
            region: "aws::us-east-1".to_string(),
            features: BTreeMap::new(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    #[test]
    fn deleting_a_resource_drops_its_credentials() {
        let store = PlatformStore::new();
        let resource = resource();
        let id = resource.id;
        store.put_resource(resource);
        let credential = Credential {
            id: ObjectId::generate(IdKind::Credential),
            resource_id: Some(id),
            keys: BTreeMap::from([("PASSWORD".to_string(), "hunter2".to_string())]),
            custom_names: BTreeMap::new(),
            created_on: now_rfc3339(),
        };
        let credential_id = credential.id;
        assert!(store.put_credential(credential));
        assert_eq!(store.credentials_for(id).len(), 1);
        assert!(store.delete_resource(id));
        assert!(store.resource(id).is_none());
        assert!(store.credential(credential_id).is_none());
        assert!(!store.delete_resource(id));
    }

    #[test]
    fn plan_changes_apply_to_known_resources_only() {
        let store = PlatformStore::new();
        let resource = resource();
        let id = resource.id;
        store.put_resource(resource);
        assert!(store.change_plan(id, "large", BTreeMap::new()));
        assert_eq!(store.resource(id).unwrap().plan, "large");
        assert!(!store.change_plan(ObjectId::generate(IdKind::Resource), "large", BTreeMap::new()));
    }
}
