//! Privacy group definitions plus a member-set index.
//!
//! ```text
//! privacygroup   group id             -> PrivacyGroupPayload
//! groupidx       LEGACY id(members)   -> [group id, ...]
//! ```
//!
//! The index key is the LEGACY id of a group's member set, so lookups by
//! members ignore order and duplicates and find PANTHEON groups too.

use std::sync::Arc;

use parking_lot::Mutex;

use super::StorageEngine;
use crate::crypto::PublicKey;
use crate::enclave::Enclave;
use crate::encoding;
use crate::error::{Error, Result};
use crate::payload::{PrivacyGroup, PrivacyGroupId, PrivacyGroupPayload, PrivacyGroupType};

/// Store of privacy group definitions
#[derive(Clone)]
pub struct PrivacyGroupStorage {
    groups: Arc<dyn StorageEngine>,
    index: Arc<dyn StorageEngine>,
    // serializes read-modify-write of index entries
    index_lock: Arc<Mutex<()>>,
}

impl PrivacyGroupStorage {
    /// Wrap the group and index engines
    pub fn new(groups: Arc<dyn StorageEngine>, index: Arc<dyn StorageEngine>) -> Self {
        Self {
            groups,
            index,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Write a definition under `id` and index it by member set.
    ///
    /// Deletion is a rewrite with state DELETED; entries are never erased.
    pub fn put(&self, id: &PrivacyGroupId, group: &PrivacyGroupPayload) -> Result<()> {
        self.groups.put(id.as_bytes(), &encoding::to_cbor(group)?)?;
        self.index_add(&group.members, id)
    }

    /// Stored definition, including deleted ones
    pub fn get(&self, id: &PrivacyGroupId) -> Result<Option<PrivacyGroupPayload>> {
        self.groups
            .get(id.as_bytes())?
            .map(|bytes| encoding::from_cbor(&bytes))
            .transpose()
    }

    /// Active definition; `NotFound` if absent or deleted
    pub fn get_active(&self, id: &PrivacyGroupId) -> Result<PrivacyGroupPayload> {
        match self.get(id)? {
            Some(group) if group.is_active() => Ok(group),
            _ => Err(Error::NotFound(format!("privacy group {}", id))),
        }
    }

    /// Every active group whose member set equals `members`
    pub fn find(&self, members: &[PublicKey]) -> Result<Vec<PrivacyGroup>> {
        let mut found = Vec::new();
        for id in self.indexed(&index_key(members))? {
            if let Some(group) = self.get(&id)? {
                if group.is_active() {
                    found.push(PrivacyGroup::from_payload(id, &group));
                }
            }
        }
        Ok(found)
    }

    fn index_add(&self, members: &[PublicKey], id: &PrivacyGroupId) -> Result<()> {
        let key = index_key(members);
        let _guard = self.index_lock.lock();
        let mut ids = self.indexed(&key)?;
        if !ids.contains(id) {
            ids.push(*id);
            self.index.put(key.as_bytes(), &encoding::to_cbor(&ids)?)?;
        }
        Ok(())
    }

    fn indexed(&self, key: &PrivacyGroupId) -> Result<Vec<PrivacyGroupId>> {
        match self.index.get(key.as_bytes())? {
            Some(bytes) => encoding::from_cbor(&bytes),
            None => Ok(Vec::new()),
        }
    }
}

fn index_key(members: &[PublicKey]) -> PrivacyGroupId {
    Enclave::generate_privacy_group_id(members, None, PrivacyGroupType::Legacy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::payload::PrivacyGroupState;
    use crate::storage::MemoryStorage;

    fn storage() -> PrivacyGroupStorage {
        PrivacyGroupStorage::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    fn group(members: Vec<PublicKey>, kind: PrivacyGroupType) -> PrivacyGroupPayload {
        PrivacyGroupPayload {
            kind,
            members,
            seed: None,
            name: "name".into(),
            description: "description".into(),
            state: PrivacyGroupState::Active,
        }
    }

    #[test]
    fn test_unknown_group_is_not_found() {
        let store = storage();
        let id = PrivacyGroupId::from_bytes([4u8; 32]);
        assert!(store.get(&id).unwrap().is_none());
        assert!(matches!(store.get_active(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_deleted_group_behaves_as_absent() {
        let store = storage();
        let members = vec![KeyPair::generate().public, KeyPair::generate().public];
        let id = PrivacyGroupId::from_bytes([5u8; 32]);
        let active = group(members.clone(), PrivacyGroupType::Pantheon);

        store.put(&id, &active).unwrap();
        assert_eq!(store.get_active(&id).unwrap(), active);
        assert_eq!(store.find(&members).unwrap().len(), 1);

        store.put(&id, &active.deleted()).unwrap();
        assert!(matches!(store.get_active(&id), Err(Error::NotFound(_))));
        assert!(store.find(&members).unwrap().is_empty());
        // still on record
        assert!(store.get(&id).unwrap().is_some());
    }

    #[test]
    fn test_find_ignores_member_order() {
        let store = storage();
        let a = KeyPair::generate().public;
        let b = KeyPair::generate().public;
        let c = KeyPair::generate().public;

        let pantheon = PrivacyGroupId::from_bytes([1u8; 32]);
        store.put(&pantheon, &group(vec![a, b], PrivacyGroupType::Pantheon)).unwrap();
        let legacy = index_key(&[a, b]);
        store.put(&legacy, &group(vec![b, a], PrivacyGroupType::Legacy)).unwrap();
        let unrelated = PrivacyGroupId::from_bytes([2u8; 32]);
        store.put(&unrelated, &group(vec![a, c], PrivacyGroupType::Pantheon)).unwrap();

        let found = store.find(&[b, a, b]).unwrap();
        let ids: Vec<_> = found.iter().map(|g| g.privacy_group_id).collect();
        assert_eq!(ids, vec![pantheon, legacy]);
    }

    #[test]
    fn test_rewrite_does_not_duplicate_index() {
        let store = storage();
        let members = vec![KeyPair::generate().public];
        let id = index_key(&members);
        let legacy = group(members.clone(), PrivacyGroupType::Legacy);

        store.put(&id, &legacy).unwrap();
        store.put(&id, &legacy).unwrap();

        assert_eq!(store.find(&members).unwrap().len(), 1);
    }
}
