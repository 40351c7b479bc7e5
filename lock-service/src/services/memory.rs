//! In-memory [`LockStore`] for tests and local runs.

use crate::models::{
    AccessEntry, AccessGroup, AccessRole, AccessSource, AuditLogEntry, DirectGrant, GroupMember,
    GroupSummary, Lock, NewAuditEntry, NewLock, User,
};
use crate::services::store::LockStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    locks: BTreeMap<i64, Lock>,
    grants: Vec<DirectGrant>,
    groups: BTreeMap<i64, AccessGroup>,
    /// (group, user, role)
    group_users: Vec<(i64, i64, AccessRole)>,
    /// (group, lock)
    group_locks: Vec<(i64, i64)>,
    audit: Vec<AuditLogEntry>,
    next_lock_id: i64,
    next_group_id: i64,
    next_audit_id: i64,
}

impl State {
    fn email(&self, user_id: i64) -> Option<String> {
        self.users.get(&user_id).map(|u| u.email.clone())
    }

    fn with_names(&self, mut entry: AuditLogEntry) -> AuditLogEntry {
        entry.username = self.users.get(&entry.user_id).map(User::display_name);
        entry.lock_name = self.locks.get(&entry.lock_id).map(|l| l.name.clone());
        entry
    }

    fn newest_first(
        &self,
        keep: impl Fn(&AuditLogEntry) -> bool,
        limit: Option<i64>,
    ) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .audit
            .iter()
            .filter(|e| keep(*e))
            .cloned()
            .map(|e| self.with_names(e))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            entries.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        entries
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, anyhow::Error> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory store mutex poisoned: {}", e))
    }

    /// Users are provisioned outside this service; this seeds them.
    pub fn insert_user(&self, user: User) -> Result<(), anyhow::Error> {
        self.state()?.users.insert(user.id, user);
        Ok(())
    }

    /// Every audit row in insertion order.
    pub fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        Ok(self.state()?.audit.clone())
    }
}

#[async_trait]
impl LockStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.state().map(|_| ())
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, anyhow::Error> {
        Ok(self.state()?.users.contains_key(&user_id))
    }

    async fn insert_lock(&self, lock: NewLock) -> Result<Lock, anyhow::Error> {
        let mut state = self.state()?;
        state.next_lock_id += 1;
        let created = Lock {
            id: state.next_lock_id,
            name: lock.name,
            lock_type: lock.lock_type,
            adapter_data: lock.adapter_data,
            owner_id: lock.owner_id,
            owner_name: lock.owner_name,
            floor: lock.floor,
            room: lock.room,
            address: lock.address,
            created_at: Utc::now(),
        };
        state.locks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_lock(&self, lock_id: i64) -> Result<Option<Lock>, anyhow::Error> {
        Ok(self.state()?.locks.get(&lock_id).cloned())
    }

    async fn lock_owner(&self, lock_id: i64) -> Result<Option<i64>, anyhow::Error> {
        Ok(self.state()?.locks.get(&lock_id).map(|l| l.owner_id))
    }

    async fn list_all_locks(&self) -> Result<Vec<Lock>, anyhow::Error> {
        Ok(self.state()?.locks.values().cloned().collect())
    }

    async fn list_accessible_locks(&self, user_id: i64) -> Result<Vec<Lock>, anyhow::Error> {
        let state = self.state()?;
        let groups: Vec<i64> = state
            .group_users
            .iter()
            .filter(|(_, u, _)| *u == user_id)
            .map(|(g, _, _)| *g)
            .collect();

        Ok(state
            .locks
            .values()
            .filter(|lock| {
                lock.owner_id == user_id
                    || state
                        .grants
                        .iter()
                        .any(|g| g.user_id == user_id && g.lock_id == lock.id)
                    || state
                        .group_locks
                        .iter()
                        .any(|(g, l)| *l == lock.id && groups.contains(g))
            })
            .cloned()
            .collect())
    }

    async fn update_adapter_data(
        &self,
        lock_id: i64,
        adapter_data: Value,
    ) -> Result<bool, anyhow::Error> {
        let mut state = self.state()?;
        match state.locks.get_mut(&lock_id) {
            Some(lock) => {
                lock.adapter_data = adapter_data;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_direct_grant(&self, user_id: i64, lock_id: i64) -> Result<bool, anyhow::Error> {
        Ok(self
            .state()?
            .grants
            .iter()
            .any(|g| g.user_id == user_id && g.lock_id == lock_id))
    }

    async fn shares_group_with_lock(
        &self,
        user_id: i64,
        lock_id: i64,
    ) -> Result<bool, anyhow::Error> {
        let state = self.state()?;
        Ok(state.group_locks.iter().any(|(group, lock)| {
            *lock == lock_id
                && state
                    .group_users
                    .iter()
                    .any(|(g, u, _)| g == group && *u == user_id)
        }))
    }

    async fn access_entries(&self, lock_id: i64) -> Result<Vec<AccessEntry>, anyhow::Error> {
        let state = self.state()?;
        let mut entries = Vec::new();

        if let Some(lock) = state.locks.get(&lock_id) {
            entries.push(AccessEntry {
                user_id: lock.owner_id,
                email: state.email(lock.owner_id),
                role: AccessRole::Owner,
                source: AccessSource::Owner,
            });
        }

        let mut grants: Vec<&DirectGrant> =
            state.grants.iter().filter(|g| g.lock_id == lock_id).collect();
        grants.sort_by_key(|g| g.user_id);
        entries.extend(grants.into_iter().map(|g| AccessEntry {
            user_id: g.user_id,
            email: state.email(g.user_id),
            role: g.role,
            source: AccessSource::DirectGrant,
        }));

        let mut members: Vec<(i64, AccessRole)> = state
            .group_locks
            .iter()
            .filter(|(_, l)| *l == lock_id)
            .flat_map(|(group, _)| {
                state
                    .group_users
                    .iter()
                    .filter(move |(g, _, _)| g == group)
                    .map(|(_, u, role)| (*u, *role))
            })
            .collect();
        members.sort_by_key(|(u, _)| *u);
        entries.extend(members.into_iter().map(|(user_id, role)| AccessEntry {
            user_id,
            email: state.email(user_id),
            role,
            source: AccessSource::Group,
        }));

        Ok(entries)
    }

    async fn grant_access(&self, grant: &DirectGrant) -> Result<(), anyhow::Error> {
        let mut state = self.state()?;
        match state
            .grants
            .iter_mut()
            .find(|g| g.user_id == grant.user_id && g.lock_id == grant.lock_id)
        {
            Some(existing) => existing.role = grant.role,
            None => state.grants.push(grant.clone()),
        }
        Ok(())
    }

    async fn create_group(&self, name: &str, owner_id: i64) -> Result<AccessGroup, anyhow::Error> {
        let mut state = self.state()?;
        state.next_group_id += 1;
        let group = AccessGroup {
            id: state.next_group_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.groups.insert(group.id, group.clone());
        state.group_users.push((group.id, owner_id, AccessRole::Owner));
        Ok(group)
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<AccessGroup>, anyhow::Error> {
        Ok(self.state()?.groups.get(&group_id).cloned())
    }

    async fn group_role(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<AccessRole>, anyhow::Error> {
        Ok(self
            .state()?
            .group_users
            .iter()
            .find(|(g, u, _)| *g == group_id && *u == user_id)
            .map(|(_, _, role)| *role))
    }

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<(), anyhow::Error> {
        let mut state = self.state()?;
        match state
            .group_users
            .iter_mut()
            .find(|(g, u, _)| *g == group_id && *u == user_id)
        {
            Some(member) => member.2 = role,
            None => state.group_users.push((group_id, user_id, role)),
        }
        Ok(())
    }

    async fn link_group_lock(&self, group_id: i64, lock_id: i64) -> Result<(), anyhow::Error> {
        let mut state = self.state()?;
        if !state.group_locks.contains(&(group_id, lock_id)) {
            state.group_locks.push((group_id, lock_id));
        }
        Ok(())
    }

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, anyhow::Error> {
        let state = self.state()?;
        let mut members: Vec<GroupMember> = state
            .group_users
            .iter()
            .filter(|(g, _, _)| *g == group_id)
            .map(|(_, user_id, role)| GroupMember {
                user_id: *user_id,
                email: state.email(*user_id),
                role: *role,
            })
            .collect();
        members.sort_by_key(|m| m.user_id);
        Ok(members)
    }

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, anyhow::Error> {
        let state = self.state()?;
        let mut groups: Vec<GroupSummary> = state
            .group_users
            .iter()
            .filter(|(_, u, _)| *u == user_id)
            .filter_map(|(group_id, _, role)| {
                let group = state.groups.get(group_id)?;
                Some(GroupSummary {
                    id: group.id,
                    name: group.name.clone(),
                    role: *role,
                    user_count: state.group_users.iter().filter(|(g, _, _)| g == group_id).count() as i64,
                    lock_count: state.group_locks.iter().filter(|(g, _)| g == group_id).count() as i64,
                })
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<i64, anyhow::Error> {
        let mut state = self.state()?;
        state.next_audit_id += 1;
        let id = state.next_audit_id;
        state.audit.push(AuditLogEntry {
            id,
            user_id: entry.user_id,
            lock_id: entry.lock_id,
            action: entry.action,
            success: entry.success,
            timestamp: entry.timestamp,
            username: None,
            lock_name: None,
        });
        Ok(id)
    }

    async fn audit_for_lock(
        &self,
        lock_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        Ok(self.state()?.newest_first(|e| e.lock_id == lock_id, limit))
    }

    async fn all_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        Ok(self.state()?.newest_first(|_| true, Some(limit)))
    }

    async fn close(&self) {}
}
