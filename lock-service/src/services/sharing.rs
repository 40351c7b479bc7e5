//! Direct grants and access groups.

use crate::models::{
    AccessEntry, AccessGroup, AccessRole, DirectGrant, GroupMember, GroupSummary, Identity,
};
use crate::services::access::{require_owner_or_admin, AccessResolver};
use crate::services::error::ServiceError;
use crate::services::store::LockStore;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct SharingService {
    store: Arc<dyn LockStore>,
    resolver: AccessResolver,
}

impl SharingService {
    pub fn new(store: Arc<dyn LockStore>, resolver: AccessResolver) -> Self {
        Self { store, resolver }
    }

    pub async fn list_users_with_access(
        &self,
        requester: &Identity,
        lock_id: i64,
    ) -> Result<Vec<AccessEntry>, ServiceError> {
        self.resolver.list_users_with_access(requester, lock_id).await
    }

    /// Give a user explicit access to a lock. Owner or admin only; a grant
    /// never confers ownership.
    #[instrument(skip(self), fields(requester = requester.id))]
    pub async fn grant_access(
        &self,
        requester: &Identity,
        lock_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<DirectGrant, ServiceError> {
        if role == AccessRole::Owner {
            return Err(ServiceError::BadRequest(
                "a direct grant cannot make a user the owner".to_string(),
            ));
        }

        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::lock_not_found(lock_id))?;
        require_owner_or_admin(requester, &lock)?;
        self.require_user(user_id).await?;

        let grant = DirectGrant {
            user_id,
            lock_id,
            role,
        };
        self.store
            .grant_access(&grant)
            .await
            .map_err(ServiceError::Persistence)?;

        info!(lock_id, user_id, role = role.as_str(), "Direct grant stored");
        Ok(grant)
    }

    /// The creator becomes the group's owner.
    #[instrument(skip(self), fields(requester = requester.id))]
    pub async fn create_group(&self, requester: &Identity, name: &str) -> Result<AccessGroup, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::BadRequest("group name is required".to_string()));
        }
        self.store
            .create_group(name, requester.id)
            .await
            .map_err(ServiceError::Persistence)
    }

    /// System admins and group owners/admins may add members. Only a system
    /// admin or the group owner may hand out the owner role.
    #[instrument(skip(self), fields(requester = requester.id))]
    pub async fn add_group_member(
        &self,
        requester: &Identity,
        group_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<GroupMember, ServiceError> {
        let requester_role = self.require_group_manager(requester, group_id).await?;
        if role == AccessRole::Owner
            && !requester.is_admin()
            && requester_role != Some(AccessRole::Owner)
        {
            return Err(ServiceError::Denied(
                "only the group owner can add another owner".to_string(),
            ));
        }
        self.require_user(user_id).await?;

        self.store
            .add_group_member(group_id, user_id, role)
            .await
            .map_err(ServiceError::Persistence)?;

        info!(group_id, user_id, role = role.as_str(), "Group member added");
        Ok(GroupMember {
            user_id,
            email: None,
            role,
        })
    }

    /// Link a lock to a group. A group owner/admin may only link locks they
    /// own; system admins may link any lock.
    #[instrument(skip(self), fields(requester = requester.id))]
    pub async fn link_group_lock(
        &self,
        requester: &Identity,
        group_id: i64,
        lock_id: i64,
    ) -> Result<(), ServiceError> {
        self.require_group_manager(requester, group_id).await?;

        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::lock_not_found(lock_id))?;
        require_owner_or_admin(requester, &lock)?;

        self.store
            .link_group_lock(group_id, lock_id)
            .await
            .map_err(ServiceError::Persistence)?;

        info!(group_id, lock_id, "Lock linked to group");
        Ok(())
    }

    pub async fn list_group_members(
        &self,
        requester: &Identity,
        group_id: i64,
    ) -> Result<Vec<GroupMember>, ServiceError> {
        self.require_group_manager(requester, group_id).await?;
        self.store
            .list_group_members(group_id)
            .await
            .map_err(ServiceError::Persistence)
    }

    pub async fn list_my_groups(&self, requester: &Identity) -> Result<Vec<GroupSummary>, ServiceError> {
        self.store
            .list_groups_for_user(requester.id)
            .await
            .map_err(ServiceError::Persistence)
    }

    /// Returns the requester's own role in the group, if any.
    async fn require_group_manager(
        &self,
        requester: &Identity,
        group_id: i64,
    ) -> Result<Option<AccessRole>, ServiceError> {
        self.store
            .find_group(group_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::NotFound(format!("Group {group_id} not found")))?;

        let role = self
            .store
            .group_role(group_id, requester.id)
            .await
            .map_err(ServiceError::Persistence)?;

        if requester.is_admin() || role.is_some_and(|r| r.can_manage()) {
            Ok(role)
        } else {
            Err(ServiceError::Denied(format!(
                "only a group owner or admin may manage group {group_id}"
            )))
        }
    }

    async fn require_user(&self, user_id: i64) -> Result<(), ServiceError> {
        let exists = self
            .store
            .user_exists(user_id)
            .await
            .map_err(ServiceError::Persistence)?;
        if exists {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("User {user_id} not found")))
        }
    }
}
