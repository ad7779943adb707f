//! Permission evaluation
//!
//! Decisions combine role-derived permissions with per-object overrides:
//!
//! 1. a user-level override for the exact (permission, resource) wins,
//! 2. otherwise role-level overrides on any of the user's roles (deny wins),
//! 3. otherwise the role-derived permission set decides.
//!
//! Evaluation is read-only and never returns an error. Storage failures are
//! logged and treated as "not allowed".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::error::RbacResult;
use crate::models::Subject;
use crate::store::RbacStore;

#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn RbacStore>,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Role-based check. False for inactive or deleted users and unknown codes.
    pub async fn has_permission<U>(&self, user: &U, code: &str) -> bool
    where
        U: Subject + ?Sized,
    {
        if !is_eligible(user) {
            return false;
        }

        match self.role_permission(user.subject_id(), code).await {
            Ok(allowed) => {
                debug!("has_permission({}, {}) = {}", user.subject_id(), code, allowed);
                allowed
            }
            Err(e) => {
                error!(
                    "Permission check {} for user {} failed: {}",
                    code,
                    user.subject_id(),
                    e
                );
                false
            }
        }
    }

    /// Object-level override only; `None` means "no override, fall back to roles".
    ///
    /// Inactive or deleted users get `None` without a lookup. Use
    /// [`Self::has_object_permission`] for a decision that fails closed.
    pub async fn check_object_permission<U>(
        &self,
        user: &U,
        code: &str,
        resource_type: &str,
        resource_id: Uuid,
    ) -> Option<bool>
    where
        U: Subject + ?Sized,
    {
        if !is_eligible(user) {
            return None;
        }

        match self
            .object_override(user.subject_id(), code, resource_type, resource_id)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    "Object permission check {} on {}:{} for user {} failed: {}",
                    code,
                    resource_type,
                    resource_id,
                    user.subject_id(),
                    e
                );
                None
            }
        }
    }

    /// Override when one exists, otherwise the role-based answer.
    pub async fn has_object_permission<U>(
        &self,
        user: &U,
        code: &str,
        resource_type: &str,
        resource_id: Uuid,
    ) -> bool
    where
        U: Subject + ?Sized,
    {
        if !is_eligible(user) {
            return false;
        }

        match self
            .check_object_permission(user, code, resource_type, resource_id)
            .await
        {
            Some(decision) => decision,
            None => self.has_permission(user, code).await,
        }
    }

    /// Evaluate each code independently; the result has exactly the input codes as keys.
    pub async fn check_permissions<U, S>(&self, user: &U, codes: &[S]) -> HashMap<String, bool>
    where
        U: Subject + ?Sized,
        S: AsRef<str>,
    {
        let mut results = HashMap::with_capacity(codes.len());
        for code in codes {
            let code = code.as_ref();
            let allowed = self.has_permission(user, code).await;
            results.insert(code.to_string(), allowed);
        }
        results
    }

    async fn role_permission(&self, user_id: Uuid, code: &str) -> RbacResult<bool> {
        let Some(permission) = self.store.find_permission_by_code(code).await? else {
            debug!("Unknown permission code: {}", code);
            return Ok(false);
        };

        let role_ids = self.store.role_ids_for_user(user_id).await?;
        if role_ids.is_empty() {
            return Ok(false);
        }

        self.store
            .any_role_has_permission(&role_ids, permission.id)
            .await
    }

    async fn object_override(
        &self,
        user_id: Uuid,
        code: &str,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>> {
        let Some(permission) = self.store.find_permission_by_code(code).await? else {
            return Ok(None);
        };

        if let Some(decision) = self
            .store
            .user_object_override(user_id, permission.id, resource_type, resource_id)
            .await?
        {
            return Ok(Some(decision));
        }

        let role_ids = self.store.role_ids_for_user(user_id).await?;
        if role_ids.is_empty() {
            return Ok(None);
        }

        self.store
            .role_object_override(&role_ids, permission.id, resource_type, resource_id)
            .await
    }
}

fn is_eligible<U: Subject + ?Sized>(user: &U) -> bool {
    user.is_active() && !user.is_deleted()
}
