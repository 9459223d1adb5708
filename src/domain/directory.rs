use crate::domain::models::{
    EmployeeClass, NewUser, SalariedProfile, User, UserRole, DELETED_USER_LABEL,
};
use crate::error::ReviewError;
use crate::services::identity::IdentityDirectory;
use crate::store::ReviewStore;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

fn required(field: &str, value: &str) -> Result<String, ReviewError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReviewError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn required_opt(field: &str, value: Option<&str>) -> Result<String, ReviewError> {
    required(field, value.unwrap_or_default())
}

/// Registers a user: identity first, then the directory record. If the record cannot
/// be written the identity is removed again.
pub async fn register_user(
    store: &dyn ReviewStore,
    identity: &dyn IdentityDirectory,
    new_user: NewUser,
    role: UserRole,
) -> Result<User, ReviewError> {
    let login_handle = required("login_handle", &new_user.login_handle)?;
    let display_name = required("display_name", &new_user.display_name)?;
    let employee_id = required("employee_id", &new_user.employee_id)?;
    let job_position = required("job_position", &new_user.job_position)?;
    if new_user.secret.trim().is_empty() {
        return Err(ReviewError::validation("secret", "must not be empty"));
    }

    let salaried_profile = match new_user.class {
        EmployeeClass::Salaried => Some(SalariedProfile {
            organization: required_opt("organization", new_user.organization.as_deref())?,
            job_level: required_opt("job_level", new_user.job_level.as_deref())?,
        }),
        EmployeeClass::Hourly => None,
    };

    if store.find_user_by_login(&login_handle).await?.is_some() {
        tracing::info!("Registration rejected, login {:?} already taken", login_handle);
        return Err(ReviewError::LoginTaken);
    }

    let id = identity
        .create_identity(&login_handle, &new_user.secret, &display_name)
        .await?;

    let user = User {
        id,
        display_name,
        login_handle,
        class: new_user.class,
        role,
        employee_id,
        job_position,
        salaried_profile,
        app_feedback_submitted: false,
        created_at: Utc::now(),
    };

    if let Err(err) = store.insert_user(&user).await {
        tracing::error!("User record write failed for {}, removing identity: {}", id, err);
        if let Err(cleanup) = identity.delete_identity(id).await {
            tracing::error!("Failed to remove orphaned identity {}: {}", id, cleanup);
        }
        return Err(err);
    }

    tracing::info!(
        "Registered {} user {} ({:?})",
        user.class.as_str(),
        user.id,
        user.role
    );
    Ok(user)
}

/// Resolves credentials to a user. `Ok(None)` covers unknown logins, wrong secrets
/// and identities without a directory record.
pub async fn sign_in(
    store: &dyn ReviewStore,
    identity: &dyn IdentityDirectory,
    login_handle: &str,
    secret: &str,
) -> Result<Option<User>, ReviewError> {
    let login_handle = login_handle.trim();
    let Some(id) = identity.verify_secret(login_handle, secret).await? else {
        return Ok(None);
    };
    let user = store.find_user(id).await?;
    if user.is_none() {
        tracing::warn!("Identity {} has no user record", id);
    }
    Ok(user)
}

pub async fn delete_user(
    store: &dyn ReviewStore,
    identity: &dyn IdentityDirectory,
    id: Uuid,
) -> Result<(), ReviewError> {
    store.delete_user(id).await?;
    identity.delete_identity(id).await?;
    tracing::info!("Deleted user {}", id);
    Ok(())
}

/// Snapshot of all users for resolving ids to names.
pub struct Directory {
    users: HashMap<Uuid, User>,
}

impl Directory {
    pub async fn load(store: &dyn ReviewStore) -> Result<Self, ReviewError> {
        let users = store.list_users().await?;
        Ok(Self::from_users(users))
    }

    pub fn from_users(users: Vec<User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn name_of(&self, id: Uuid) -> String {
        self.users
            .get(&id)
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| DELETED_USER_LABEL.to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::services::identity::MemoryIdentityDirectory;
    use crate::store::MemoryStore;

    pub fn new_user(login: &str, class: EmployeeClass) -> NewUser {
        NewUser {
            login_handle: login.to_string(),
            secret: "RN-0001".to_string(),
            display_name: login.to_string(),
            employee_id: format!("EMP-{login}"),
            job_position: "Staff".to_string(),
            class,
            organization: Some("Finance".to_string()),
            job_level: Some("Senior".to_string()),
        }
    }

    pub async fn register(
        store: &MemoryStore,
        identity: &MemoryIdentityDirectory,
        login: &str,
        class: EmployeeClass,
    ) -> User {
        register_user(store, identity, new_user(login, class), UserRole::Employee)
            .await
            .unwrap()
    }
}
