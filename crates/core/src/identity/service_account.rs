//! Service-account CRUD (spec.md §4.4). Identities are metadata rows; no
//! actual authentication happens anywhere in this core.

use serde::Serialize;

use crate::error::ApiError;
use crate::ids;
use crate::kv::{ServiceAccount, Store};
use crate::validation;

pub fn email_for(project_id: &str, account_id: &str) -> String {
    format!("{account_id}@{project_id}.iam.gserviceaccount.com")
}

/// Validates `account_id`, forms the email, and persists a fresh row with a
/// random 21-digit `uniqueId` (spec.md §4.4 "Service account").
pub fn create(
    store: &Store,
    project_id: &str,
    account_id: &str,
    display_name: Option<&str>,
    description: Option<&str>,
) -> Result<ServiceAccount, ApiError> {
    validation::validate_service_account_id(account_id)?;
    let email = email_for(project_id, account_id);

    let _txn = store.row_locks.begin([email.clone()]);
    if store.service_accounts.contains_key(&email) {
        return Err(ApiError::Conflict(format!("service account '{email}' already exists")));
    }

    let account = ServiceAccount {
        email: email.clone(),
        project_id: project_id.to_string(),
        unique_id: ids::new_service_account_unique_id(),
        display_name: display_name.unwrap_or_default().to_string(),
        description: description.unwrap_or_default().to_string(),
        disabled: false,
    };
    store.service_accounts.insert(email, account.clone());
    Ok(account)
}

pub fn get(store: &Store, email: &str) -> Result<ServiceAccount, ApiError> {
    store
        .service_accounts
        .get(email)
        .map(|a| a.clone())
        .ok_or_else(|| ApiError::NotFound(format!("service account '{email}' not found")))
}

pub fn list(store: &Store, project_id: &str) -> Vec<ServiceAccount> {
    store
        .service_accounts
        .iter()
        .filter(|a| a.project_id == project_id)
        .map(|a| a.clone())
        .collect()
}

fn set_disabled(store: &Store, email: &str, disabled: bool) -> Result<ServiceAccount, ApiError> {
    let mut entry = store
        .service_accounts
        .get_mut(email)
        .ok_or_else(|| ApiError::NotFound(format!("service account '{email}' not found")))?;
    entry.disabled = disabled;
    Ok(entry.clone())
}

pub fn enable(store: &Store, email: &str) -> Result<ServiceAccount, ApiError> {
    set_disabled(store, email, false)
}

pub fn disable(store: &Store, email: &str) -> Result<ServiceAccount, ApiError> {
    set_disabled(store, email, true)
}

/// Removes the account row and cascades to every key it owns (spec.md §3
/// ServiceAccount ownership rule).
pub fn delete(store: &Store, email: &str) -> Result<(), ApiError> {
    store
        .service_accounts
        .remove(email)
        .ok_or_else(|| ApiError::NotFound(format!("service account '{email}' not found")))?;

    let dead_keys: Vec<String> = store
        .service_account_keys
        .iter()
        .filter(|k| k.service_account_email == email)
        .map(|k| k.id.clone())
        .collect();
    for key_id in dead_keys {
        store.service_account_keys.remove(&key_id);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ServiceAccountResponse {
    pub name: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub description: String,
    pub disabled: bool,
}

pub fn to_response(account: &ServiceAccount) -> ServiceAccountResponse {
    ServiceAccountResponse {
        name: format!("projects/{}/serviceAccounts/{}", account.project_id, account.email),
        project_id: account.project_id.clone(),
        unique_id: account.unique_id.clone(),
        email: account.email.clone(),
        display_name: account.display_name.clone(),
        description: account.description.clone(),
        disabled: account.disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_forms_email_and_assigns_unique_id() {
        let store = Store::new();
        let account = create(&store, "p1", "deployer", Some("Deployer"), None).unwrap();
        assert_eq!(account.email, "deployer@p1.iam.gserviceaccount.com");
        assert_eq!(account.unique_id.len(), 21);
        assert!(!account.disabled);
    }

    #[test]
    fn duplicate_account_id_conflicts() {
        let store = Store::new();
        create(&store, "p1", "deployer", None, None).unwrap();
        assert!(matches!(create(&store, "p1", "deployer", None, None), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn disable_then_enable_round_trips() {
        let store = Store::new();
        let account = create(&store, "p1", "deployer", None, None).unwrap();
        disable(&store, &account.email).unwrap();
        assert!(get(&store, &account.email).unwrap().disabled);
        enable(&store, &account.email).unwrap();
        assert!(!get(&store, &account.email).unwrap().disabled);
    }

    #[test]
    fn delete_cascades_keys() {
        let store = Store::new();
        let account = create(&store, "p1", "deployer", None, None).unwrap();
        crate::identity::key::create(&store, "p1", &account.email).unwrap();
        assert_eq!(crate::identity::key::list(&store, &account.email).len(), 1);

        delete(&store, &account.email).unwrap();
        assert!(get(&store, &account.email).is_err());
        assert_eq!(crate::identity::key::list(&store, &account.email).len(), 0);
    }
}
