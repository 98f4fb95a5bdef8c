use log::info;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Account;
use crate::repository::{Collection, IdStrategy, decode};
use crate::storage::RecordStore;

/// Account collection, keyed for lookups by email.
pub struct AccountStore {
    records: Collection<Account>,
}

impl AccountStore {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        AccountStore {
            records: Collection::new(store, ids),
        }
    }

    /// Get all registered accounts
    pub fn list(&self) -> Result<Vec<Account>, StoreError> {
        self.records.list()
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.records.find(|acc| acc.email == email)
    }

    /// Register a new account
    ///
    /// Assigns the next id and stores the account.
    ///
    /// # Arguments
    /// * `account` - The account to store; its `id` is ignored
    ///
    /// # Returns
    /// * `Result<Account, StoreError>` - The stored account with its new id
    ///
    /// # Errors
    /// * `StoreError::DuplicateEmail` if the email is already registered
    /// * `StoreError::Invalid` if the email is not a valid address
    pub fn create(&self, account: Account) -> Result<Account, StoreError> {
        let email = account.email.clone();
        self.records.insert_checked(account, |existing| {
            if existing.iter().any(|acc| has_email(acc, &email)) {
                return Err(StoreError::DuplicateEmail);
            }
            Ok(())
        })
    }

    /// Merge `patch` into the account with this email. `Ok(None)` when no account matches.
    pub fn update(
        &self,
        email: &str,
        patch: &Map<String, Value>,
    ) -> Result<Option<Account>, StoreError> {
        self.records
            .update_checked(|acc| acc.email == email, patch, |updated, others| {
                if others.iter().any(|acc| has_email(acc, &updated.email)) {
                    return Err(StoreError::DuplicateEmail);
                }
                Ok(())
            })
    }

    /// Verify plaintext credentials
    ///
    /// # Returns
    /// * `Result<Option<Account>, StoreError>` - The account if email and password match
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .find_by_email(email)?
            .filter(|acc| acc.password == password))
    }

    /// Write the default admin and student accounts when no account exists yet.
    ///
    /// Returns whether anything was seeded.
    pub fn seed_defaults(&self) -> Result<bool, StoreError> {
        let seeded = self.records.seed(&default_accounts()?)?;
        if seeded {
            info!("Default accounts initialized");
        }
        Ok(seeded)
    }
}

/// Stored accounts are compared raw, so ones that no longer decode still hold their email.
fn has_email(stored: &Value, email: &str) -> bool {
    stored.get("email").and_then(Value::as_str) == Some(email)
}

/// The accounts a fresh installation starts with: three admins and one student.
pub fn default_accounts() -> Result<Vec<Account>, StoreError> {
    let seed = json!([
        {
            "id": 1,
            "email": "ramcharan123@gmail.com",
            "password": "1234",
            "userType": "admin",
            "fullName": "Ram Charan",
            "phoneNumber": "9876543210",
            "department": "Computer Science",
            "profileComplete": true
        },
        {
            "id": 2,
            "email": "anilpagadala583@gmail.com",
            "password": "1234",
            "userType": "admin",
            "fullName": "Anil Pagadala",
            "phoneNumber": "9876543211",
            "department": "Information Technology",
            "profileComplete": true
        },
        {
            "id": 3,
            "email": "rahul123@gmail.com",
            "password": "1234567",
            "userType": "admin",
            "fullName": "Rahul Kumar",
            "phoneNumber": "9876543212",
            "department": "Computer Science",
            "profileComplete": true
        },
        {
            "id": 4,
            "email": "2400030525@kluniversity.in",
            "password": "12345",
            "userType": "student",
            "fullName": "John Doe",
            "studentId": "2400030525",
            "phoneNumber": "9876543213",
            "department": "Computer Science",
            "academicYear": "3",
            "profileComplete": true
        }
    ]);

    let Value::Array(items) = seed else {
        return Ok(Vec::new());
    };
    items.into_iter().map(decode::<Account>).collect()
}
