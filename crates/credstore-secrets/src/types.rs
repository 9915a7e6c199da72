//! Core types for the credential store.
//!
//! [`CredentialAttributes`] name a slot; [`Credentials`] are what the slot
//! holds. The store keys records by service name only, so two attributes with
//! the same service and different users address the same slot.

use credstore_core::SecretString;

/// Logical identifier of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialAttributes {
    /// Service the secret belongs to. This is the storage key.
    pub service_name: String,

    /// Expected user. When set, lookups only match a record for this user.
    pub user_name: Option<String>,

    /// Keep the secret in process memory only; never write it to disk.
    pub is_memory_only: bool,
}

impl CredentialAttributes {
    /// Attributes for `service_name` with no user.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            user_name: None,
            is_memory_only: false,
        }
    }

    /// Set the expected user.
    pub fn with_user(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Mark the attributes memory-only.
    pub fn memory_only(mut self) -> Self {
        self.is_memory_only = true;
        self
    }
}

/// A username/secret pair.
///
/// `Debug` shows the user name but never the secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: Option<String>,
    pub secret: Option<SecretString>,
}

impl Credentials {
    pub fn new(user_name: Option<String>, secret: Option<SecretString>) -> Self {
        Self { user_name, secret }
    }

    /// Credentials with a user name and a password.
    pub fn with_password(user_name: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            secret: Some(password.into()),
        }
    }

    /// The password, if any.
    pub fn password(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    /// Neither a user name nor a password. Such a record counts as cleared.
    pub fn is_empty(&self) -> bool {
        self.user_name.as_deref().map_or(true, str::is_empty)
            && self.secret.as_ref().map_or(true, SecretString::is_empty)
    }
}
