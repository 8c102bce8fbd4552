//! Accounts
//!
//! Registration, login and bearer-token authentication.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use tutor_core::directory;
use tutor_core::identity::{hash_password, verify_password};
use tutor_core::{
    Claims, MarketError, MemoryStore, Professor, Reader, Result, Role, SessionToken, Student,
    TokenSigner, User, UserId,
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Sign-up request
#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

pub struct AccountService {
    store: Arc<MemoryStore>,
    signer: TokenSigner,
}

impl AccountService {
    pub fn new(store: Arc<MemoryStore>, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Create a user together with its empty role profile
    pub fn register(&self, registration: Registration) -> Result<User> {
        let email = registration.email.trim().to_string();
        let name = registration.name.trim().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(MarketError::validation("A valid email is required"));
        }
        if name.is_empty() {
            return Err(MarketError::validation("Name is required"));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut tx = self.store.begin();
        if directory::user_by_email(&tx, &email)?.is_some() {
            return Err(MarketError::conflict("Email is already registered"));
        }

        let user = User {
            id: UserId::new(),
            email,
            name,
            role: registration.role,
            password_hash: hash_password(&registration.password),
            created_at: Utc::now(),
        };
        tx.put(user.clone());
        match user.role {
            Role::Professor => tx.put(Professor::new(user.id)),
            Role::Student => tx.put(Student::new(user.id)),
        }
        tx.commit()?;

        tracing::info!(user_id = %user.id, role = %user.role, "Registered account");
        Ok(user)
    }

    /// Exchange credentials for a session token
    pub fn login(&self, email: &str, password: &str) -> Result<(SessionToken, User)> {
        let user = directory::user_by_email(&*self.store, email.trim())?
            .filter(|user| verify_password(password, &user.password_hash))
            .ok_or_else(|| {
                tracing::debug!("Rejected login");
                MarketError::Auth("Invalid email or password".into())
            })?;

        let token = self.signer.issue(user.id, user.role);
        tracing::info!(user_id = %user.id, "Issued session token");
        Ok((token, user))
    }

    /// Verify a bearer token and that its account still exists
    pub fn authenticate(&self, token: &str) -> Result<Claims> {
        let claims = self.signer.verify(token)?;
        if self.store.get::<User>(claims.user_id)?.is_none() {
            return Err(MarketError::Auth("Account no longer exists".into()));
        }
        Ok(claims)
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.store
            .get::<User>(id)?
            .ok_or_else(|| MarketError::not_found("User not found"))
    }
}
