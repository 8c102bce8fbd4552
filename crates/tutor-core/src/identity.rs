//! Session Identity
//!
//! Issues and verifies opaque signed session tokens carrying a user id and
//! role, and hashes account passwords.
//!
//! Token layout: `<user-uuid>.<ROLE>.<expires-unix>.<hex hmac-sha256>`

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{MarketError, Result};
use crate::model::{Role, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Verified identity of a caller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub role: Role,
}

/// Signed bearer token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues and verifies session tokens with a shared secret
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    /// Issue a token valid for the configured TTL
    pub fn issue(&self, user_id: UserId, role: Role) -> SessionToken {
        self.issue_at(user_id, role, Utc::now())
    }

    fn issue_at(&self, user_id: UserId, role: Role, now: DateTime<Utc>) -> SessionToken {
        let expires = (now + self.ttl).timestamp();
        let payload = format!("{user_id}.{role}.{expires}");
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        SessionToken(format!("{payload}.{signature}"))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let (payload, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| MarketError::Auth("malformed token".into()))?;

        let signature =
            hex::decode(signature).map_err(|_| MarketError::Auth("malformed signature".into()))?;
        self.mac(payload)
            .verify_slice(&signature)
            .map_err(|_| MarketError::Auth("invalid signature".into()))?;

        let mut parts = payload.splitn(3, '.');
        let (Some(user_id), Some(role), Some(expires)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(MarketError::Auth("malformed token".into()));
        };

        let expires: i64 = expires
            .parse()
            .map_err(|_| MarketError::Auth("malformed expiry".into()))?;
        if Utc::now().timestamp() >= expires {
            return Err(MarketError::Auth("token expired".into()));
        }

        Ok(Claims {
            user_id: user_id
                .parse()
                .map_err(|_| MarketError::Auth("malformed user id".into()))?,
            role: Role::parse(role).ok_or_else(|| MarketError::Auth("unknown role".into()))?,
        })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(payload.as_bytes());
        mac
    }
}

// TODO: switch to a memory-hard KDF (argon2) before storing real user passwords.
/// Salted password digest stored as `salt$hex`
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

/// Check a password against a stored `salt$hex` digest
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(salt.as_bytes()) else {
        return false;
    };
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn digest(salt: &str, password: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(salt.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length")
    };
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
