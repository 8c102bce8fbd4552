//! Server Configuration
//!
//! Read once at startup from the environment (and `.env`, if present).

use std::time::Duration;

use rust_decimal::Decimal;

use tutor_core::{MarketError, Result};
use tutor_payments::PaymentSettings;

/// Which payment provider to wire in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Approves every charge
    Mock,
    /// Declines every charge
    MockDecline,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Some(ProviderKind::Mock),
            "mock-decline" => Some(ProviderKind::MockDecline),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub token_secret: String,
    pub token_ttl: chrono::Duration,
    pub lock_timeout: Duration,
    pub payments: PaymentSettings,
    pub provider: ProviderKind,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token_secret = var("TOKEN_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| MarketError::Config("TOKEN_SECRET not set".into()))?;

        let token_ttl_hours: i64 = parse_or(&var, "TOKEN_TTL_HOURS", 24)?;
        let lock_timeout_ms: u64 = parse_or(&var, "STORE_LOCK_TIMEOUT_MS", 5000)?;
        let defaults = PaymentSettings::default();
        let default_session_amount: Decimal =
            parse_or(&var, "DEFAULT_SESSION_PRICE", defaults.default_session_amount)?;
        if default_session_amount.is_sign_negative() {
            return Err(MarketError::Config("DEFAULT_SESSION_PRICE cannot be negative".into()));
        }

        let provider = match var("PAYMENT_PROVIDER") {
            Some(name) => ProviderKind::parse(&name)
                .ok_or_else(|| MarketError::Config(format!("unknown PAYMENT_PROVIDER `{name}`")))?,
            None => ProviderKind::Mock,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            token_secret,
            token_ttl: chrono::Duration::hours(token_ttl_hours),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            payments: PaymentSettings {
                currency: var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
                default_session_amount,
            },
            provider,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MarketError::Config(format!("{key} is not valid: `{raw}`"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TOKEN_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.token_ttl, chrono::Duration::hours(24));
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.payments.currency, "USD");
        assert_eq!(config.payments.default_session_amount, Decimal::new(5000, 2));
        assert_eq!(config.provider, ProviderKind::Mock);
    }

    #[test]
    fn test_secret_required() {
        assert!(matches!(load(&[]), Err(MarketError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TOKEN_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("STORE_LOCK_TIMEOUT_MS", "250"),
            ("PAYMENT_CURRENCY", "EUR"),
            ("DEFAULT_SESSION_PRICE", "35.5"),
            ("PAYMENT_PROVIDER", "mock-decline"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.payments.currency, "EUR");
        assert_eq!(config.payments.default_session_amount, Decimal::new(355, 1));
        assert_eq!(config.provider, ProviderKind::MockDecline);
    }

    #[test]
    fn test_bad_values() {
        assert!(load(&[("TOKEN_SECRET", "x"), ("TOKEN_TTL_HOURS", "soon")]).is_err());
        assert!(load(&[("TOKEN_SECRET", "x"), ("PAYMENT_PROVIDER", "stripe")]).is_err());
        assert!(load(&[("TOKEN_SECRET", "x"), ("DEFAULT_SESSION_PRICE", "-1")]).is_err());
    }
}
