//! Mock Payment Provider
//!
//! For testing and local runs. Approves every charge unless told otherwise.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{PaymentMetadata, PaymentProvider, ProviderCharge, ProviderRefund};
use tutor_core::{MarketError, PaymentStatus, Result};

/// In-process provider with configurable declines and latency
pub struct MockPaymentProvider {
    decline_all: bool,

    /// Charges above this amount are declined
    limit: Option<Decimal>,

    /// Simulated network round trip
    latency: Option<Duration>,

    charges: AtomicU64,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProvider {
    /// Approves everything
    pub fn new() -> Self {
        Self {
            decline_all: false,
            limit: None,
            latency: None,
            charges: AtomicU64::new(0),
        }
    }

    /// Declines everything
    pub fn declining() -> Self {
        Self {
            decline_all: true,
            ..Self::new()
        }
    }

    /// Declines charges above `limit`
    #[must_use]
    pub fn with_limit(mut self, limit: Decimal) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sleeps before answering, to widen race windows in tests
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of charge attempts seen, approved or not
    pub fn charge_attempts(&self) -> u64 {
        self.charges.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn process_payment(
        &self,
        amount: Decimal,
        currency: &str,
        _metadata: &PaymentMetadata,
    ) -> Result<ProviderCharge> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if amount.is_sign_negative() {
            return Err(MarketError::validation("Charge amount cannot be negative"));
        }
        if self.decline_all {
            return Ok(ProviderCharge::declined("Card declined"));
        }
        if let Some(limit) = self.limit {
            if amount > limit {
                return Ok(ProviderCharge::declined(format!(
                    "Amount {amount} {currency} exceeds limit {limit}"
                )));
            }
        }

        Ok(ProviderCharge::paid(format!("mock_{}", Uuid::new_v4().simple())))
    }

    async fn refund(&self, external_ref: &str, _amount: Decimal) -> Result<ProviderRefund> {
        self.delay().await;

        if !external_ref.starts_with("mock_") {
            return Err(MarketError::Payment(format!(
                "Unknown charge reference {external_ref}"
            )));
        }

        Ok(ProviderRefund {
            success: true,
            external_ref: external_ref.to_string(),
            status: PaymentStatus::Refunded,
        })
    }

    fn name(&self) -> &str {
        if self.decline_all {
            "mock-decline"
        } else {
            "mock"
        }
    }
}
