//! Application State

use std::sync::Arc;

use tutor_catalog::{AccountService, CourseService, MessagingService, ProfileService, ReviewService};
use tutor_core::{MemoryStore, TokenSigner};
use tutor_payments::{MockPaymentProvider, PaymentProvider, PaymentService, PaymentSettings};
use tutor_scheduling::{AvailabilityLedger, BookingService};

use crate::config::{ProviderKind, ServerConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Backing store, used directly for profile lookups
    pub store: Arc<MemoryStore>,

    pub accounts: Arc<AccountService>,
    pub profiles: Arc<ProfileService>,
    pub availability: Arc<AvailabilityLedger>,
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub courses: Arc<CourseService>,
    pub reviews: Arc<ReviewService>,
    pub messaging: Arc<MessagingService>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::with_lock_timeout(config.lock_timeout));
        let provider: Arc<dyn PaymentProvider> = match config.provider {
            ProviderKind::Mock => Arc::new(MockPaymentProvider::new()),
            ProviderKind::MockDecline => Arc::new(MockPaymentProvider::declining()),
        };
        Self::new(
            store,
            TokenSigner::new(&config.token_secret, config.token_ttl),
            provider,
            config.payments.clone(),
        )
    }

    pub fn new(
        store: Arc<MemoryStore>,
        signer: TokenSigner,
        provider: Arc<dyn PaymentProvider>,
        settings: PaymentSettings,
    ) -> Self {
        let payments = Arc::new(PaymentService::new(store.clone(), provider, settings));
        Self {
            accounts: Arc::new(AccountService::new(store.clone(), signer)),
            profiles: Arc::new(ProfileService::new(store.clone())),
            availability: Arc::new(AvailabilityLedger::new(store.clone())),
            bookings: Arc::new(BookingService::new(store.clone())),
            courses: Arc::new(CourseService::new(store.clone())),
            reviews: Arc::new(ReviewService::new(store.clone(), payments.clone())),
            messaging: Arc::new(MessagingService::new(store.clone())),
            payments,
            store,
        }
    }
}
