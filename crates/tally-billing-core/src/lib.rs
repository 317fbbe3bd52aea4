//! Tally Billing Core - Quota enforcement and usage accounting
//!
//! Decides whether a tenant's plan permits one more unit of a resource this
//! billing period, and keeps per-period usage counters up to date from a
//! bounded background queue.
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_billing_core::{BillingConfig, QuotaGate, UsageAccountant, UsageJob, UsageRecorder};
//!
//! let quota = QuotaGate::new(&stores);
//! let accountant = UsageAccountant::new(&stores);
//! let (recorder, handle) = UsageRecorder::spawn(accountant, &BillingConfig::default());
//!
//! let subscription = quota.active_subscription_for(tenant_id).await?;
//! let check = quota.check_subscription(&subscription, ResourceType::QrCode).await?;
//! if check.allowed {
//!     // ... create the QR code ...
//!     recorder.record(UsageJob::created(subscription.id, ResourceType::QrCode));
//! }
//! ```

pub mod config;
pub mod error;
pub mod quota;
pub mod recorder;
pub mod usage;

pub use config::BillingConfig;
pub use error::BillingError;
pub use quota::QuotaGate;
pub use recorder::{UsageJob, UsageRecorder, UsageRecorderHandle};
pub use usage::UsageAccountant;
