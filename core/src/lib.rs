// orderflow/src/lib.rs

//! Orderflow: order lifecycle and notification orchestration for a retail storefront.
//!
//! - An Order Store (in-memory or PostgreSQL) holding orders, items and an append-only
//!   status ledger.
//! - A Status Transition Engine enforcing the payment and fulfilment state machines with
//!   compare-and-set writes.
//! - A Notification Dispatcher (email plus WhatsApp) that absorbs every channel failure.
//! - A Reminder Escalation Job that uses the ledger as its dedupe index.
//! - Remote action links for operators, optionally HMAC-signed.
//!
//! Multi-step write paths run as [`Pipeline`]s of named async steps over shared
//! [`ContextData`]. Best-effort side effects live in optional steps.

pub mod checkout;
pub mod error;
pub mod links;
pub mod model;
pub mod notify;
pub mod orderflow;
pub mod pipeline;
pub mod reminder;
pub mod remote;
pub mod settings;
pub mod store;
pub mod tracking;
pub mod transition;

pub use crate::checkout::{Checkout, CheckoutConfig, CheckoutReceipt, CheckoutRequest};
pub use crate::error::{OrderflowError, OrderflowResult, PipelineError, StoreError, StoreResult};
pub use crate::links::{ActionLinks, RemoteAction};
pub use crate::notify::{ChannelOutcome, DispatchReport, Dispatcher, NotificationKind, NotificationRequest};
pub use crate::orderflow::{OrderDetails, Orderflow, OrderflowBuilder};
pub use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineResult};
pub use crate::reminder::{ReminderJob, ReminderReport, ReminderThresholds};
pub use crate::remote::{ActionPage, ActionQuery, PageStatus, PageVariant, RemoteActions};
pub use crate::settings::OrderflowSettings;
pub use crate::store::{InMemoryOrderStore, OrderStore, PgOrderStore};
pub use crate::tracking::{TrackingLookup, TrackingView};
pub use crate::transition::{
  HookMode, TransitionEngine, TransitionHook, TransitionMode, TransitionOutcome, TransitionRequest,
};
