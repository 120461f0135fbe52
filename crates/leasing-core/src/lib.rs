//! Lease offer scoring and dealer inventory reconciliation.
//!
//! The `workflows::pricing` module holds the pure Offer Selector and Lease Score Calculator that
//! every caller shares. `workflows::reconciliation` turns an AI-extracted batch into a reviewed
//! change set and applies the approved subset against an [`InventoryStore`].
//!
//! [`InventoryStore`]: workflows::reconciliation::InventoryStore

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
