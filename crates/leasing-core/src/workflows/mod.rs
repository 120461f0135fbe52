pub mod inventory;
pub(crate) mod normalizer;
pub mod pricing;
pub mod reconciliation;
