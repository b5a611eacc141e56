pub mod analyzer;
pub mod payment_ledger;
