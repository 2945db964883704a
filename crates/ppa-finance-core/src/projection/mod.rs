pub mod ledger;
pub mod unlevered;
