pub mod budget;
pub mod tiers;
