pub mod fx;
pub mod policy;
