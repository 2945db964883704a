pub mod model;
pub mod savings;
pub mod term;
