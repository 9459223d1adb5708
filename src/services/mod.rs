pub mod ai;
pub mod identity;
