pub mod directory;
pub mod feedback;
pub mod ledger;
pub mod models;
pub mod pending;
pub mod questions;
pub mod submissions;
