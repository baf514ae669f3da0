//! Domain models for Shelfwise

mod inventory;
mod order;
mod report;
mod variant;

pub use inventory::*;
pub use order::*;
pub use report::*;
pub use variant::*;
