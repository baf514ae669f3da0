//! Pure analytics over collected orders and enriched rows

pub mod abc;
pub mod aggregate;
pub mod attribution;
pub mod dead_stock;
pub mod rop;

pub use abc::*;
pub use aggregate::*;
pub use attribution::*;
pub use dead_stock::*;
pub use rop::*;
