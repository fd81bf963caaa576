//! Input/output helpers.
//!
//! - binary LTC tables (`table`)
//! - JSON fit records (`record`)
//! - the output directory tying both to model ids (`store`)

pub mod record;
pub mod store;
pub mod table;

pub use record::*;
pub use store::*;
pub use table::*;
