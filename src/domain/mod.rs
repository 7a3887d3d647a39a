mod car;
mod customer;
mod error;
mod ledger;
mod money;

pub use car::*;
pub use customer::*;
pub use error::*;
pub use ledger::*;
pub use money::*;
