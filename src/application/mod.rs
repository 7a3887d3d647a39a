// Application layer: the rental desk a front end talks to.
// Owns the single ledger instance, checks caller-side rules the ledger
// leaves open (duplicate plates and licenses) and persists every change.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
