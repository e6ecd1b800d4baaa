//! Accounting and risk valuation for shares-based lending banks.
//!
//! Everything in here is a pure function of a decoded bank snapshot, an oracle
//! price and, where interest accrual matters, a caller-supplied timestamp.

pub mod constants;
pub mod error;
pub mod health;
pub mod i80f48;
pub mod state;
pub mod util;

pub use error::{LendpoolError, Result};
