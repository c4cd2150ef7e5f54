//! Fundamental types for the staking pool.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account addresses, timestamps, access-control roles, and the fixed-point
//! arithmetic used by the reward accumulator and the share ledger.

pub mod address;
pub mod error;
pub mod math;
pub mod role;
pub mod time;

pub use address::AccountAddress;
pub use error::AddressError;
pub use math::{mul_div_ceil, mul_div_floor, U256, SCALE};
pub use role::Role;
pub use time::Timestamp;
