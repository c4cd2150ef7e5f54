//! Errors raised while parsing shared types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("account address must not be empty")]
    Empty,

    #[error("account address contains whitespace: {0:?}")]
    Whitespace(String),
}
