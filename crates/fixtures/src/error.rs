//! Error types for fixture parsing

use thiserror::Error;

pub type FixtureResult<T> = std::result::Result<T, FixtureError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FixtureError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown area: {0}")]
    UnknownArea(String),

    #[error("Unknown discount type: {0}")]
    UnknownDiscountType(String),

    #[error("Unknown test card: {0}")]
    UnknownCard(String),

    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("Invalid discount value '{value}': {reason}")]
    InvalidDiscountValue { value: String, reason: String },

    #[error("No seed user for role {0}")]
    NoUserForRole(String),
}
