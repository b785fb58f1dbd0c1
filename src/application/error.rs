use thiserror::Error;

use crate::domain::{FriendId, SettlementError, TransazioneId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Friend not found: {0}")]
    FriendNotFound(FriendId),

    #[error("Transaction not found: {0}")]
    TransazioneNotFound(TransazioneId),

    #[error("Invalid distance: {0}")]
    InvalidDistance(String),

    #[error("Trip rejected: {0}")]
    Trip(#[from] SettlementError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
