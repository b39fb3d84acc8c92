use donate_common::PhoneNumberError;
use thiserror::Error;

use crate::{
    db_types::DonationStatus,
    helpers::ValidationError,
    traits::LedgerError,
};

#[derive(Debug, Clone, Error)]
pub enum DonationFlowError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("Project {0} is not accepting donations")]
    ProjectNotActive(i64),
    #[error("Donation {0} does not exist")]
    DonationNotFound(i64),
    #[error("The checkout request id does not belong to donation {0}")]
    CheckoutMismatch(i64),
    #[error("Donation {id} is already {status}")]
    AlreadySettled { id: i64, status: DonationStatus },
    #[error("{0} is not a status a donation can be moved to")]
    InvalidTargetStatus(DonationStatus),
    #[error("The payment request for donation {donation_id} failed. {reason}")]
    ProviderFailure { donation_id: i64, reason: String },
    #[error("{0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for DonationFlowError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DonationNotFound(id) => Self::DonationNotFound(id),
            LedgerError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            e => Self::Ledger(e),
        }
    }
}

impl From<PhoneNumberError> for DonationFlowError {
    fn from(e: PhoneNumberError) -> Self {
        Self::Validation(ValidationError::InvalidPhone(e))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProjectApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("No fields to update were provided")]
    EmptyUpdate,
    #[error("{0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for ProjectApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            LedgerError::ModificationNoOp => Self::EmptyUpdate,
            e => Self::Ledger(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StatsApiError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}
