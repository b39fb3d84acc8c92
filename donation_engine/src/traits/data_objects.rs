use serde::Serialize;

use crate::db_types::{Donation, DonationStatus};

/// A request to move an in-flight donation into a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub status: DonationStatus,
    pub receipt: Option<String>,
    pub result_desc: Option<String>,
}

impl Settlement {
    pub fn completed(receipt: Option<String>) -> Self {
        Self { status: DonationStatus::Completed, receipt, result_desc: None }
    }

    pub fn failed<S: Into<String>>(reason: S) -> Self {
        Self { status: DonationStatus::Failed, receipt: None, result_desc: Some(reason.into()) }
    }

    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        Self { status: DonationStatus::Cancelled, receipt: None, result_desc: Some(reason.into()) }
    }

    pub fn expired<S: Into<String>>(reason: S) -> Self {
        Self { status: DonationStatus::Expired, receipt: None, result_desc: Some(reason.into()) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum SettlementOutcome {
    /// This call moved the donation into its terminal state.
    Settled(Donation),
    /// The donation was already terminal. Nothing changed.
    NoOp(Donation),
}

impl SettlementOutcome {
    pub fn donation(&self) -> &Donation {
        match self {
            Self::Settled(d) | Self::NoOp(d) => d,
        }
    }

    pub fn into_donation(self) -> Donation {
        match self {
            Self::Settled(d) | Self::NoOp(d) => d,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}
