use serde::{Deserialize, Serialize};

use crate::normalize::{de_id, de_opt_amount, de_opt_id, display_name, non_blank};

/// A donation as reported by the fundraising site, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDonation {
    pub id: String,
    pub created_at: String,
    pub name: Option<String>,
    pub message: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub has_more: bool,
    pub total_known: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub records: Vec<SourceDonation>,
    pub continuation: Continuation,
}

/// A donation as stored by the ledger. Entries typed in by hand have no
/// `external_id`, so everything except `id` is lenient.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerDonation {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub amount: Option<f64>,
}

/// Body of `POST <ledger>`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewDonation {
    pub timestamp: String,
    pub name: String,
    pub message: Option<String>,
    pub amount: f64,
    pub external_id: String,
}

impl NewDonation {
    pub fn from_source(donation: &SourceDonation) -> Self {
        Self {
            timestamp: donation.created_at.clone(),
            name: display_name(donation.name.as_deref()).to_string(),
            message: non_blank(donation.message.clone()),
            amount: donation.amount,
            external_id: donation.id.clone(),
        }
    }
}

/// Body of `PATCH <ledger>/<id>`. Only the message is ever amended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessagePatch {
    pub message: String,
}
