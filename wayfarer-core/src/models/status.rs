use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an itinerary request, persisted verbatim in lower case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Confirmed,
    /// Legacy value still present in stored rows. Read as an alias of
    /// `Confirmed`; the workflow never writes it.
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 7] = [
        RequestStatus::Pending,
        RequestStatus::Processing,
        RequestStatus::Confirmed,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
        RequestStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Completed => "completed",
        }
    }

    /// Collapses the `approved` alias onto `confirmed`.
    pub fn canonical(self) -> Self {
        match self {
            RequestStatus::Approved => RequestStatus::Confirmed,
            other => other,
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed
        )
    }

    /// Every stored spelling that means the same thing as `self`.
    pub fn persisted_forms(self) -> &'static [&'static str] {
        match self.canonical() {
            RequestStatus::Pending => &["pending"],
            RequestStatus::Processing => &["processing"],
            RequestStatus::Confirmed => &["confirmed", "approved"],
            RequestStatus::Rejected => &["rejected"],
            RequestStatus::Cancelled => &["cancelled"],
            RequestStatus::Completed => &["completed"],
            RequestStatus::Approved => &["confirmed", "approved"],
        }
    }

    /// Equality modulo the `approved` alias.
    pub fn same_as(self, other: RequestStatus) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "request status",
                value: s.to_string(),
            })
    }
}

/// Payment tracking for a request. Only the field is tracked; no settlement happens here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Partial,
    Overdue,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "partial" => Ok(PaymentStatus::Partial),
            "overdue" => Ok(PaymentStatus::Overdue),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownStatus {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}
