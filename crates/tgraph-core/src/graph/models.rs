//! Data models for Microsoft Graph responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user (`GET /me`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Object ID.
    #[serde(default)]
    pub id: String,
    /// Display name.
    pub display_name: Option<String>,
    /// User principal name (sign-in address).
    pub user_principal_name: Option<String>,
    /// Primary SMTP address.
    pub mail: Option<String>,
    /// Job title.
    pub job_title: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Office location.
    pub office_location: Option<String>,
}

/// A team the user has joined (`GET /me/joinedTeams`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Team ID.
    pub id: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// A mail message (`GET /me/messages`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    /// Message ID.
    #[serde(default)]
    pub id: String,
    /// Subject line.
    pub subject: Option<String>,
    /// Sender.
    pub from: Option<Recipient>,
    /// When the message was received.
    pub received_date_time: Option<DateTime<Utc>>,
}

impl MailMessage {
    /// Display name of the sender, if present.
    #[must_use]
    pub fn sender_name(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|r| r.email_address.as_ref())
            .and_then(|a| a.name.as_deref())
    }
}

/// A message sender or recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Address details.
    pub email_address: Option<EmailAddress>,
}

/// Name and address pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name.
    pub name: Option<String>,
    /// SMTP address.
    pub address: Option<String>,
}

/// Availability reported by `GET /me/presence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    /// Available.
    Available,
    /// Available but idle.
    AvailableIdle,
    /// Away.
    Away,
    /// Be right back.
    BeRightBack,
    /// Busy.
    Busy,
    /// Busy but idle.
    BusyIdle,
    /// Do not disturb.
    DoNotDisturb,
    /// Offline.
    Offline,
    /// Anything else, including `PresenceUnknown`.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Available => "Available",
            Self::AvailableIdle => "Available (idle)",
            Self::Away => "Away",
            Self::BeRightBack => "Be right back",
            Self::Busy => "Busy",
            Self::BusyIdle => "Busy (idle)",
            Self::DoNotDisturb => "Do not disturb",
            Self::Offline => "Offline",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Presence of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    /// User object ID.
    #[serde(default)]
    pub id: String,
    /// Availability.
    pub availability: PresenceStatus,
    /// Current activity (e.g. `InACall`).
    pub activity: Option<String>,
}

/// OData collection wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}
