//! Markdown renderers for Graph results, as sent back in chat replies.

use std::fmt::Write as _;

use crate::graph::models::{MailMessage, Presence, Team, User};

const NOT_AVAILABLE: &str = "N/A";

/// Render a profile card.
#[must_use]
pub fn format_profile(user: &User) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
    format!(
        "**Your Profile**\n\n\
         **Name:** {}\n\n\
         **Email:** {}\n\n\
         **Job Title:** {}\n\n\
         **Department:** {}\n\n\
         **Office:** {}",
        field(&user.display_name),
        field(&user.user_principal_name),
        field(&user.job_title),
        field(&user.department),
        field(&user.office_location),
    )
}

/// Render a numbered list of recent mail.
#[must_use]
pub fn format_messages(messages: &[MailMessage]) -> String {
    if messages.is_empty() {
        return "No recent emails found.".to_string();
    }

    let mut out = String::from("**Your Recent Emails**\n\n");
    for (i, message) in messages.iter().enumerate() {
        let subject = message.subject.as_deref().unwrap_or("No Subject");
        let sender = message.sender_name().unwrap_or("Unknown");
        let received = message
            .received_date_time
            .map_or_else(|| "Unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());

        let _ = write!(
            out,
            "**{}.** {subject}\n   **From:** {sender}\n   **Received:** {received}\n\n",
            i + 1
        );
    }
    out
}

/// Render joined teams.
#[must_use]
pub fn format_teams(teams: &[Team]) -> String {
    if teams.is_empty() {
        return "You have not joined any teams.".to_string();
    }

    let mut out = String::from("**Your Teams**\n\n");
    for team in teams {
        let name = team.display_name.as_deref().unwrap_or(&team.id);
        let _ = writeln!(out, "- **{name}**");
        if let Some(desc) = team.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "  {desc}");
        }
    }
    out
}

/// Render presence.
#[must_use]
pub fn format_presence(presence: &Presence) -> String {
    match presence.activity.as_deref() {
        Some(activity) if !activity.is_empty() => {
            format!("**Presence:** {} ({activity})", presence.availability)
        }
        _ => format!("**Presence:** {}", presence.availability),
    }
}
