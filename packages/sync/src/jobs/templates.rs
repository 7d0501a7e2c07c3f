//! Markdown bodies for synced articles

use crate::datto::Device;
use crate::freshservice::{Conversation, Requester, Ticket};
use chrono::{DateTime, Utc};
use serde_json::Value;

const NOT_AVAILABLE: &str = "N/A";
const TEXT_WIDTH: usize = 100;

pub fn status_name(status: Option<i64>) -> &'static str {
    match status {
        Some(2) => "Open",
        Some(3) => "Pending",
        Some(4) => "Resolved",
        Some(5) => "Closed",
        _ => NOT_AVAILABLE,
    }
}

pub fn priority_name(priority: Option<i64>) -> &'static str {
    match priority {
        Some(1) => "Low",
        Some(2) => "Medium",
        Some(3) => "High",
        Some(4) => "Urgent",
        _ => NOT_AVAILABLE,
    }
}

/// Replace characters that are unsafe in file names (and the path separator)
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Convert an HTML fragment from Freshservice into readable text
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "html conversion failed, keeping raw body");
            html.trim().to_string()
        }
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}

pub fn contact_markdown(requester: &Requester, name: &str, email: &str) -> String {
    format!(
        "# Contact Information for {name}\n\n\
         - **Email:** {email}\n\
         - **Title:** {title}\n\
         - **Work Phone:** {work}\n\
         - **Mobile Phone:** {mobile}\n\
         - **Time Zone:** {tz}\n",
        name = name,
        email = email,
        title = or_na(requester.job_title.as_deref()),
        work = or_na(requester.work_phone_number.as_deref()),
        mobile = or_na(requester.mobile_phone_number.as_deref()),
        tz = or_na(requester.time_zone.as_deref()),
    )
}

/// Article name of a ticket: `{id}_{sanitized subject}.md`
pub fn ticket_filename(ticket: &Ticket) -> String {
    format!("{}_{}.md", ticket.id, sanitize_filename(ticket_subject(ticket)))
}

fn ticket_subject(ticket: &Ticket) -> &str {
    ticket
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No Subject")
}

pub fn ticket_markdown(ticket: &Ticket, conversations: &[Conversation]) -> String {
    let description = ticket
        .description
        .as_deref()
        .map(html_to_text)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "> No description provided.".to_string());

    let conversation_md = if conversations.is_empty() {
        "> No conversations found.".to_string()
    } else {
        conversations
            .iter()
            .map(|conv| {
                let sender = or_na(conv.user.as_ref().and_then(|u| u.name.as_deref()));
                let timestamp = conv.created_at.as_deref().unwrap_or("No Timestamp");
                let body = conv
                    .body
                    .as_deref()
                    .map(html_to_text)
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| "> No content.".to_string());
                format!("### From: {} at `{}`\n\n{}\n\n---", sender, timestamp, body)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# Ticket #{id}: {subject}\n\n\
         - **Status:** {status}\n\
         - **Priority:** {priority}\n\
         - **Source:** {source}\n\
         - **Created At:** {created}\n\
         - **Agent:** {agent}\n\
         - **Group:** {group}\n\n\
         ## Description\n\n\
         {description}\n\n\
         ## Conversations\n\n\
         {conversations}\n",
        id = ticket.id,
        subject = ticket_subject(ticket),
        status = status_name(ticket.status),
        priority = priority_name(ticket.priority),
        source = or_na(ticket.source_name.as_deref()),
        created = or_na(ticket.created_at.as_deref()),
        agent = or_na(ticket.responder.as_ref().and_then(|r| r.name.as_deref())),
        group = or_na(ticket.group.as_ref().and_then(|g| g.name.as_deref())),
        description = description,
        conversations = conversation_md,
    )
}

/// Datto reports `lastSeen` as epoch milliseconds; strings pass through
fn last_seen(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn device_markdown(device: &Device) -> String {
    let hostname = or_na(device.hostname.as_deref());
    format!(
        "# Computer Information: {hostname}\n\n\
         - **Operating System:** {os}\n\
         - **Device Type:** {kind}\n\
         - **Internal IP:** {int_ip}\n\
         - **External IP:** {ext_ip}\n\
         - **Last Logged In User:** {user}\n\
         - **Status:** {status}\n\
         - **Last Seen:** {seen}\n",
        hostname = hostname,
        os = or_na(device.operating_system.as_deref()),
        kind = or_na(device.device_type.as_ref().and_then(|t| t.category.as_deref())),
        int_ip = or_na(device.int_ip_address.as_deref()),
        ext_ip = or_na(device.ext_ip_address.as_deref()),
        user = or_na(device.last_logged_in_user.as_deref()),
        status = if device.online.unwrap_or(false) { "Online" } else { "Offline" },
        seen = last_seen(device.last_seen.as_ref()),
    )
}
