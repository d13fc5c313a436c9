//! Display strings for messages and connectivity.
//!
//! Everything here is a pure function of its inputs and returns plain text;
//! styling is the renderer's business.

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::backend::SourceRef;
use crate::health::ConnectivityStatus;
use crate::message::{ChatMessage, ChatRole};

/// Badge colour for a connectivity status, independent of any UI toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Gray,
    Green,
    Yellow,
    Red,
}

/// Everything a renderer needs to draw one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub role_label: &'static str,
    pub content: String,
    pub time_label: String,
    pub confidence_label: Option<String>,
    pub sources_label: Option<String>,
    pub latency_label: Option<String>,
    pub is_user: bool,
    pub is_error: bool,
}

pub fn view(message: &ChatMessage) -> MessageView {
    MessageView {
        role_label: role_label(message.role),
        content: message.content.clone(),
        time_label: time_label(&message.created_at),
        confidence_label: message.confidence.map(confidence_label),
        sources_label: sources_label(&message.sources),
        latency_label: message.latency.map(latency_label),
        is_user: message.role == ChatRole::User,
        is_error: message.is_error,
    }
}

pub fn role_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "Vous",
        ChatRole::Assistant => "Assistant ANDF",
    }
}

/// Two-digit hour and minute, as a French locale shows it
pub fn time_label(created_at: &DateTime<Local>) -> String {
    created_at.format("%H:%M").to_string()
}

/// `0.87` becomes `"87%"`
pub fn confidence_label(confidence: f64) -> String {
    format!("{}%", (confidence * 100.0).round() as i64)
}

pub fn sources_label(sources: &[SourceRef]) -> Option<String> {
    if sources.is_empty() {
        None
    } else {
        Some(format!("Sources : {} document(s) ANDF", sources.len()))
    }
}

pub fn latency_label(latency: Duration) -> String {
    let millis = latency.as_millis();
    if millis < 1000 {
        format!("{} ms", millis)
    } else {
        let tenths = (millis + 50) / 100;
        format!("{},{} s", tenths / 10, tenths % 10)
    }
}

pub fn connectivity_label(status: ConnectivityStatus) -> &'static str {
    match status {
        ConnectivityStatus::Unknown => "Vérification…",
        ConnectivityStatus::Connected => "En ligne",
        ConnectivityStatus::Degraded => "Erreur",
        ConnectivityStatus::Unreachable => "Hors ligne",
    }
}

pub fn connectivity_color(status: ConnectivityStatus) -> StatusColor {
    match status {
        ConnectivityStatus::Unknown => StatusColor::Gray,
        ConnectivityStatus::Connected => StatusColor::Green,
        ConnectivityStatus::Degraded => StatusColor::Yellow,
        ConnectivityStatus::Unreachable => StatusColor::Red,
    }
}

/// Typing indicator while an exchange is outstanding; `frame` animates the dots
pub fn pending_label(frame: u8) -> String {
    let dots = ".".repeat((frame % 3) as usize + 1);
    format!("Assistant en train d'analyser{}", dots)
}
