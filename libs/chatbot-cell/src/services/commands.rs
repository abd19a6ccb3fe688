//! Sentinel commands the assistant embeds in its replies.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::RoutingRequestType;

static CHECK_SCHEDULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CONSULTAR_AGENDA:([^\]]*)\]?").unwrap());
static CREATE_APPOINTMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CRIAR_AGENDAMENTO:([^\]]*)\]?").unwrap());
static REDIRECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[DIRECIONAR:([^\]]*)\]?").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    CheckSchedule {
        doctor: Option<String>,
        date: Option<NaiveDate>,
        raw: String,
    },
    CreateAppointment {
        details: String,
    },
    Redirect {
        request_type: RoutingRequestType,
    },
}

fn payload(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Finds the first command in `text`, checked in order: schedule lookup,
/// appointment creation, redirect.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    if let Some(raw) = payload(&CHECK_SCHEDULE, text) {
        let (doctor, date) = split_schedule_payload(&raw);
        return Some(BotCommand::CheckSchedule { doctor, date, raw });
    }

    if let Some(details) = payload(&CREATE_APPOINTMENT, text) {
        return Some(BotCommand::CreateAppointment { details });
    }

    if let Some(kind) = payload(&REDIRECT, text) {
        return Some(BotCommand::Redirect {
            request_type: RoutingRequestType::parse(&kind).unwrap_or_default(),
        });
    }

    None
}

/// `<doctor>, <date>`; the date is taken from the last comma-separated part.
fn split_schedule_payload(raw: &str) -> (Option<String>, Option<NaiveDate>) {
    let (doctor, date) = match raw.rsplit_once(',') {
        Some((doctor, date)) => (doctor.trim(), parse_date(date)),
        None => (raw.trim(), None),
    };
    let doctor = (!doctor.is_empty()).then(|| doctor.to_string());
    (doctor, date)
}

/// `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// The reply text with any command markers removed.
pub fn strip_commands(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in [&*CHECK_SCHEDULE, &*CREATE_APPOINTMENT, &*REDIRECT] {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}
