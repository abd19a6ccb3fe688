//! Display helpers for patient-facing text (pt-BR conventions).

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDate};

/// `1234.5` → `R$ 1.234,50`.
pub fn format_currency(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*digit);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}R$ {},{}", sign, grouped, cents)
}

pub fn format_datetime(value: Option<DateTime<FixedOffset>>) -> String {
    match value {
        Some(dt) => dt.format("%d/%m/%Y %H:%M").to_string(),
        None => "Data não informada".to_string(),
    }
}

pub fn format_date(value: Option<NaiveDate>) -> String {
    match value {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => "Data não informada".to_string(),
    }
}

/// Brazilian display format for 10 or 11 digit numbers; anything else is returned as given.
pub fn format_phone_number(phone: &str) -> String {
    if phone.trim().is_empty() {
        return "Telefone não informado".to_string();
    }

    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => phone.to_string(),
    }
}

/// Cuts `text` to at most `max_length` characters, ending with `suffix`.
pub fn truncate_text(text: &str, max_length: usize, suffix: &str) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(suffix.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(suffix);
    truncated
}

pub fn format_list<T: Display>(items: &[T], separator: &str, max_items: usize) -> String {
    if items.is_empty() {
        return "Nenhum item".to_string();
    }

    let shown: Vec<String> = items.iter().take(max_items).map(ToString::to_string).collect();
    let joined = shown.join(separator);
    if items.len() <= max_items {
        joined
    } else {
        format!("{} e mais {}", joined, items.len() - max_items)
    }
}

pub fn format_medical_specialty(code: &str) -> String {
    match code.trim().to_lowercase().as_str() {
        "pneumologia" => "Pneumologia".to_string(),
        "endocrinologia" => "Endocrinologia e Metabologia".to_string(),
        "medicina_sono" => "Medicina do Sono".to_string(),
        _ => title_case(code.trim()),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
