use std::sync::LazyLock;

use regex::Regex;

pub const MAX_MESSAGE_LENGTH: usize = 4096;

static WHATSAPP_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^55\d{8,11}$").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 10 to 13 digits with the Brazilian country code.
pub fn validate_whatsapp_number(phone_number: &str) -> bool {
    WHATSAPP_NUMBER.is_match(&digits_only(phone_number))
}

/// Digits-only form accepted by the Graph API, or `None` when invalid.
pub fn format_whatsapp_number(phone_number: &str) -> Option<String> {
    validate_whatsapp_number(phone_number).then(|| digits_only(phone_number))
}

pub fn validate_message_length(message: &str, max_length: usize) -> bool {
    message.chars().count() <= max_length
}

/// Strips control characters and HTML tags and caps the length.
pub fn sanitize_message(message: &str) -> String {
    let without_controls: String = message.chars().filter(|c| !c.is_control()).collect();

    let sanitized = HTML_TAG.replace_all(&without_controls, "").into_owned();

    if sanitized.chars().count() > MAX_MESSAGE_LENGTH {
        let mut capped: String = sanitized.chars().take(MAX_MESSAGE_LENGTH - 3).collect();
        capped.push_str("...");
        capped
    } else {
        sanitized
    }
}
