//! Pairing-code formatting.

/// Characters per group.
const GROUP_LEN: usize = 4;
/// Separator between groups.
const SEPARATOR: char = '-';

/// Group a raw pairing code into 4-character chunks for readability.
///
/// Codes shorter than one group or already containing the separator are
/// returned unchanged, so the formatter is idempotent and never fails on
/// unexpected stack output.
pub fn format_pairing_code(raw: &str) -> String {
    if raw.contains(SEPARATOR) {
        return raw.to_string();
    }
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= GROUP_LEN {
        return raw.to_string();
    }

    chars
        .chunks(GROUP_LEN)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}
