//! Trailing control-signal detection in free-form model output.
//!
//! During role play the model is instructed to end its reply with a single
//! machine-readable line, `{"wrapping_up": true}`, once the conversation
//! reaches a natural conclusion. That line is for the application, not the
//! user, so it is stripped from the visible text when found.

use serde_json::Value;

/// JSON key carrying the wrap-up signal.
pub const WRAPPING_UP_KEY: &str = "wrapping_up";

/// Split a trailing `{"wrapping_up": bool}` line off free-form model output.
///
/// Looks at the last line only. If it starts with `{` and mentions the
/// control key, that line alone is parsed as strict JSON: on success the
/// signal is the truthiness of the `wrapping_up` field and the returned text
/// is the original minus the trailing line (and the newline before it),
/// right-trimmed. On any mismatch or parse failure the text is returned
/// unchanged with no signal; a malformed control line stays visible rather
/// than failing the turn.
///
/// Applying this to already-cleaned text is a no-op, so it is safe to run
/// more than once.
///
/// # Example
///
/// ```rust
/// use chat_core::extract_control_signal;
///
/// let (signal, cleaned) = extract_control_signal("Sounds good.\n{\"wrapping_up\": true}");
/// assert_eq!(signal, Some(true));
/// assert_eq!(cleaned, "Sounds good.");
/// ```
pub fn extract_control_signal(text: &str) -> (Option<bool>, String) {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let last_line = match lines.last() {
        Some(line) => line.trim(),
        None => return (None, text.to_string()),
    };

    if !last_line.starts_with('{') || !last_line.contains(WRAPPING_UP_KEY) {
        return (None, text.to_string());
    }

    match serde_json::from_str::<Value>(last_line) {
        Ok(parsed) => {
            let signal = match parsed.get(WRAPPING_UP_KEY) {
                Some(Value::Bool(flag)) => *flag,
                Some(Value::Null) | None => false,
                Some(_) => true,
            };
            let cleaned = lines[..lines.len() - 1].concat();
            (Some(signal), cleaned.trim_end().to_string())
        }
        Err(_) => (None, text.to_string()),
    }
}
