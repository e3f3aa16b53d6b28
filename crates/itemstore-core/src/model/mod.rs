//! Data model: the envelope every stored entity extends, and the
//! immutable audit event co-written with every mutation (spec §3).

mod envelope;
mod event;

pub use envelope::Envelope;
pub use event::{ItemEvent, PropertyChange, RequestContext, SaveAction};

/// Reserved `typeName` for audit events; no entity may register it.
pub const EVENT_TYPE_NAME: &str = "event";

/// Validate a `typeName` against spec §3/§4.7's naming rule: nonempty,
/// lowercase ASCII letters and hyphens only, first and last character a
/// letter, no two consecutive hyphens, and not equal to the reserved
/// value `event` (`^[a-z](-?[a-z])*$`).
#[must_use]
pub fn is_valid_type_name(type_name: &str) -> bool {
    if type_name == EVENT_TYPE_NAME || type_name.is_empty() {
        return false;
    }

    let bytes = type_name.as_bytes();
    let is_letter = |b: u8| b.is_ascii_lowercase();

    if !is_letter(bytes[0]) || !is_letter(bytes[bytes.len() - 1]) {
        return false;
    }

    if bytes.windows(2).any(|pair| pair[0] == b'-' && pair[1] == b'-') {
        return false;
    }

    bytes.iter().all(|&b| is_letter(b) || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(is_valid_type_name("test-item"));
        assert!(is_valid_type_name("a"));
        assert!(is_valid_type_name("widget"));
    }

    #[test]
    fn rejects_reserved_and_malformed_names() {
        assert!(!is_valid_type_name("event"));
        assert!(!is_valid_type_name(""));
        assert!(!is_valid_type_name("-item"));
        assert!(!is_valid_type_name("item-"));
        assert!(!is_valid_type_name("Item"));
        assert!(!is_valid_type_name("item_name"));
        assert!(!is_valid_type_name("item--name-"));
    }

    #[test]
    fn rejects_consecutive_hyphens() {
        assert!(!is_valid_type_name("a--b"));
        assert!(!is_valid_type_name("item--name"));
        assert!(is_valid_type_name("item-name"));
    }
}
