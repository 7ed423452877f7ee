//! Invocation identifier validation.
//!
//! The chat-completions protocol correlates a tool-result message to the
//! request that produced it through an opaque identifier of the form
//! `call_<token>`. A re-sent tool message may omit the field entirely, but
//! a malformed value is a hard rejection of the whole request, so every
//! identifier is checked both where results are recorded and where requests
//! are serialized. A failed check yields `None`, never an error.

/// Literal prefix mandated by the protocol.
pub const CALL_ID_PREFIX: &str = "call_";

/// Return the identifier unchanged if it conforms to the wire syntax:
/// the `call_` prefix followed by a non-empty token of printable ASCII.
pub fn validate_call_id(id: &str) -> Option<&str> {
    let token = id.strip_prefix(CALL_ID_PREFIX)?;
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_graphic()) {
        return None;
    }
    Some(id)
}

/// Synthesize a conforming identifier for an invocation request that
/// arrived without one.
pub fn placeholder_call_id(name: &str, index: usize) -> String {
    format!("{}{}_{}", CALL_ID_PREFIX, name, index)
}
