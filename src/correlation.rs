//! Correlation identifiers pairing a request with its response frames.

use uuid::Uuid;

/// 16-byte value addressing one outstanding operation on a connection.
///
/// Generated by the session when a request is sent; unique per outstanding
/// request. The identifier is released when the operation logically
/// completes: immediately for request/response operations, on drop or
/// explicit unsubscribe for subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self { Self(Uuid::new_v4()) }

    /// Wrap raw identifier bytes received off the wire.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self { Self(Uuid::from_bytes(bytes)) }

    /// Raw byte form written to the wire.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] { self.0.as_bytes() }
}

impl Default for CorrelationId {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::CorrelationId;

    #[test]
    fn fresh_identifiers_are_unique() {
        let first = CorrelationId::new();
        let second = CorrelationId::new();
        assert_ne!(first, second);
    }

    #[test]
    fn round_trips_through_raw_bytes() {
        let id = CorrelationId::new();
        assert_eq!(CorrelationId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn displays_as_32_hex_digits() {
        let text = CorrelationId::new().to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
