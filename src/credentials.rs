//! Username/password pairs carried in the frame auth block.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Errors raised while encoding or parsing an auth block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    /// A credential field does not fit the single-byte length prefix.
    #[error("{0} exceeds the 255-byte auth block limit")]
    FieldTooLong(&'static str),
    /// The auth flag was set but the block ends early.
    #[error("auth block truncated")]
    Truncated,
    /// A credential field is not valid UTF-8.
    #[error("auth block field is not valid UTF-8")]
    InvalidUtf8,
}

/// Credentials granting access to protected streams.
///
/// Supplying credentials on an operation sets the frame's auth flag and
/// prepends a length-prefixed username and password to the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bytes the encoded auth block occupies.
    pub(crate) fn encoded_len(&self) -> usize { 2 + self.username.len() + self.password.len() }

    /// Append the length-prefixed auth block to `dst`.
    pub(crate) fn encode(&self, dst: &mut BytesMut) -> Result<(), CredentialsError> {
        for (name, value) in [("username", &self.username), ("password", &self.password)] {
            let bytes = value.as_bytes();
            let len = u8::try_from(bytes.len()).map_err(|_| CredentialsError::FieldTooLong(name))?;
            dst.put_u8(len);
            dst.put_slice(bytes);
        }
        Ok(())
    }

    /// Parse an auth block, returning the credentials and bytes consumed.
    pub(crate) fn parse(src: &[u8]) -> Result<(Self, usize), CredentialsError> {
        let (username, used) = take_field(src)?;
        let (password, also_used) = take_field(&src[used..])?;
        Ok((Self { username, password }, used + also_used))
    }
}

fn take_field(src: &[u8]) -> Result<(String, usize), CredentialsError> {
    let (&len, rest) = src.split_first().ok_or(CredentialsError::Truncated)?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err(CredentialsError::Truncated);
    }
    let text = std::str::from_utf8(&rest[..len]).map_err(|_| CredentialsError::InvalidUtf8)?;
    Ok((text.to_owned(), 1 + len))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use rstest::rstest;

    use super::{Credentials, CredentialsError};

    #[rstest]
    #[case("admin", "changeit")]
    #[case("", "")]
    #[case("user", "pa55:w/rd!")]
    fn auth_block_round_trips(#[case] username: &str, #[case] password: &str) {
        let credentials = Credentials::new(username, password);
        let mut buf = BytesMut::new();
        credentials.encode(&mut buf).expect("encode failed");
        assert_eq!(buf.len(), credentials.encoded_len());

        let (parsed, consumed) = Credentials::parse(&buf).expect("parse failed");
        assert_eq!(parsed, credentials);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn oversized_username_is_rejected() {
        let credentials = Credentials::new("x".repeat(256), "pw");
        let mut buf = BytesMut::new();
        assert_eq!(
            credentials.encode(&mut buf),
            Err(CredentialsError::FieldTooLong("username"))
        );
    }

    #[test]
    fn truncated_block_is_rejected() {
        // Username claims five bytes but only three follow.
        let err = Credentials::parse(&[5, b'a', b'b', b'c']).unwrap_err();
        assert_eq!(err, CredentialsError::Truncated);
    }
}
