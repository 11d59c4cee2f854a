//! Base64url (RFC 4648 §5, unpadded) helpers used for credential ids and other byte fields.

use base64::prelude::*;
use serde::{Deserialize as _, Deserializer, Serializer};

#[must_use]
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes base64url input, tolerating trailing `=` padding.
///
/// # Errors
///
/// If the input is not valid base64url.
pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}

pub(crate) fn serialize<S>(bytes: impl AsRef<[u8]>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode(bytes))
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    decode(&encoded).map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_url_safe_alphabet_without_padding() {
        let bytes = [0xfb, 0xff, 0xbf, 0x01];
        assert_eq!(encode(bytes), "-_-_AQ");
        assert_eq!(decode("-_-_AQ").unwrap(), bytes.to_vec());
        assert_eq!(decode("-_-_AQ==").unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_rejects_standard_alphabet() {
        decode("+/+/AQ").unwrap_err();
    }
}
