use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use broadside_core::{Commitment, MoveBatch};
use broadside_system_commit_reveal::{commitment_hash, decode_commitment};
use thiserror::Error;

const SECRET_DOMAIN: &str = "broadside";
const SECRET_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded commitment.
pub(crate) const SECRET_HEADER: &str = "broadside:v1";
/// Delimiter used to separate the prefix from the payload.
const FIELD_DELIMITER: char = ':';

/// Hidden move batch exported so a player can reveal it after restarting the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RevealSecret {
    encoding: Vec<u8>,
    batch: MoveBatch,
}

impl RevealSecret {
    /// Captures the encoding bound by a confirmed commitment.
    pub(crate) fn from_commitment(commitment: &Commitment) -> Result<Self, SecretTransferError> {
        Self::from_encoding(commitment.encoding.clone())
    }

    fn from_encoding(encoding: Vec<u8>) -> Result<Self, SecretTransferError> {
        let batch = decode_commitment(&encoding).map_err(SecretTransferError::InvalidPayload)?;
        Ok(Self { encoding, batch })
    }

    /// Encodes the secret into a single-line string suitable for clipboard transfer.
    #[must_use]
    pub(crate) fn encode(&self) -> String {
        format!("{SECRET_HEADER}:{}", STANDARD_NO_PAD.encode(&self.encoding))
    }

    /// Decodes a secret from its string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, SecretTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SecretTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(SecretTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(SecretTransferError::MissingVersion)?;
        let payload = parts.next().ok_or(SecretTransferError::MissingPayload)?;

        if domain != SECRET_DOMAIN {
            return Err(SecretTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SECRET_VERSION {
            return Err(SecretTransferError::UnsupportedVersion(version.to_owned()));
        }

        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(SecretTransferError::InvalidEncoding)?;
        Self::from_encoding(bytes)
    }

    /// Raw commitment encoding.
    pub(crate) fn encoding(&self) -> &[u8] {
        &self.encoding
    }

    /// Move batch bound by the secret.
    pub(crate) fn batch(&self) -> &MoveBatch {
        &self.batch
    }

    /// Digest published during the Commit phase.
    #[must_use]
    pub(crate) fn hash(&self) -> [u8; 32] {
        commitment_hash(&self.encoding)
    }
}

/// Errors that can occur while decoding reveal secrets.
#[derive(Debug, Error)]
pub(crate) enum SecretTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("secret was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("secret is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("secret is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("secret is missing the payload")]
    MissingPayload,
    /// The secret used an unexpected prefix segment.
    #[error("secret prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The secret used an unsupported version identifier.
    #[error("secret version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode secret payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload is not a move batch.
    #[error("could not parse secret payload: {0}")]
    InvalidPayload(#[source] bincode::Error),
}

/// Lowercase hexadecimal rendering of a digest.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadside_core::{GameId, Move, MoveCardId, Salt, ShipId};
    use broadside_system_commit_reveal::build_commitment;

    fn commitment() -> Commitment {
        let moves = vec![
            Move {
                ship: ShipId::new(2),
                card: MoveCardId::new(5),
            },
            Move {
                ship: ShipId::new(7),
                card: MoveCardId::new(1),
            },
        ];
        build_commitment(GameId::new(3), &moves, Salt::from_bytes([8; 32])).expect("encode")
    }

    #[test]
    fn transfer_preserves_commitment() {
        let commitment = commitment();
        let secret = RevealSecret::from_commitment(&commitment).expect("valid commitment");

        let encoded = secret.encode();
        assert!(encoded.starts_with(&format!("{SECRET_HEADER}:")));
        assert!(!encoded.contains('\n'));

        let decoded = RevealSecret::decode(&format!("  {encoded}\n")).expect("secret decodes");
        assert_eq!(decoded, secret);
        assert_eq!(decoded.hash(), commitment.hash);
        assert_eq!(decoded.encoding(), commitment.encoding.as_slice());
        assert_eq!(decoded.batch().game, GameId::new(3));
        assert_eq!(decoded.batch().moves.len(), 2);
    }

    #[test]
    fn rejects_foreign_prefix_and_version() {
        assert!(matches!(
            RevealSecret::decode("galleon:v1:AAAA"),
            Err(SecretTransferError::InvalidPrefix(prefix)) if prefix == "galleon"
        ));
        assert!(matches!(
            RevealSecret::decode("broadside:v2:AAAA"),
            Err(SecretTransferError::UnsupportedVersion(version)) if version == "v2"
        ));
        assert!(matches!(
            RevealSecret::decode("broadside:v1"),
            Err(SecretTransferError::MissingPayload)
        ));
        assert!(matches!(
            RevealSecret::decode("   "),
            Err(SecretTransferError::EmptyPayload)
        ));
    }

    #[test]
    fn rejects_payload_that_is_not_a_move_batch() {
        assert!(matches!(
            RevealSecret::decode("broadside:v1:!!!"),
            Err(SecretTransferError::InvalidEncoding(_))
        ));
        let short = STANDARD_NO_PAD.encode([1_u8, 2, 3]);
        assert!(matches!(
            RevealSecret::decode(&format!("broadside:v1:{short}")),
            Err(SecretTransferError::InvalidPayload(_))
        ));
    }

    #[test]
    fn hex_renders_lowercase_pairs() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x7f]), "00ab7f");
    }
}
