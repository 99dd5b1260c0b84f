use super::*;

/// The previous block hash as Stratum transmits it: the display-order hash
/// with the bytes of every 32-bit word reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct PrevHash([u8; 32]);

impl PrevHash {
    /// From the big-endian display hex, as `previousblockhash` carries it.
    pub fn from_block_hex(s: &str) -> Result<Self, InternalError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| InternalError::InvalidValue {
            reason: format!("previous block hash `{s}`: {e}"),
        })?;
        Ok(Self(bytes))
    }

    /// Display-order bytes, the order the header serializer consumes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for PrevHash {
    type Err = InternalError;

    // parses the word-swapped wire form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| InternalError::InvalidValue {
            reason: format!("prevhash `{s}`: {e}"),
        })?;
        for word in bytes.chunks_exact_mut(4) {
            word.reverse();
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for PrevHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(util::reverse_words(&self.0)))
    }
}
