use super::*;

/// A node of the coinbase authentication path, transmitted as hex in
/// internal byte order (no display reversal, unlike txids).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct MerkleNode([u8; 32]);

impl MerkleNode {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for MerkleNode {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<MerkleNode> for [u8; 32] {
    fn from(node: MerkleNode) -> Self {
        node.0
    }
}

impl fmt::Display for MerkleNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for MerkleNode {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| InternalError::InvalidValue {
            reason: format!("merkle node `{s}`: {e}"),
        })?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_order_is_preserved() {
        let hex = "c0f65e3443b9e2215ebd08cd6fc52d0e776897a3afdf4787cf28de48d9a8c3ad";
        let node: MerkleNode = serde_json::from_str(&format!("\"{hex}\"")).unwrap();
        assert_eq!(node.to_string(), hex);
        assert_eq!(hex::encode(node.as_bytes()), hex);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("aabb".parse::<MerkleNode>().is_err());
        assert!("g".repeat(64).parse::<MerkleNode>().is_err());
    }
}
