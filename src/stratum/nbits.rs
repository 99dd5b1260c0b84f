use super::*;

/// The compact network target as it appears in the block header and in
/// `mining.notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Nbits(u32);

impl Nbits {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// The full 256-bit target this compact value expands to.
    pub fn target(self) -> U256 {
        util::target_from_bits(self.0)
    }
}

impl FromStr for Nbits {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 {
            return Err(InternalError::InvalidValue {
                reason: format!("nbits `{s}` must be 8 hex characters"),
            });
        }
        let bits = u32::from_str_radix(s, 16).map_err(|source| InternalError::ParseHexInt {
            input: s.into(),
            source,
        })?;
        Ok(Nbits(bits))
    }
}

impl fmt::Display for Nbits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Nbits {
    fn from(n: u32) -> Nbits {
        Nbits(n)
    }
}
