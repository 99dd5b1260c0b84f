use super::*;

/// The block version, big-endian hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Version(pub u32);

impl FromStr for Version {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let version = u32::from_str_radix(s, 16).map_err(|source| InternalError::ParseHexInt {
            input: s.into(),
            source,
        })?;
        Ok(Version(version))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Version {
    fn from(n: u32) -> Version {
        Version(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(hex: &str, value: u32) {
        let version: Version = hex.parse().unwrap();
        assert_eq!(version.0, value);
        assert_eq!(version.to_string(), hex);
        assert_eq!(
            serde_json::to_string(&version).unwrap(),
            format!("\"{hex}\"")
        );
    }

    #[test]
    fn bip9_default() {
        case("20000000", 0x2000_0000);
    }

    #[test]
    fn legacy_versions() {
        case("00000002", 2);
        case("ffffffff", u32::MAX);
    }
}
