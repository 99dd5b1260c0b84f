use super::*;

/// Server configuration. Every field has a workable default so hosts can
/// deserialize a partial document or start from `Default` and override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listening ports and their starting difficulty.
    pub ports: BTreeMap<u16, PortSettings>,
    pub banning: BanningSettings,
    /// Seconds of submit silence before a session is destroyed.
    pub connection_timeout: u64,
    /// Expect a PROXY protocol banner as the first line of each connection.
    pub tcp_proxy_protocol: bool,
    /// Seconds of broadcast silence before `BroadcastTimeout` fires.
    pub job_rebroadcast_timeout: u64,
    pub peer: PeerSettings,
    pub coin: CoinSettings,
    pub testnet: bool,
    pub protocol_version: u32,
    pub extranonce1_size: usize,
    pub extranonce2_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ports: BTreeMap::new(),
            banning: BanningSettings::default(),
            connection_timeout: 600,
            tcp_proxy_protocol: false,
            job_rebroadcast_timeout: 55,
            peer: PeerSettings::default(),
            coin: CoinSettings::default(),
            testnet: false,
            protocol_version: 70002,
            extranonce1_size: 4,
            extranonce2_size: 4,
        }
    }
}

impl Settings {
    pub fn peer_magic_bytes(&self) -> Result<[u8; 4]> {
        let magic = if self.testnet {
            &self.coin.peer_magic_testnet
        } else {
            &self.coin.peer_magic
        };
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(magic, &mut bytes)
            .with_context(|| format!("invalid peer magic `{magic}`"))?;
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub difficulty: f64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self { difficulty: 8.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BanningSettings {
    pub enabled: bool,
    /// Ban duration in seconds.
    pub time: u64,
    /// Seconds between sweeps of expired bans.
    pub purge_interval: u64,
    /// Shares counted before the invalid ratio is inspected.
    pub check_threshold: u64,
    /// Invalid percentage at or above which the session is banned.
    pub invalid_percent: f64,
}

impl Default for BanningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            time: 600,
            purge_interval: 300,
            check_threshold: 500,
            invalid_percent: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    pub host: String,
    pub port: u16,
    /// Omit the transaction relay flag handshake byte when false; when true
    /// a single zero byte asks the node not to relay transactions.
    pub disable_transactions: bool,
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8333,
            disable_transactions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinSettings {
    pub peer_magic: String,
    pub peer_magic_testnet: String,
    pub reward: Reward,
}

impl Default for CoinSettings {
    fn default() -> Self {
        Self {
            peer_magic: "f9beb4d9".into(),
            peer_magic_testnet: "0b110907".into(),
            reward: Reward::Pow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_deserialize() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "ports": {"3032": {"difficulty": 0.5}, "3256": {}},
                "banning": {"enabled": false},
                "connection_timeout": 120
            }"#,
        )
        .unwrap();

        assert_eq!(settings.ports[&3032].difficulty, 0.5);
        assert_eq!(settings.ports[&3256].difficulty, 8.0);
        assert!(!settings.banning.enabled);
        assert_eq!(settings.banning.time, 600);
        assert_eq!(settings.connection_timeout, 120);
        assert_eq!(settings.extranonce2_size, 4);
    }

    #[test]
    fn magic_selection_honors_testnet() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.peer_magic_bytes().unwrap(),
            [0xf9, 0xbe, 0xb4, 0xd9]
        );

        settings.testnet = true;
        assert_eq!(
            settings.peer_magic_bytes().unwrap(),
            [0x0b, 0x11, 0x09, 0x07]
        );

        settings.coin.peer_magic_testnet = "nothex!!".into();
        assert!(settings.peer_magic_bytes().is_err());
    }

    #[test]
    fn reward_uses_the_wire_spelling() {
        let coin: CoinSettings = serde_json::from_str(r#"{"reward": "POS"}"#).unwrap();
        assert_eq!(coin.reward, Reward::Pos);
        assert_eq!(
            serde_json::to_value(CoinSettings::default()).unwrap()["reward"],
            json!("POW")
        );
    }
}
