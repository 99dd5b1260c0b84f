use super::*;

/// One output of the generation transaction. The pool payout script, extra
/// recipients, the witness commitment and masternode payees are all plain
/// entries here; the builder carries no coin-specific layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseOutput {
    pub value: u64,
    pub script: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    height: u64,
    placeholder_size: usize,
    outputs: Vec<CoinbaseOutput>,
    flags: Vec<u8>,
    pool_sig: Option<String>,
    tx_version: u32,
    sequence: u32,
    lock_time: u32,
}

impl CoinbaseBuilder {
    const MAX_SCRIPT_SIG_SIZE: usize = 100;

    pub fn new(height: u64, placeholder_size: usize, outputs: Vec<CoinbaseOutput>) -> Self {
        Self {
            height,
            placeholder_size,
            outputs,
            flags: Vec::new(),
            pool_sig: None,
            tx_version: 1,
            sequence: u32::MAX,
            lock_time: 0,
        }
    }

    pub fn with_flags(mut self, flags: Vec<u8>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_pool_sig(mut self, pool_sig: String) -> Self {
        self.pool_sig = Some(pool_sig);
        self
    }

    pub fn with_tx_version(mut self, tx_version: u32) -> Self {
        self.tx_version = tx_version;
        self
    }

    /// Serializes the generation transaction split around the extranonce
    /// placeholder: the full coinbase is `prefix ‖ extranonce1 ‖
    /// extranonce2 ‖ suffix`. The whole script head — height push, flags
    /// and pool signature — sits before the placeholder; the placeholder
    /// closes the script.
    pub fn build(self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut script_prefix = Vec::with_capacity(Self::MAX_SCRIPT_SIG_SIZE);

        // BIP34 minimal height push
        let mut encoded = [0u8; 8];
        let len = write_scriptint(
            &mut encoded,
            self.height.try_into().context("height out of range")?,
        );
        script_prefix.push(len as u8);
        script_prefix.extend_from_slice(&encoded[..len]);

        script_prefix.extend_from_slice(&self.flags);

        if let Some(sig) = &self.pool_sig {
            script_prefix.extend_from_slice(&util::var_string(sig));
        }

        let script_len = script_prefix.len() + self.placeholder_size;

        ensure!(
            script_len <= Self::MAX_SCRIPT_SIG_SIZE,
            "coinbase script is {script_len} bytes (max {})",
            Self::MAX_SCRIPT_SIG_SIZE
        );

        let mut prefix = Vec::with_capacity(46 + script_prefix.len());
        prefix.extend_from_slice(&util::pack_u32_le(self.tx_version));
        prefix.extend_from_slice(&util::var_int(1));
        prefix.extend_from_slice(&[0u8; 32]);
        prefix.extend_from_slice(&util::pack_u32_le(u32::MAX));
        prefix.extend_from_slice(&util::var_int(script_len as u64));
        prefix.extend_from_slice(&script_prefix);

        let mut suffix = Vec::new();
        suffix.extend_from_slice(&util::pack_u32_le(self.sequence));
        suffix.extend_from_slice(&util::var_int(self.outputs.len() as u64));
        for output in &self.outputs {
            suffix.extend_from_slice(&util::pack_i64_le(output.value as i64));
            suffix.extend_from_slice(&util::var_int(output.script.len() as u64));
            suffix.extend_from_slice(&output.script);
        }
        suffix.extend_from_slice(&util::pack_u32_le(self.lock_time));

        Ok((prefix, suffix))
    }
}
