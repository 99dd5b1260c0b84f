use super::*;

/// Whether serialized blocks carry the proof-of-stake trailing signature
/// byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reward {
    #[default]
    Pow,
    Pos,
}

/// Everything a job needs that `rpcData` does not carry: the reward
/// convention, the share algorithm's reference target, extranonce sizing and
/// the coinbase output layout.
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub reward: Reward,
    pub diff1: U256,
    pub extranonce1_size: usize,
    pub extranonce2_size: usize,
    pub pool_sig: Option<String>,
    pub outputs: Vec<CoinbaseOutput>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            reward: Reward::Pow,
            diff1: *SHA256D_DIFF1,
            extranonce1_size: 4,
            extranonce2_size: 4,
            pool_sig: None,
            outputs: Vec::new(),
        }
    }
}

type Fingerprint = (Extranonce, Extranonce, Ntime, Nonce);

/// One mining job: the immutable derivation of an `RpcData`, plus the set of
/// submission fingerprints already accepted against it.
#[derive(Debug)]
pub struct BlockTemplate {
    pub job_id: JobId,
    pub rpc_data: RpcData,
    pub target: U256,
    pub difficulty: f64,
    prev_hash: PrevHash,
    bits: Nbits,
    reward: Reward,
    transaction_data: Vec<u8>,
    vote_data: Vec<u8>,
    steps: Vec<[u8; 32]>,
    coinb1: Vec<u8>,
    coinb2: Vec<u8>,
    submits: Mutex<HashSet<Fingerprint>>,
    job_params: OnceLock<Notify>,
}

impl BlockTemplate {
    pub fn new(job_id: JobId, rpc_data: RpcData, options: &TemplateOptions) -> Result<Self> {
        let target = match &rpc_data.target {
            Some(hex) => U256::from_str_radix(hex, 16)
                .map_err(|e| anyhow!("invalid template target `{hex}`: {e}"))?,
            None => util::target_from_bits_hex(&rpc_data.bits)?,
        };
        ensure!(!target.is_zero(), "template target is zero");

        let difficulty = ratio_rounded(options.diff1, target);
        let bits = rpc_data.bits.parse::<Nbits>()?;
        let prev_hash = PrevHash::from_block_hex(&rpc_data.previous_block_hash)?;

        let mut transaction_data = Vec::new();
        let mut hashes = Vec::with_capacity(rpc_data.transactions.len());
        for tx in &rpc_data.transactions {
            transaction_data.extend_from_slice(
                &hex::decode(&tx.data).context("invalid transaction hex")?,
            );
            let id = tx
                .id()
                .ok_or_else(|| anyhow!("transaction carries neither txid nor hash"))?;
            hashes.push(util::uint256_from_hex(id)?);
        }
        let steps = merkle::steps(&hashes);

        let mut vote_data = Vec::new();
        if rpc_data.masternode_payments {
            vote_data.extend_from_slice(&util::var_int(rpc_data.votes.len() as u64));
            for vote in &rpc_data.votes {
                vote_data
                    .extend_from_slice(&hex::decode(vote).context("invalid vote hex")?);
            }
        }

        let mut flags = Vec::new();
        for value in rpc_data.coinbase_aux.values() {
            flags.extend_from_slice(&hex::decode(value).context("invalid coinbaseaux hex")?);
        }

        let mut builder = CoinbaseBuilder::new(
            rpc_data.height,
            options.extranonce1_size + options.extranonce2_size,
            options.outputs.clone(),
        )
        .with_flags(flags);
        if let Some(pool_sig) = &options.pool_sig {
            builder = builder.with_pool_sig(pool_sig.clone());
        }
        let (coinb1, coinb2) = builder.build()?;

        Ok(Self {
            job_id,
            rpc_data,
            target,
            difficulty,
            prev_hash,
            bits,
            reward: options.reward,
            transaction_data,
            vote_data,
            steps,
            coinb1,
            coinb2,
            submits: Mutex::new(HashSet::new()),
            job_params: OnceLock::new(),
        })
    }

    pub fn height(&self) -> u64 {
        self.rpc_data.height
    }

    pub fn prev_hash(&self) -> PrevHash {
        self.prev_hash
    }

    pub fn merkle_steps(&self) -> &[[u8; 32]] {
        &self.steps
    }

    /// `coinb1 ‖ extranonce1 ‖ extranonce2 ‖ coinb2`.
    pub fn serialize_coinbase(
        &self,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
    ) -> Vec<u8> {
        let mut coinbase = Vec::with_capacity(
            self.coinb1.len() + extranonce1.len() + extranonce2.len() + self.coinb2.len(),
        );
        coinbase.extend_from_slice(&self.coinb1);
        coinbase.extend_from_slice(extranonce1.as_bytes());
        coinbase.extend_from_slice(extranonce2.as_bytes());
        coinbase.extend_from_slice(&self.coinb2);
        coinbase
    }

    /// The display-order merkle root for this extranonce pair, ready for
    /// `serialize_header`.
    pub fn merkle_root(&self, extranonce1: &Extranonce, extranonce2: &Extranonce) -> [u8; 32] {
        let coinbase_hash = util::sha256d(&self.serialize_coinbase(extranonce1, extranonce2));
        let mut root = merkle::fold(coinbase_hash, &self.steps);
        root.reverse();
        root
    }

    /// The 80-byte header. Fields are written big-endian in reverse order
    /// and the buffer flipped whole, which lands every field in its on-wire
    /// byte order.
    pub fn serialize_header(&self, merkle_root: &[u8; 32], ntime: Ntime, nonce: Nonce) -> [u8; 80] {
        let mut header = [0u8; 80];
        header[0..4].copy_from_slice(&util::pack_u32_be(nonce.into()));
        header[4..8].copy_from_slice(&util::pack_u32_be(self.bits.as_u32()));
        header[8..12].copy_from_slice(&util::pack_u32_be(ntime.into()));
        header[12..44].copy_from_slice(merkle_root);
        header[44..76].copy_from_slice(self.prev_hash.as_bytes());
        header[76..80].copy_from_slice(&util::pack_u32_be(self.rpc_data.version));
        header.reverse();
        header
    }

    /// `header ‖ varint(txs + 1) ‖ coinbase ‖ transactions ‖ votes`, with a
    /// trailing zero byte on proof-of-stake chains.
    pub fn serialize_block(&self, header: &[u8], coinbase: &[u8]) -> Vec<u8> {
        let mut block = Vec::with_capacity(
            header.len() + 9 + coinbase.len() + self.transaction_data.len() + self.vote_data.len(),
        );
        block.extend_from_slice(header);
        block.extend_from_slice(&util::var_int(self.rpc_data.transactions.len() as u64 + 1));
        block.extend_from_slice(coinbase);
        block.extend_from_slice(&self.transaction_data);
        block.extend_from_slice(&self.vote_data);
        if self.reward == Reward::Pos {
            block.push(0x00);
        }
        block
    }

    /// Records a submission fingerprint. False means this exact tuple was
    /// already seen for this job.
    pub fn register_submit(
        &self,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
        ntime: Ntime,
        nonce: Nonce,
    ) -> bool {
        self.submits
            .lock()
            .insert((extranonce1.clone(), extranonce2.clone(), ntime, nonce))
    }

    /// The cached `mining.notify` tuple broadcast for this job.
    pub fn job_params(&self) -> Notify {
        self.job_params
            .get_or_init(|| Notify {
                job_id: self.job_id,
                prevhash: self.prev_hash,
                coinb1: hex::encode(&self.coinb1),
                coinb2: hex::encode(&self.coinb2),
                merkle_branches: self.steps.iter().copied().map(MerkleNode::from).collect(),
                version: Version(self.rpc_data.version),
                nbits: self.bits,
                ntime: Ntime(self.rpc_data.current_time),
                clean_jobs: true,
            })
            .clone()
    }
}

/// `diff1 / target` rounded to 9 fractional digits, divided in integer space
/// so precision is only lost at the final step.
fn ratio_rounded(diff1: U256, target: U256) -> f64 {
    const SCALE: u64 = 1_000_000_000;

    let integer = diff1 / target;
    let remainder = diff1 % target;

    let mut fraction = ((U512::from(remainder) * U512::from(SCALE) + U512::from(target >> 1))
        / U512::from(target))
    .as_u64();

    let integer = if fraction >= SCALE {
        fraction -= SCALE;
        integer + 1
    } else {
        integer
    };

    u256_to_f64(integer) + fraction as f64 / SCALE as f64
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 2f64.powi(64) + limb as f64)
}
