use {
    anyhow::{Context, Error, anyhow, ensure},
    async_trait::async_trait,
    bitcoin::{
        hashes::{Hash, sha256d},
        script::write_scriptint,
    },
    byteorder::{BigEndian, ByteOrder, LittleEndian},
    dashmap::DashMap,
    derive_more::Display,
    futures::{SinkExt, StreamExt},
    lru::LruCache,
    parking_lot::Mutex,
    primitive_types::{U256, U512},
    rand::RngCore,
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
        ser::SerializeSeq,
    },
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    std::{
        collections::{BTreeMap, HashSet},
        fmt::{self, Formatter},
        io,
        net::{IpAddr, SocketAddr},
        num::NonZeroUsize,
        str::FromStr,
        sync::{
            Arc, LazyLock, OnceLock,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    tokio::{
        io::{AsyncRead, AsyncWrite},
        net::{TcpListener, TcpStream},
        sync::{mpsc, watch},
        task::JoinSet,
        time::sleep,
    },
    tokio_util::{
        codec::{Decoder, Encoder, Framed, FramedRead, FramedWrite, LinesCodec, LinesCodecError},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
};

pub use {
    banlist::{BanList, BanState},
    coinbase::{CoinbaseBuilder, CoinbaseOutput},
    events::{PeerEvent, PoolEvent},
    handler::{Authorization, ShareHandler, SubmitOutcome},
    jobs::Jobs,
    peer::Peer,
    rpc_data::{RpcData, RpcTransaction},
    server::StratumServer,
    session::SessionCommand,
    settings::{BanningSettings, CoinSettings, PeerSettings, PortSettings, Settings},
    share::Share,
    stratum::{
        Authorize, Extranonce, Id, JobId, JsonRpcError, MerkleNode, Message, Nbits, Nonce, Notify,
        Ntime, PrevHash, SetDifficulty, StratumError, Submit, Subscribe, SubscribeResult, Version,
    },
    template::{BlockTemplate, Reward, TemplateOptions},
};

pub mod banlist;
pub mod coinbase;
pub mod events;
pub mod handler;
pub mod jobs;
pub mod merkle;
pub mod peer;
pub mod rpc_data;
pub mod server;
pub mod session;
pub mod settings;
pub mod share;
pub mod stratum;
pub mod template;
pub mod util;

pub const COIN_VALUE: u64 = 100_000_000;
pub const USER_AGENT: &str = "/stope/";

/// Stratum lines are small; anything this large without a newline is a flood.
pub const MAX_MESSAGE_SIZE: usize = 10_240;

/// Jobs kept answerable for late submits before the table retires them.
pub const MAX_ACTIVE_JOBS: usize = 8;

pub const SUBSCRIPTION_ID_PREFIX: &str = "deadbeefcafebabe";

/// The sha256d reference target: a share of difficulty 1 meets it exactly.
pub static SHA256D_DIFF1: LazyLock<U256> = LazyLock::new(|| util::target_from_bits(0x1d00ffff));

type Result<T = (), E = Error> = std::result::Result<T, E>;
