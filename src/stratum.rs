use super::*;

// Import snafu for the derive macro in error.rs.
use snafu::Snafu;

mod authorize;
mod error;
mod extranonce;
mod job_id;
mod merkle_node;
mod message;
mod nbits;
mod nonce;
mod notify;
mod ntime;
mod prev_hash;
mod set_difficulty;
mod submit;
mod subscribe;
mod version;

pub use {
    authorize::Authorize,
    error::{InternalError, JsonRpcError, StratumError},
    extranonce::Extranonce,
    job_id::JobId,
    merkle_node::MerkleNode,
    message::{Id, Message},
    nbits::Nbits,
    nonce::Nonce,
    notify::Notify,
    ntime::Ntime,
    prev_hash::PrevHash,
    set_difficulty::SetDifficulty,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
    version::Version,
};
