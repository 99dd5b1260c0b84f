use super::*;

/// A submitted share as handed to the injected handler. Extranonce1 comes
/// from the session; everything else is the miner's submit tuple.
#[derive(Debug, Clone)]
pub struct Share {
    pub worker_name: String,
    pub job_id: JobId,
    pub extranonce1: Extranonce,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
    pub remote_ip: IpAddr,
    pub local_port: u16,
    /// The difficulty the session was working at when it submitted.
    pub difficulty: f64,
    /// Set during a retarget window, where a share may still honor the
    /// previous difficulty.
    pub previous_difficulty: Option<f64>,
}
