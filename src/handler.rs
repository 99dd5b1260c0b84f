use super::*;

/// Verdict of the injected authorizer.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    pub authorized: bool,
    pub error: Option<JsonRpcError>,
    pub disconnect: bool,
}

impl Authorization {
    pub fn granted() -> Self {
        Self {
            authorized: true,
            error: None,
            disconnect: false,
        }
    }

    pub fn denied(error: Option<JsonRpcError>) -> Self {
        Self {
            authorized: false,
            error,
            disconnect: false,
        }
    }
}

/// Verdict of the injected share handler, relayed verbatim to the miner.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub error: Option<JsonRpcError>,
}

impl SubmitOutcome {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            error: None,
        }
    }

    pub fn reject(error: StratumError) -> Self {
        Self {
            accepted: false,
            error: Some(error.into_response(None)),
        }
    }
}

/// The host seam: worker authorization and share validation live outside
/// the session machine.
#[async_trait]
pub trait ShareHandler: Send + Sync + 'static {
    async fn authorize(
        &self,
        ip: IpAddr,
        port: u16,
        worker: &str,
        password: Option<&str>,
    ) -> Authorization;

    async fn submit(&self, share: Share) -> SubmitOutcome;
}
