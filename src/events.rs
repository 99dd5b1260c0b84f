use super::*;

/// Everything the server and its sessions report back to the host.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    Started {
        addresses: Vec<SocketAddr>,
    },
    ClientConnected {
        subscription_id: String,
        addr: SocketAddr,
    },
    ClientDisconnected {
        subscription_id: String,
        addr: SocketAddr,
    },
    BroadcastTimeout,
    KickedBannedIp {
        ip: IpAddr,
        remaining: Duration,
    },
    ForgaveBannedIp {
        ip: IpAddr,
    },
    TriggerBan {
        ip: IpAddr,
        worker: Option<String>,
    },
    SocketFlooded {
        addr: SocketAddr,
    },
    MalformedMessage {
        addr: SocketAddr,
        line: String,
    },
    UnknownStratumMethod {
        addr: SocketAddr,
        method: String,
    },
    TcpProxyError {
        addr: SocketAddr,
    },
}

/// Peer connection lifecycle and block notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Connected,
    Disconnected,
    ConnectionRejected,
    ConnectionFailed,
    SocketError(String),
    PeerMessage { command: String },
    SentMessage { command: String },
    BlockFound(String),
    Error(String),
}
