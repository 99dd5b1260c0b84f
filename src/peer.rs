use {
    super::*,
    codec::{PeerCodec, PeerFrame, RawMessage},
};

mod codec;

const INV_ERROR: u32 = 0;
const INV_TX: u32 = 1;
const INV_BLOCK: u32 = 2;

/// 26-byte network address stub: NODE_NETWORK services and a zeroed
/// ipv6-mapped address and port.
const EMPTY_ADDRESS: [u8; 26] = [
    1, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0, 0, 0, 0, //
    0, 0,
];

enum Exit {
    Cancelled,
    Closed,
    Errored,
}

/// Outbound connection to the coin daemon's peer port, used solely to learn
/// of new blocks the moment they propagate.
pub struct Peer {
    settings: Arc<Settings>,
    event_tx: mpsc::Sender<PeerEvent>,
    cancel_token: CancellationToken,
    magic: [u8; 4],
    verack: bool,
    valid_connection_config: bool,
}

impl Peer {
    /// Spawns the peer task. The receiver carries the connection lifecycle
    /// and `BlockFound` notifications.
    pub fn spawn(
        settings: Arc<Settings>,
        cancel_token: CancellationToken,
    ) -> Result<mpsc::Receiver<PeerEvent>> {
        let magic = settings.peer_magic_bytes()?;
        let (event_tx, event_rx) = mpsc::channel(64);

        let peer = Self {
            settings,
            event_tx,
            cancel_token,
            magic,
            verack: false,
            valid_connection_config: true,
        };

        tokio::spawn(peer.run());

        Ok(event_rx)
    }

    async fn run(mut self) {
        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }

            self.verack = false;
            let host = self.settings.peer.host.clone();
            let port = self.settings.peer.port;

            let stream = match TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => stream,
                Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                    warn!("Peer {host}:{port} refused the connection");
                    self.valid_connection_config = false;
                    self.emit(PeerEvent::ConnectionFailed).await;
                    break;
                }
                Err(err) => {
                    self.emit(PeerEvent::SocketError(err.to_string())).await;
                    if self.valid_connection_config {
                        self.emit(PeerEvent::ConnectionRejected).await;
                    }
                    break;
                }
            };

            info!("Connected to peer {host}:{port}");

            match self.serve(stream).await {
                Exit::Cancelled => break,
                Exit::Closed | Exit::Errored => {}
            }

            if self.cancel_token.is_cancelled() {
                break;
            }

            if self.verack {
                // a completed handshake means the node went away; try again
                self.emit(PeerEvent::Disconnected).await;
                continue;
            }

            if self.valid_connection_config {
                self.emit(PeerEvent::ConnectionRejected).await;
            }
            break;
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> Exit {
        let mut framed = Framed::new(stream, PeerCodec::new(self.magic));

        if let Err(err) = self.send_version(&mut framed).await {
            self.emit(PeerEvent::SocketError(err.to_string())).await;
            return Exit::Errored;
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => return Exit::Cancelled,

                frame = framed.next() => match frame {
                    None => {
                        info!("Peer closed the connection");
                        return Exit::Closed;
                    }
                    Some(Err(err)) => {
                        self.emit(PeerEvent::SocketError(err.to_string())).await;
                        return Exit::Errored;
                    }
                    Some(Ok(PeerFrame::BadMagic)) => {
                        warn!("Peer stream desynchronized");
                        self.emit(PeerEvent::Error("bad magic number".into())).await;
                    }
                    Some(Ok(PeerFrame::BadChecksum { command })) => {
                        self.emit(PeerEvent::Error(format!(
                            "bad payload - failed checksum on `{command}`"
                        )))
                        .await;
                    }
                    Some(Ok(PeerFrame::Message { command, payload })) => {
                        self.emit(PeerEvent::PeerMessage {
                            command: command.clone(),
                        })
                        .await;

                        match command.as_str() {
                            "verack" => {
                                if !self.verack {
                                    self.verack = true;
                                    info!("Peer handshake complete");
                                    self.emit(PeerEvent::Connected).await;
                                }
                            }
                            "version" => {
                                if let Err(err) = self
                                    .send_message(&mut framed, RawMessage::new("verack", Vec::new()))
                                    .await
                                {
                                    self.emit(PeerEvent::SocketError(err.to_string())).await;
                                    return Exit::Errored;
                                }
                            }
                            "inv" => self.handle_inv(&payload).await,
                            _ => debug!("Ignoring peer message `{command}`"),
                        }
                    }
                }
            }
        }
    }

    /// `version ‖ services ‖ timestamp ‖ addrRecv ‖ addrFrom ‖ nonce ‖
    /// userAgent ‖ startHeight [‖ relay]`. The relay byte is present only
    /// when transaction relay is disabled.
    async fn send_version(&mut self, framed: &mut Framed<TcpStream, PeerCodec>) -> Result {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut nonce = [0u8; 8];
        rand::rng().fill_bytes(&mut nonce);

        let mut payload = Vec::with_capacity(96);
        payload.extend_from_slice(&util::pack_u32_le(self.settings.protocol_version));
        payload.extend_from_slice(&[0u8; 8]);
        payload.extend_from_slice(&util::pack_i64_le(timestamp as i64));
        payload.extend_from_slice(&EMPTY_ADDRESS);
        payload.extend_from_slice(&EMPTY_ADDRESS);
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&util::var_string(USER_AGENT));
        payload.extend_from_slice(&util::pack_i32_le(0));
        if self.settings.peer.disable_transactions {
            payload.push(0x00);
        }

        self.send_message(framed, RawMessage::new("version", payload))
            .await
    }

    async fn send_message(
        &mut self,
        framed: &mut Framed<TcpStream, PeerCodec>,
        message: RawMessage,
    ) -> Result {
        let command = message.command.clone();
        framed.send(message).await?;
        self.emit(PeerEvent::SentMessage { command }).await;
        Ok(())
    }

    /// Decodes the inventory vectors, announcing type-2 (block) entries.
    /// Only the one-byte and `0xfd` count prefixes occur at sane inventory
    /// sizes; wider prefixes are rejected rather than guessed at.
    async fn handle_inv(&mut self, payload: &[u8]) {
        let (count, mut offset) = match payload.first().copied() {
            None => {
                self.emit(PeerEvent::Error("empty inv payload".into())).await;
                return;
            }
            Some(0xfd) => {
                if payload.len() < 3 {
                    self.emit(PeerEvent::Error("truncated inv count".into())).await;
                    return;
                }
                (LittleEndian::read_u16(&payload[1..3]) as usize, 3)
            }
            Some(0xfe) | Some(0xff) => {
                self.emit(PeerEvent::Error("unsupported inv count encoding".into()))
                    .await;
                return;
            }
            Some(count) => (count as usize, 1),
        };

        for _ in 0..count {
            let Some(vector) = payload.get(offset..offset + 36) else {
                self.emit(PeerEvent::Error("truncated inv vector".into())).await;
                return;
            };
            offset += 36;

            match LittleEndian::read_u32(&vector[..4]) {
                INV_BLOCK => {
                    let hash = hex::encode(&vector[4..]);
                    info!("Block notification {hash}");
                    self.emit(PeerEvent::BlockFound(hash)).await;
                }
                INV_ERROR | INV_TX => {}
                other => debug!("Ignoring inv type {other}"),
            }
        }
    }

    async fn emit(&self, event: PeerEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
