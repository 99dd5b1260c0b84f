use super::*;

pub(crate) struct SubscriptionCounter(AtomicU64);

impl SubscriptionCounter {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// A fixed tag followed by the wrapping counter in little-endian hex.
    fn next(&self) -> String {
        let count = self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        format!(
            "{SUBSCRIPTION_ID_PREFIX}{}",
            hex::encode(util::pack_u64_le(count))
        )
    }
}

struct ClientHandle {
    addr: SocketAddr,
    command_tx: mpsc::Sender<SessionCommand>,
}

/// Accepts miners on every configured port, assigns subscription ids, fans
/// jobs out to sessions and enforces the ban list.
pub struct StratumServer<H> {
    settings: Arc<Settings>,
    handler: Arc<H>,
    ban_list: Arc<BanList>,
    clients: DashMap<String, ClientHandle>,
    counter: SubscriptionCounter,
    job_tx: watch::Sender<Option<Arc<Notify>>>,
    event_tx: mpsc::Sender<PoolEvent>,
    rebroadcast: tokio::sync::Notify,
    cancel_token: CancellationToken,
}

impl<H: ShareHandler> StratumServer<H> {
    pub fn new(
        settings: Settings,
        handler: H,
        cancel_token: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<PoolEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (job_tx, _) = watch::channel(None);

        let server = Arc::new(Self {
            ban_list: Arc::new(BanList::new(&settings.banning)),
            settings: Arc::new(settings),
            handler: Arc::new(handler),
            clients: DashMap::new(),
            counter: SubscriptionCounter::new(),
            job_tx,
            event_tx,
            rebroadcast: tokio::sync::Notify::new(),
            cancel_token,
        });

        (server, event_rx)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub fn ban_list(&self) -> &Arc<BanList> {
        &self.ban_list
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_addr(&self, subscription_id: &str) -> Option<SocketAddr> {
        self.clients.get(subscription_id).map(|client| client.addr)
    }

    /// Binds every configured port and serves until cancellation. The bound
    /// addresses are reported through `PoolEvent::Started`.
    pub async fn run(self: Arc<Self>) -> Result {
        let mut listeners = Vec::with_capacity(self.settings.ports.len());
        for port in self.settings.ports.keys() {
            let listener = TcpListener::bind(("0.0.0.0", *port))
                .await
                .with_context(|| format!("failed to bind port {port}"))?;
            listeners.push(listener);
        }

        let addresses: Vec<SocketAddr> = listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect();

        info!("Stratum server listening on {addresses:?}");
        self.emit(PoolEvent::Started { addresses });

        self.clone().spawn_rebroadcast_watch();
        self.clone().spawn_ban_sweeper();

        let mut tasks = JoinSet::new();
        for (listener, port_settings) in listeners.into_iter().zip(self.settings.ports.values()) {
            let server = self.clone();
            let port_difficulty = port_settings.difficulty;
            tasks.spawn(async move { server.accept_loop(listener, port_difficulty).await });
        }

        self.cancel_token.cancelled().await;
        info!("Shutting down stratum server");
        while tasks.join_next().await.is_some() {}

        Ok(())
    }

    /// Publishes a template's cached params to every session and re-arms the
    /// rebroadcast timer.
    pub fn broadcast(&self, template: &BlockTemplate) {
        self.broadcast_job(template.job_params());
    }

    pub fn broadcast_job(&self, params: Notify) {
        debug!("Broadcasting job {}", params.job_id);
        self.job_tx.send_replace(Some(Arc::new(params)));
        self.rebroadcast.notify_one();
    }

    /// Stages a difficulty on a live session; it reaches the miner with its
    /// next job. False when the session is gone.
    pub async fn enqueue_difficulty(&self, subscription_id: &str, difficulty: f64) -> bool {
        let Some(command_tx) = self
            .clients
            .get(subscription_id)
            .map(|client| client.command_tx.clone())
        else {
            return false;
        };

        command_tx
            .send(SessionCommand::EnqueueDifficulty(difficulty))
            .await
            .is_ok()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, port_difficulty: f64) {
        let local_port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            self.accept(stream, addr, local_port, port_difficulty);
                        }
                        Err(err) => warn!("Accept error on port {local_port}: {err}"),
                    }
                }
            }
        }
    }

    fn accept(
        self: &Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        local_port: u16,
        port_difficulty: f64,
    ) {
        // proxied listeners only learn the miner's address from the PROXY
        // header; the session re-checks once it has it
        if !self.settings.tcp_proxy_protocol {
            match self.ban_list.check(addr.ip()) {
                BanState::Banned { remaining } => {
                    info!("Kicked banned ip {addr} ({}s left)", remaining.as_secs());
                    self.emit(PoolEvent::KickedBannedIp {
                        ip: addr.ip(),
                        remaining,
                    });
                    return;
                }
                BanState::Expired => {
                    self.emit(PoolEvent::ForgaveBannedIp { ip: addr.ip() });
                }
                BanState::Clear => {}
            }
        }

        let _ = stream.set_nodelay(true);

        let subscription_id = self.counter.next();
        let (command_tx, command_rx) = mpsc::channel(8);

        self.clients.insert(
            subscription_id.clone(),
            ClientHandle { addr, command_tx },
        );
        self.emit(PoolEvent::ClientConnected {
            subscription_id: subscription_id.clone(),
            addr,
        });
        info!("Session {subscription_id} connected from {addr}");

        let server = self.clone();
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();

            let mut session = session::Session::new(
                subscription_id.clone(),
                server.settings.clone(),
                server.handler.clone(),
                server.ban_list.clone(),
                server.event_tx.clone(),
                addr,
                local_port,
                port_difficulty,
                reader,
                writer,
                server.job_tx.subscribe(),
                command_rx,
                server.cancel_token.child_token(),
            );

            if let Err(err) = session.serve().await {
                error!("Session {subscription_id} error: {err}");
            }

            server.clients.remove(&subscription_id);
            server.emit(PoolEvent::ClientDisconnected {
                subscription_id,
                addr,
            });
        });
    }

    /// Emits `BroadcastTimeout` after the configured span of broadcast
    /// silence, then waits for the next broadcast cycle before re-arming.
    fn spawn_rebroadcast_watch(self: Arc<Self>) {
        tokio::spawn(async move {
            let span = Duration::from_secs(self.settings.job_rebroadcast_timeout.max(1));
            loop {
                tokio::select! {
                    _ = self.cancel_token.cancelled() => break,
                    _ = self.rebroadcast.notified() => {}
                    _ = sleep(span) => {
                        warn!(
                            "No job broadcast for {}s",
                            self.settings.job_rebroadcast_timeout
                        );
                        self.emit(PoolEvent::BroadcastTimeout);

                        tokio::select! {
                            _ = self.cancel_token.cancelled() => break,
                            _ = self.rebroadcast.notified() => {}
                        }
                    }
                }
            }
        });
    }

    fn spawn_ban_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let interval = Duration::from_secs(self.settings.banning.purge_interval.max(1));
            loop {
                tokio::select! {
                    _ = self.cancel_token.cancelled() => break,
                    _ = sleep(interval) => {
                        let purged = self.ban_list.purge();
                        if purged > 0 {
                            info!("Forgave {purged} expired bans");
                        }
                    }
                }
            }
        });
    }

    fn emit(&self, event: PoolEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}
