use super::*;

/// Host-side control of a live session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Stage a difficulty, flushed right before the next job notification.
    EnqueueDifficulty(f64),
}

#[derive(Debug, Default)]
struct ShareCounter {
    valid: u64,
    invalid: u64,
}

impl ShareCounter {
    fn total(&self) -> u64 {
        self.valid + self.invalid
    }
}

/// One miner connection: line framing, the subscribe → authorize → submit
/// state machine, the difficulty handshake and ban accounting. Generic over
/// the transport so tests can drive it through in-memory pipes.
pub(crate) struct Session<R, W, H> {
    subscription_id: String,
    settings: Arc<Settings>,
    handler: Arc<H>,
    ban_list: Arc<BanList>,
    event_tx: mpsc::Sender<PoolEvent>,
    socket_addr: SocketAddr,
    remote_ip: IpAddr,
    local_port: u16,
    port_difficulty: f64,
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    job_rx: watch::Receiver<Option<Arc<Notify>>>,
    command_rx: mpsc::Receiver<SessionCommand>,
    cancel_token: CancellationToken,
    current_job: Option<Arc<Notify>>,
    extranonce1: Option<Extranonce>,
    authorized: bool,
    worker_name: Option<String>,
    difficulty: Option<f64>,
    previous_difficulty: Option<f64>,
    pending_difficulty: Option<f64>,
    shares: ShareCounter,
    last_activity: Instant,
    awaiting_proxy_header: bool,
}

impl<R, W, H> Session<R, W, H>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: ShareHandler,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        subscription_id: String,
        settings: Arc<Settings>,
        handler: Arc<H>,
        ban_list: Arc<BanList>,
        event_tx: mpsc::Sender<PoolEvent>,
        socket_addr: SocketAddr,
        local_port: u16,
        port_difficulty: f64,
        reader: R,
        writer: W,
        job_rx: watch::Receiver<Option<Arc<Notify>>>,
        command_rx: mpsc::Receiver<SessionCommand>,
        cancel_token: CancellationToken,
    ) -> Self {
        let awaiting_proxy_header = settings.tcp_proxy_protocol;

        Self {
            subscription_id,
            settings,
            handler,
            ban_list,
            event_tx,
            socket_addr,
            remote_ip: socket_addr.ip(),
            local_port,
            port_difficulty,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            job_rx,
            command_rx,
            cancel_token,
            current_job: None,
            extranonce1: None,
            authorized: false,
            worker_name: None,
            difficulty: None,
            previous_difficulty: None,
            pending_difficulty: None,
            shares: ShareCounter::default(),
            last_activity: Instant::now(),
            awaiting_proxy_header,
        }
    }

    pub(crate) async fn serve(&mut self) -> Result {
        let mut job_rx = self.job_rx.clone();
        self.current_job = job_rx.borrow_and_update().clone();

        let cancel_token = self.cancel_token.clone();
        let connection_timeout = Duration::from_secs(self.settings.connection_timeout.max(1));
        let mut idle_check = tokio::time::interval(connection_timeout / 2);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Disconnecting {}", self.socket_addr);
                    break;
                }

                _ = idle_check.tick() => {
                    if self.last_activity.elapsed() >= connection_timeout {
                        warn!(
                            "Dropping {} - idle for {}s",
                            self.socket_addr,
                            self.last_activity.elapsed().as_secs()
                        );
                        break;
                    }
                }

                command = self.command_rx.recv(), if commands_open => {
                    match command {
                        Some(SessionCommand::EnqueueDifficulty(difficulty)) => {
                            self.enqueue_next_difficulty(difficulty);
                        }
                        None => commands_open = false,
                    }
                }

                changed = job_rx.changed() => {
                    if changed.is_err() {
                        warn!("Job channel dropped, closing {}", self.socket_addr);
                        break;
                    }

                    self.current_job = job_rx.borrow_and_update().clone();

                    if let Some(job) = self.current_job.clone()
                        && self.extranonce1.is_some()
                    {
                        debug!("Broadcast reached {}, sending NOTIFY", self.socket_addr);
                        self.send_mining_job(&job).await?;
                    }
                }

                line = self.reader.next() => {
                    match line {
                        None => {
                            info!("Connection {} closed", self.socket_addr);
                            break;
                        }
                        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                            warn!("Flooded by {}, dropping", self.socket_addr);
                            self.emit(PoolEvent::SocketFlooded { addr: self.socket_addr });
                            break;
                        }
                        Some(Err(err)) => {
                            return Err(anyhow!("read error from {}: {err}", self.socket_addr));
                        }
                        Some(Ok(line)) => {
                            if !self.handle_line(line).await? {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns false when the socket must be destroyed.
    async fn handle_line(&mut self, line: String) -> Result<bool> {
        if self.awaiting_proxy_header {
            self.awaiting_proxy_header = false;

            if line.starts_with("PROXY") {
                match line.split_whitespace().nth(2).and_then(|ip| ip.parse().ok()) {
                    Some(ip) => {
                        debug!("PROXY header rewrote {} to {ip}", self.remote_ip);
                        self.remote_ip = ip;
                    }
                    None => {
                        warn!("Unparseable PROXY header from {}", self.socket_addr);
                        self.emit(PoolEvent::TcpProxyError {
                            addr: self.socket_addr,
                        });
                        return Ok(false);
                    }
                }
                return Ok(self.check_ban());
            }

            // not fronted by a proxy after all; the line is a plain message
            self.emit(PoolEvent::TcpProxyError {
                addr: self.socket_addr,
            });
            if !self.check_ban() {
                return Ok(false);
            }
        }

        let message = match serde_json::from_str::<Message>(&line) {
            Ok(message) => message,
            Err(err) => {
                // a stray PROXY banner on a non-proxy port is dropped silently
                if line.starts_with("PROXY") && !self.settings.tcp_proxy_protocol {
                    return Ok(true);
                }
                warn!(
                    "Malformed message from {}: {err}; line={line:?}",
                    self.socket_addr
                );
                self.emit(PoolEvent::MalformedMessage {
                    addr: self.socket_addr,
                    line,
                });
                return Ok(false);
            }
        };

        let Message::Request { id, method, params } = message else {
            warn!(?message, "Ignoring non-request from {}", self.socket_addr);
            return Ok(true);
        };

        match method.as_str() {
            "mining.subscribe" => {
                debug!("SUBSCRIBE from {} with {params}", self.socket_addr);
                self.subscribe(id, params).await?;
            }
            "mining.authorize" => {
                debug!("AUTHORIZE from {} with {params}", self.socket_addr);
                return self.authorize(id, params).await;
            }
            "mining.submit" => {
                debug!("SUBMIT from {} with {params}", self.socket_addr);
                return self.submit(id, params).await;
            }
            "mining.get_transactions" => {
                self.get_transactions(id).await?;
            }
            _ => {
                warn!("UNKNOWN method {method} from {}", self.socket_addr);
                self.emit(PoolEvent::UnknownStratumMethod {
                    addr: self.socket_addr,
                    method,
                });
            }
        }

        Ok(true)
    }

    async fn subscribe(&mut self, id: Id, params: Value) -> Result {
        let subscribe = serde_json::from_value::<Subscribe>(params)
            .context("failed to deserialize mining.subscribe")?;

        if let Some(suggested) = subscribe.extranonce1 {
            warn!(
                "Ignoring extranonce1 suggestion {suggested} from {}",
                self.socket_addr
            );
        }

        let extranonce1 = Extranonce::random(self.settings.extranonce1_size);

        let result = SubscribeResult {
            subscriptions: vec![
                (
                    "mining.set_difficulty".to_string(),
                    self.subscription_id.clone(),
                ),
                ("mining.notify".to_string(), self.subscription_id.clone()),
            ],
            extranonce1: extranonce1.clone(),
            extranonce2_size: self.settings.extranonce2_size,
        };

        self.send(Message::Response {
            id,
            result: Some(json!(result)),
            error: None,
        })
        .await?;

        self.extranonce1 = Some(extranonce1);

        // the port difficulty rides along with the first job
        self.enqueue_next_difficulty(self.port_difficulty);

        if let Some(job) = self.current_job.clone() {
            self.send_mining_job(&job).await?;
        }

        Ok(())
    }

    async fn authorize(&mut self, id: Id, params: Value) -> Result<bool> {
        let authorize = serde_json::from_value::<Authorize>(params)
            .context("failed to deserialize mining.authorize")?;

        let authorization = self
            .handler
            .authorize(
                self.remote_ip,
                self.local_port,
                &authorize.username,
                authorize.password.as_deref(),
            )
            .await;

        self.authorized = authorization.authorized;
        if self.authorized {
            self.worker_name = Some(authorize.username);
        }

        self.send(Message::Response {
            id,
            result: Some(json!(authorization.authorized)),
            error: authorization.error,
        })
        .await?;

        if authorization.disconnect {
            info!("Authorizer disconnected {}", self.socket_addr);
            return Ok(false);
        }

        Ok(true)
    }

    async fn submit(&mut self, id: Id, params: Value) -> Result<bool> {
        self.last_activity = Instant::now();

        if !self.authorized {
            self.send_error(id, StratumError::Unauthorized).await?;
            return Ok(self.account_share(false));
        }

        let Some(extranonce1) = self.extranonce1.clone() else {
            self.send_error(id, StratumError::NotSubscribed).await?;
            return Ok(self.account_share(false));
        };

        let submit = serde_json::from_value::<Submit>(params)
            .context("failed to deserialize mining.submit")?;

        let share = Share {
            worker_name: submit.username,
            job_id: submit.job_id,
            extranonce1,
            extranonce2: submit.extranonce2,
            ntime: submit.ntime,
            nonce: submit.nonce,
            remote_ip: self.remote_ip,
            local_port: self.local_port,
            difficulty: self.difficulty.unwrap_or(self.port_difficulty),
            previous_difficulty: self.previous_difficulty,
        };

        let outcome = self.handler.submit(share).await;

        if !self.account_share(outcome.accepted) {
            // banned while the handler ran; the ack is never written
            return Ok(false);
        }

        self.send(Message::Response {
            id,
            result: Some(json!(outcome.accepted)),
            error: outcome.error,
        })
        .await?;

        Ok(true)
    }

    async fn get_transactions(&mut self, id: Id) -> Result {
        // the error slot here is a bare `true`, not a code tuple
        self.send_raw(json!({ "id": id, "result": [], "error": true }))
            .await
    }

    /// Counts a share toward the ban ratio. Returns false when the session
    /// crossed the threshold and must be destroyed without replying.
    fn account_share(&mut self, valid: bool) -> bool {
        if !self.settings.banning.enabled {
            return true;
        }

        if valid {
            self.shares.valid += 1;
        } else {
            self.shares.invalid += 1;
        }

        let total = self.shares.total();
        if total < self.settings.banning.check_threshold {
            return true;
        }

        let percent = self.shares.invalid as f64 / total as f64 * 100.0;
        if percent < self.settings.banning.invalid_percent {
            self.shares = ShareCounter::default();
            return true;
        }

        warn!(
            "Banning {} - {percent:.1}% of {total} shares invalid",
            self.remote_ip
        );
        self.ban_list.ban(self.remote_ip);
        self.emit(PoolEvent::TriggerBan {
            ip: self.remote_ip,
            worker: self.worker_name.clone(),
        });

        false
    }

    fn check_ban(&mut self) -> bool {
        match self.ban_list.check(self.remote_ip) {
            BanState::Banned { remaining } => {
                info!(
                    "Kicked banned ip {} ({}s left)",
                    self.remote_ip,
                    remaining.as_secs()
                );
                self.emit(PoolEvent::KickedBannedIp {
                    ip: self.remote_ip,
                    remaining,
                });
                false
            }
            BanState::Expired => {
                self.emit(PoolEvent::ForgaveBannedIp { ip: self.remote_ip });
                true
            }
            BanState::Clear => true,
        }
    }

    fn enqueue_next_difficulty(&mut self, difficulty: f64) {
        self.pending_difficulty = Some(difficulty);
    }

    async fn send_difficulty(&mut self, difficulty: f64) -> Result {
        if self.difficulty == Some(difficulty) {
            return Ok(());
        }

        self.previous_difficulty = self.difficulty;
        self.difficulty = Some(difficulty);

        self.send(Message::Notification {
            method: "mining.set_difficulty".into(),
            params: json!(SetDifficulty(difficulty)),
        })
        .await
    }

    async fn send_mining_job(&mut self, job: &Notify) -> Result {
        if let Some(pending) = self.pending_difficulty.take() {
            self.send_difficulty(pending).await?;
        }

        self.send(Message::Notification {
            method: "mining.notify".into(),
            params: json!(job),
        })
        .await
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }

    async fn send_raw(&mut self, value: Value) -> Result {
        self.writer.send(serde_json::to_string(&value)?).await?;
        Ok(())
    }

    async fn send_error(&mut self, id: Id, error: StratumError) -> Result {
        self.send(Message::Response {
            id,
            result: None,
            error: Some(error.into_response(None)),
        })
        .await
    }

    fn emit(&self, event: PoolEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    };

    struct TestHandler {
        authorized: bool,
        disconnect: bool,
        accept_shares: bool,
    }

    impl Default for TestHandler {
        fn default() -> Self {
            Self {
                authorized: true,
                disconnect: false,
                accept_shares: true,
            }
        }
    }

    #[async_trait]
    impl ShareHandler for TestHandler {
        async fn authorize(
            &self,
            _ip: IpAddr,
            _port: u16,
            _worker: &str,
            _password: Option<&str>,
        ) -> Authorization {
            Authorization {
                authorized: self.authorized,
                error: None,
                disconnect: self.disconnect,
            }
        }

        async fn submit(&self, _share: Share) -> SubmitOutcome {
            if self.accept_shares {
                SubmitOutcome::accept()
            } else {
                SubmitOutcome::reject(StratumError::LowDifficulty)
            }
        }
    }

    struct Harness {
        wire: DuplexStream,
        events: mpsc::Receiver<PoolEvent>,
        job_tx: watch::Sender<Option<Arc<Notify>>>,
        commands: mpsc::Sender<SessionCommand>,
        ban_list: Arc<BanList>,
        session: tokio::task::JoinHandle<Result>,
    }

    fn spawn_session(settings: Settings, handler: TestHandler) -> Harness {
        let settings = Arc::new(settings);
        let ban_list = Arc::new(BanList::new(&settings.banning));
        let (event_tx, events) = mpsc::channel(64);
        let (job_tx, job_rx) = watch::channel(None);
        let (commands, command_rx) = mpsc::channel(8);
        let (wire, session_side) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(session_side);

        let mut session = Session::new(
            "deadbeefcafebabe0100000000000000".into(),
            settings,
            Arc::new(handler),
            ban_list.clone(),
            event_tx,
            "10.1.2.3:52811".parse().unwrap(),
            3032,
            16.0,
            reader,
            writer,
            job_rx,
            command_rx,
            CancellationToken::new(),
        );

        let session = tokio::spawn(async move { session.serve().await });

        Harness {
            wire,
            events,
            job_tx,
            commands,
            ban_list,
            session,
        }
    }

    fn settings() -> Settings {
        Settings::default()
    }

    async fn send_line(harness: &mut Harness, line: &str) {
        harness
            .wire
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn read_line(harness: &mut Harness) -> Value {
        let mut line = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            harness.wire.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        serde_json::from_slice(&line).unwrap()
    }

    fn job() -> Notify {
        BlockTemplate::new(
            JobId::new(1),
            RpcData::default(),
            &TemplateOptions {
                outputs: vec![CoinbaseOutput {
                    value: 50 * COIN_VALUE,
                    script: vec![0x51],
                }],
                ..Default::default()
            },
        )
        .unwrap()
        .job_params()
    }

    #[tokio::test]
    async fn handshake_assigns_extranonce_and_authorizes_in_order() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;

        let subscribe = read_line(&mut harness).await;
        assert_eq!(subscribe["id"], json!(1));
        assert_eq!(subscribe["error"], Value::Null);
        let result = subscribe["result"].as_array().unwrap();
        assert_eq!(
            result[0][0][0], "mining.set_difficulty",
            "first subscription entry"
        );
        assert_eq!(
            result[1].as_str().unwrap().len(),
            8,
            "four extranonce1 bytes as hex"
        );
        assert_eq!(result[2], json!(4));

        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;

        let authorize = read_line(&mut harness).await;
        assert_eq!(authorize["id"], json!(2));
        assert_eq!(authorize["result"], json!(true));
        assert_eq!(authorize["error"], Value::Null);
    }

    #[tokio::test]
    async fn broadcast_flushes_the_staged_difficulty_first() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;

        harness.job_tx.send_replace(Some(Arc::new(job())));

        let set_difficulty = read_line(&mut harness).await;
        assert_eq!(set_difficulty["method"], "mining.set_difficulty");
        assert_eq!(set_difficulty["params"], json!([16.0]));

        let notify = read_line(&mut harness).await;
        assert_eq!(notify["method"], "mining.notify");
        let params = notify["params"].as_array().unwrap();
        assert_eq!(params.len(), 9);
        assert_eq!(params[8], json!(true));
    }

    #[tokio::test]
    async fn retarget_is_staged_until_the_next_job() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;

        harness.job_tx.send_replace(Some(Arc::new(job())));
        read_line(&mut harness).await; // set_difficulty 16
        read_line(&mut harness).await; // notify

        harness
            .commands
            .send(SessionCommand::EnqueueDifficulty(32.0))
            .await
            .unwrap();

        // nothing goes out until a job flushes it; give the command a
        // moment to drain before broadcasting
        sleep(Duration::from_millis(200)).await;
        harness.job_tx.send_replace(Some(Arc::new(job())));

        let set_difficulty = read_line(&mut harness).await;
        assert_eq!(set_difficulty["method"], "mining.set_difficulty");
        assert_eq!(set_difficulty["params"], json!([32.0]));
        assert_eq!(read_line(&mut harness).await["method"], "mining.notify");
    }

    #[tokio::test]
    async fn submit_without_authorization_is_coded_24() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":5,"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}"#,
        )
        .await;

        let reply = read_line(&mut harness).await;
        assert_eq!(reply["error"][0], json!(24));
        assert_eq!(reply["error"][1], json!("unauthorized worker"));
    }

    #[tokio::test]
    async fn submit_without_subscription_is_coded_25() {
        let mut harness = spawn_session(
            settings(),
            TestHandler {
                authorized: true,
                ..Default::default()
            },
        );

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;
        read_line(&mut harness).await;

        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}"#,
        )
        .await;

        let reply = read_line(&mut harness).await;
        assert_eq!(reply["error"][0], json!(25));
        assert_eq!(reply["error"][1], json!("not subscribed"));
    }

    #[tokio::test]
    async fn accepted_submits_are_acked_verbatim() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;
        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;
        read_line(&mut harness).await;

        send_line(
            &mut harness,
            r#"{"id":3,"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}"#,
        )
        .await;

        let reply = read_line(&mut harness).await;
        assert_eq!(reply["id"], json!(3));
        assert_eq!(reply["result"], json!(true));
        assert_eq!(reply["error"], Value::Null);
    }

    #[tokio::test]
    async fn ban_triggers_at_the_threshold() {
        let mut settings = settings();
        settings.banning.check_threshold = 10;
        settings.banning.invalid_percent = 50.0;

        let mut harness = spawn_session(
            settings,
            TestHandler {
                accept_shares: false,
                ..Default::default()
            },
        );

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;
        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;
        read_line(&mut harness).await;

        // nine rejected shares are acked normally
        for i in 0..9 {
            send_line(
                &mut harness,
                &format!(
                    r#"{{"id":{},"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}}"#,
                    10 + i
                ),
            )
            .await;
            let reply = read_line(&mut harness).await;
            assert_eq!(reply["error"][0], json!(23), "share {i}");
        }

        // the tenth crosses the threshold: ban, no reply, socket closed
        send_line(
            &mut harness,
            r#"{"id":99,"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}"#,
        )
        .await;

        harness.session.await.unwrap().unwrap();

        let mut banned = false;
        while let Ok(event) = harness.events.try_recv() {
            if let PoolEvent::TriggerBan { ip, worker } = event {
                assert_eq!(ip, "10.1.2.3".parse::<IpAddr>().unwrap());
                assert_eq!(worker.as_deref(), Some("w"));
                banned = true;
            }
        }
        assert!(banned, "TriggerBan must fire");
        assert!(
            matches!(
                harness.ban_list.check("10.1.2.3".parse().unwrap()),
                BanState::Banned { .. }
            ),
            "ip lands on the ban list"
        );

        // no reply was written for the banning submit
        let mut rest = Vec::new();
        harness.wire.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty(), "got unexpected trailing reply: {rest:?}");
    }

    #[tokio::test]
    async fn mixed_shares_below_the_ratio_reset_the_counter() {
        let mut settings = settings();
        settings.banning.check_threshold = 4;
        settings.banning.invalid_percent = 50.0;

        let mut harness = spawn_session(settings, TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;
        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;
        read_line(&mut harness).await;

        // all four shares are valid; the window resets instead of banning
        for i in 0..4 {
            send_line(
                &mut harness,
                &format!(
                    r#"{{"id":{},"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}}"#,
                    10 + i
                ),
            )
            .await;
            assert_eq!(read_line(&mut harness).await["result"], json!(true));
        }

        assert!(harness.ban_list.is_empty());
    }

    #[tokio::test]
    async fn flooding_destroys_the_socket() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        let flood = vec![b'a'; MAX_MESSAGE_SIZE + 1024];
        harness.wire.write_all(&flood).await.unwrap();

        harness.session.await.unwrap().unwrap();

        let mut flooded = false;
        while let Ok(event) = harness.events.try_recv() {
            if matches!(event, PoolEvent::SocketFlooded { .. }) {
                flooded = true;
            }
        }
        assert!(flooded, "SocketFlooded must fire");
    }

    #[tokio::test]
    async fn malformed_json_destroys_the_socket() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(&mut harness, "this is not json").await;
        harness.session.await.unwrap().unwrap();

        let mut malformed = false;
        while let Ok(event) = harness.events.try_recv() {
            if matches!(event, PoolEvent::MalformedMessage { .. }) {
                malformed = true;
            }
        }
        assert!(malformed, "MalformedMessage must fire");
    }

    #[tokio::test]
    async fn stray_proxy_banner_is_silently_ignored() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(&mut harness, "PROXY TCP4 1.2.3.4 5.6.7.8 1000 2000").await;
        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;

        // the banner neither kills the session nor emits malformedMessage
        let subscribe = read_line(&mut harness).await;
        assert_eq!(subscribe["id"], json!(1));
        assert!(harness.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn proxy_header_rewrites_the_remote_ip() {
        let mut settings = settings();
        settings.tcp_proxy_protocol = true;
        settings.banning.check_threshold = 1;
        settings.banning.invalid_percent = 50.0;

        let mut harness = spawn_session(
            settings,
            TestHandler {
                accept_shares: false,
                ..Default::default()
            },
        );

        send_line(&mut harness, "PROXY TCP4 9.8.7.6 10.0.0.1 3301 3032").await;
        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;
        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;
        read_line(&mut harness).await;

        // one invalid share instantly bans the proxied address
        send_line(
            &mut harness,
            r#"{"id":3,"method":"mining.submit","params":["w","0","00000000","504e86ed","b2957c02"]}"#,
        )
        .await;
        harness.session.await.unwrap().unwrap();

        assert!(
            matches!(
                harness.ban_list.check("9.8.7.6".parse().unwrap()),
                BanState::Banned { .. }
            ),
            "the ban must hit the PROXY-reported source address"
        );
    }

    #[tokio::test]
    async fn unknown_methods_are_reported() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":9,"method":"mining.extranonce.subscribe","params":[]}"#,
        )
        .await;
        send_line(
            &mut harness,
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
        )
        .await;
        read_line(&mut harness).await;

        let mut unknown = None;
        while let Ok(event) = harness.events.try_recv() {
            if let PoolEvent::UnknownStratumMethod { method, .. } = event {
                unknown = Some(method);
            }
        }
        assert_eq!(unknown.as_deref(), Some("mining.extranonce.subscribe"));
    }

    #[tokio::test]
    async fn get_transactions_is_not_implemented() {
        let mut harness = spawn_session(settings(), TestHandler::default());

        send_line(
            &mut harness,
            r#"{"id":7,"method":"mining.get_transactions","params":[]}"#,
        )
        .await;

        let reply = read_line(&mut harness).await;
        assert_eq!(reply["id"], json!(7));
        assert_eq!(reply["result"], json!([]));
        assert_eq!(reply["error"], json!(true));
    }

    #[tokio::test]
    async fn authorizer_disconnect_closes_after_the_reply() {
        let mut harness = spawn_session(
            settings(),
            TestHandler {
                authorized: false,
                disconnect: true,
                ..Default::default()
            },
        );

        send_line(
            &mut harness,
            r#"{"id":2,"method":"mining.authorize","params":["w","p"]}"#,
        )
        .await;

        let reply = read_line(&mut harness).await;
        assert_eq!(reply["result"], json!(false));

        harness.session.await.unwrap().unwrap();
    }
}
