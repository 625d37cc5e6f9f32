//! Unix-socket NDJSON server and client.
//!
//! Every connection starts in request/response mode: one [`Request`] line
//! in, one [`Response`] line out. A `log.subscribe` or `raw.subscribe`
//! call flips the connection into streaming mode, where topic records are
//! pushed to the client as bare NDJSON lines until it unsubscribes or
//! disconnects.

use crate::{error_codes, IpcError, IpcResult, Method, ProcessOutputRecord, RawOutputRecord, Request, Response};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Topic carrying framed output lines ([`ProcessOutputRecord`] JSON).
pub const LOG_TOPIC: &str = "log";
/// Topic carrying raw output chunks ([`RawOutputRecord`] JSON).
pub const RAW_TOPIC: &str = "raw";

const SUBSCRIPTION_CAPACITY: usize = 100;

/// Boxed async handler for one method.
pub type HandlerFn =
    Box<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Streaming topics and their subscribers.
///
/// Topics carry pre-serialized NDJSON lines, so fan-out to N subscribers
/// is N clones of one string rather than N serializations. A laggy
/// subscriber loses its own oldest lines; publication never blocks.
#[derive(Clone)]
pub struct SubscriptionManager {
    senders: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join a topic, creating it if this is the first subscriber.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        let mut senders = self.senders.write().await;
        senders
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CAPACITY).0)
            .subscribe()
    }

    /// Publish a line to a topic's current subscribers, if the topic exists.
    pub async fn broadcast(&self, topic: &str, line: String) {
        if let Some(sender) = self.senders.read().await.get(topic) {
            // No subscribers is fine, the line just goes nowhere.
            let _ = sender.send(line);
        }
    }

    /// Publish a line, creating the topic first when necessary.
    pub async fn broadcast_or_create(&self, topic: &str, line: String) {
        let mut senders = self.senders.write().await;
        let sender = senders
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CAPACITY).0);
        let _ = sender.send(line);
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.senders
            .read()
            .await
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a topic's channel once nobody is left listening.
    pub async fn cleanup(&self, topic: &str) {
        let mut senders = self.senders.write().await;
        if let Some(sender) = senders.get(topic) {
            if sender.receiver_count() == 0 {
                senders.remove(topic);
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The daemon's control server on a Unix domain socket.
pub struct IpcServer {
    socket_path: String,
    handlers: Arc<RwLock<HashMap<Method, HandlerFn>>>,
    shutdown_tx: broadcast::Sender<()>,
    subscriptions: SubscriptionManager,
}

impl IpcServer {
    pub fn new(socket_path: &str) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            socket_path: socket_path.to_string(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Attach the handler for one method. Later registrations replace
    /// earlier ones.
    pub async fn register_handler<F, Fut>(&self, method: Method, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let boxed: HandlerFn = Box::new(move |req| Box::pin(handler(req)));
        self.handlers.write().await.insert(method, boxed);
    }

    /// Topic hub for pushing output lines to streaming subscribers.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Sender side of the shutdown signal, for handlers that stop the
    /// daemon (the `shutdown` method captures this).
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Ask the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the socket and serve until shutdown.
    ///
    /// A stale socket file from a previous run is removed before binding,
    /// and the file is removed again on the way out.
    pub async fn run(&self) -> IpcResult<()> {
        let socket_path = Path::new(&self.socket_path);
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path, "control socket listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handlers = self.handlers.clone();
        let subscriptions = self.subscriptions.clone();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let handlers = handlers.clone();
                            let subscriptions = subscriptions.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, handlers, subscriptions).await {
                                    error!(error = %e, "connection failed");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("control socket shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);

        Ok(())
    }
}

/// Write one response line to the client.
async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> IpcResult<()> {
    let json = response.to_json()?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Serve one client connection until it disconnects or goes streaming.
async fn handle_connection(
    stream: UnixStream,
    handlers: Arc<RwLock<HashMap<Method, HandlerFn>>>,
    subscriptions: SubscriptionManager,
) -> IpcResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    debug!("client connected");

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            debug!("client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(request = %trimmed, "request received");

        let request = match Request::from_json(trimmed) {
            Ok(req) => req,
            Err(e) => {
                // The line never parsed, so there is no id to echo back.
                warn!(error = %e, "unparseable request line");
                let response =
                    Response::error("", error_codes::PARSE_ERROR, &format!("Parse error: {}", e));
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let request_id = request.id.clone();
        let method = request.method.clone();

        let streaming = match method {
            Method::LogSubscribe => Some((LOG_TOPIC, Method::LogUnsubscribe)),
            Method::RawSubscribe => Some((RAW_TOPIC, Method::RawUnsubscribe)),
            _ => None,
        };
        if let Some((topic, unsubscribe)) = streaming {
            // Join the topic before acknowledging, so a line published the
            // moment the client sees the ack cannot fall in a gap.
            let line_rx = subscriptions.subscribe(topic).await;

            let response = Response::success(
                &request_id,
                serde_json::json!({
                    "subscribed": true,
                    "topic": topic,
                }),
            );
            write_response(&mut writer, &response).await?;

            info!(topic = %topic, "client subscribed, connection now streaming");
            stream_topic(reader, writer, &subscriptions, topic, unsubscribe, line_rx).await?;
            return Ok(());
        }

        // An unsubscribe outside streaming mode has nothing to tear down.
        if method == Method::LogUnsubscribe || method == Method::RawUnsubscribe {
            let response = Response::success(
                &request_id,
                serde_json::json!({
                    "unsubscribed": true,
                }),
            );
            write_response(&mut writer, &response).await?;
            continue;
        }

        let response = {
            let handlers = handlers.read().await;
            match handlers.get(&method) {
                Some(handler) => handler(request).await,
                None => Response::error(
                    &request_id,
                    error_codes::METHOD_NOT_FOUND,
                    &format!("Method not found: {:?}", method),
                ),
            }
        };

        debug!(response_id = %response.id, "sending response");
        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

/// Push topic lines to a streaming client until it unsubscribes or the
/// connection drops.
async fn stream_topic(
    mut reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    subscriptions: &SubscriptionManager,
    topic: &str,
    unsubscribe: Method,
    mut line_rx: broadcast::Receiver<String>,
) -> IpcResult<()> {
    let mut line = String::new();

    loop {
        tokio::select! {
            published = line_rx.recv() => {
                match published {
                    Ok(record_line) => {
                        let write = async {
                            writer.write_all(record_line.as_bytes()).await?;
                            writer.write_all(b"\n").await?;
                            writer.flush().await
                        };
                        if write.await.is_err() {
                            debug!("streaming client went away mid-write");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(topic = %topic, "topic closed under subscriber");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // The client keeps its place; only the skipped
                        // lines are gone.
                        warn!(topic = %topic, skipped = n, "slow subscriber lagged");
                    }
                }
            }

            inbound = reader.read_line(&mut line) => {
                match inbound {
                    Ok(0) => {
                        debug!("streaming client disconnected");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            if let Ok(request) = Request::from_json(trimmed) {
                                if request.method == unsubscribe {
                                    debug!(topic = %topic, "client unsubscribed");
                                    let response = Response::success(&request.id, serde_json::json!({
                                        "unsubscribed": true,
                                    }));
                                    if let Ok(json) = response.to_json() {
                                        let _ = writer.write_all(json.as_bytes()).await;
                                        let _ = writer.write_all(b"\n").await;
                                        let _ = writer.flush().await;
                                    }
                                    break;
                                }
                            }
                        }
                        line.clear();
                    }
                    Err(e) => {
                        debug!(error = %e, "streaming client read failed");
                        break;
                    }
                }
            }
        }
    }

    drop(line_rx);
    subscriptions.cleanup(topic).await;
    info!(topic = %topic, "streaming subscription ended");

    Ok(())
}

/// Client side of the daemon socket.
pub struct IpcClient {
    socket_path: String,
}

impl IpcClient {
    pub fn new(socket_path: &str) -> Self {
        Self {
            socket_path: socket_path.to_string(),
        }
    }

    async fn connect(&self) -> IpcResult<UnixStream> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::Socket(format!("Failed to connect: {}", e)))
    }

    /// One request, one response, over a fresh connection.
    pub async fn call(&self, request: Request) -> IpcResult<Response> {
        let (reader, mut writer) = self.connect().await?.into_split();
        let mut reader = BufReader::new(reader);

        let json = request.to_json()?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }

        Ok(Response::from_json(line.trim())?)
    }

    /// Call a parameterless method.
    pub async fn call_method(&self, method: Method) -> IpcResult<Response> {
        self.call(Request::new(method)).await
    }

    /// Call a method with parameters.
    pub async fn call_method_with_params(
        &self,
        method: Method,
        params: serde_json::Value,
    ) -> IpcResult<Response> {
        self.call(Request::with_params(method, params)).await
    }

    /// Whether anything answers `health` on the socket.
    pub async fn is_daemon_running(&self) -> bool {
        self.call_method(Method::Health).await.is_ok()
    }

    /// Open a streaming subscription to the framed-output topic.
    ///
    /// The connection stays dedicated to the stream until the returned
    /// subscription is unsubscribed or dropped.
    pub async fn subscribe_logs(&self) -> IpcResult<StreamingSubscription> {
        self.subscribe_topic(Method::LogSubscribe, Method::LogUnsubscribe)
            .await
    }

    /// Open a streaming subscription to the raw-chunk topic.
    pub async fn subscribe_raw(&self) -> IpcResult<StreamingSubscription> {
        self.subscribe_topic(Method::RawSubscribe, Method::RawUnsubscribe)
            .await
    }

    async fn subscribe_topic(
        &self,
        subscribe: Method,
        unsubscribe: Method,
    ) -> IpcResult<StreamingSubscription> {
        let (reader, mut writer) = self.connect().await?.into_split();
        let mut reader = BufReader::new(reader);

        let request = Request::new(subscribe);
        let json = request.to_json()?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }

        let response = Response::from_json(line.trim())?;
        if !response.is_success() {
            return Err(IpcError::Protocol(format!(
                "Subscribe failed: {}",
                response.error.map(|e| e.message).unwrap_or_default()
            )));
        }

        Ok(StreamingSubscription {
            unsubscribe,
            reader,
            writer,
            line_buffer: String::new(),
        })
    }
}

/// An open streaming subscription.
///
/// Call [`recv_output`](Self::recv_output) or
/// [`recv_raw_chunk`](Self::recv_raw_chunk) to block for the next record;
/// unsubscribe or drop to end the stream.
pub struct StreamingSubscription {
    unsubscribe: Method,
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line_buffer: String,
}

impl StreamingSubscription {
    /// Next NDJSON line from the stream, or `None` once it has closed.
    pub async fn recv_line(&mut self) -> Option<String> {
        loop {
            self.line_buffer.clear();
            match self.reader.read_line(&mut self.line_buffer).await {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = self.line_buffer.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(trimmed.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "subscription read failed");
                    return None;
                }
            }
        }
    }

    /// Next framed-output record; unparseable lines are logged and skipped.
    pub async fn recv_output(&mut self) -> Option<ProcessOutputRecord> {
        while let Some(line) = self.recv_line().await {
            match ProcessOutputRecord::from_json(&line) {
                Ok(record) => return Some(record),
                Err(e) => warn!(error = %e, "skipping unparseable output record"),
            }
        }
        None
    }

    /// Next raw-chunk record; unparseable lines are logged and skipped.
    pub async fn recv_raw_chunk(&mut self) -> Option<RawOutputRecord> {
        while let Some(line) = self.recv_line().await {
            match RawOutputRecord::from_json(&line) {
                Ok(record) => return Some(record),
                Err(e) => warn!(error = %e, "skipping unparseable raw record"),
            }
        }
        None
    }

    /// Tell the server to stop the stream, then close.
    pub async fn unsubscribe(mut self) -> IpcResult<()> {
        let request = Request::new(self.unsubscribe.clone());
        let json = request.to_json()?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
