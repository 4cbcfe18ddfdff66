// ── Console abstraction ──
//
// Full lifecycle management for a provisioning server session.
// Handles authentication, the initial bulk fetch, command routing and
// the bridge from the progress stream into the progress store.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use via_api::transport::{TlsMode, TransportConfig};
use via_api::{ProgressEvent, ProgressStream, ReconnectConfig, ViaClient};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::{AuthCredentials, ConsoleConfig, TlsVerification};
use crate::convert::convert_all;
use crate::error::CoreError;
use crate::model::{Group, GroupId, Host, HostId, Image, Pool, ProgressRecord};
use crate::progress::ProgressStore;
use crate::reimage;
use crate::store::EntityStore;
use crate::stream::EntityStream;

use via_api::models::{HostForm, PoolForm};

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── RefreshReport ────────────────────────────────────────────────

/// Outcome of a bulk fetch. Records that could not be converted are
/// left out of the store and listed in `rejected`.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub hosts: usize,
    pub groups: usize,
    pub pools: usize,
    pub images: usize,
    pub rejected: Vec<CoreError>,
}

// ── Console ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Manages the session
/// lifecycle, serialises writes through a single command processor and
/// exposes the entity and progress stores for lock-free reads.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    store: Arc<EntityStore>,
    progress: Arc<ProgressStore>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current session; cancelled on disconnect and
    /// replaced on the next connect.
    cancel_child: Mutex<CancellationToken>,
    client: Mutex<Option<Arc<ViaClient>>>,
    progress_stream: Mutex<Option<ProgressStream>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Create a new Console from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to authenticate and start background tasks.
    pub fn new(config: ConsoleConfig) -> Self {
        let store = Arc::new(EntityStore::new());
        let progress = Arc::new(ProgressStore::new(config.merge_policy));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                store,
                progress,
                connection_state,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                client: Mutex::new(None),
                progress_stream: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.inner.store
    }

    pub fn progress(&self) -> &Arc<ProgressStore> {
        &self.inner.progress
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the server.
    ///
    /// Authenticates, performs the initial bulk fetch, seeds the progress
    /// store from persisted host progress and spawns the command
    /// processor (and the progress bridge when enabled).
    pub async fn connect(&self) -> Result<RefreshReport, CoreError> {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        match self.establish().await {
            Ok(report) => {
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Connected);
                info!(
                    url = %self.inner.config.url,
                    hosts = report.hosts,
                    groups = report.groups,
                    "connected"
                );
                Ok(report)
            }
            Err(e) => {
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                *self.inner.client.lock().await = None;
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<RefreshReport, CoreError> {
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let config = &self.inner.config;
        let client = ViaClient::new(config.url.clone(), &build_transport(config))?;

        match &config.auth {
            AuthCredentials::Credentials { username, password } => {
                client.login(username, password).await?;
                debug!(username, "session authentication successful");
            }
            AuthCredentials::Anonymous => debug!("skipping login"),
        }

        *self.inner.client.lock().await = Some(Arc::new(client));

        let report = self.full_refresh().await?;
        self.inner
            .progress
            .seed_from_hosts(self.inner.store.hosts_snapshot().iter());

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let console = self.clone();
            handles.push(tokio::spawn(command_processor_task(console, rx)));
        }

        if config.progress_enabled {
            self.spawn_progress_bridge(&child, &mut handles).await;
        }

        Ok(report)
    }

    async fn spawn_progress_bridge(
        &self,
        cancel: &CancellationToken,
        handles: &mut Vec<JoinHandle<()>>,
    ) {
        let Ok(client) = self.client().await else {
            return;
        };

        let config = &self.inner.config;
        let ws_url = match config.progress_url.clone() {
            Some(u) => u,
            None => match client.websocket_url() {
                Ok(u) => u,
                Err(e) => {
                    warn!(error = %e, "invalid progress stream URL");
                    return;
                }
            },
        };

        let reconnect = ReconnectConfig {
            initial_delay: config.reconnect_initial,
            max_delay: config.reconnect_max,
            max_retries: None,
        };
        let insecure = matches!(config.tls, TlsVerification::DangerAcceptInvalid);
        let stream_cancel = cancel.child_token();

        let stream = match ProgressStream::connect(
            ws_url,
            reconnect,
            stream_cancel.clone(),
            client.cookie_header(),
            insecure,
        ) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "progress stream unavailable (non-fatal)");
                return;
            }
        };

        let mut events = stream.events();
        let console = self.clone();

        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = stream_cancel.cancelled() => break,
                    event = events.next() => {
                        let Some(event) = event else { break };
                        if let Err(e) = console.apply_progress_event(&event).await {
                            warn!(host_id = event.host_id, error = %e, "progress reconciliation failed");
                        }
                    }
                }
            }
        }));

        *self.inner.progress_stream.lock().await = Some(stream);
        info!("progress stream spawned (handshake in progress)");
    }

    /// Disconnect from the server.
    ///
    /// Cancels background tasks, drops the session and resets the
    /// connection state. Store contents are kept until [`EntityStore::reset`].
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        if let Some(stream) = self.inner.progress_stream.lock().await.take() {
            stream.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        *self.inner.client.lock().await = None;

        // Recreate command channel so reconnects can spawn a fresh receiver.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Fetch hosts, groups, pools and images and replace the store's
    /// contents with them.
    pub async fn full_refresh(&self) -> Result<RefreshReport, CoreError> {
        let client = self.client().await?;

        let (host_records, group_records, pool_records, image_records) = tokio::try_join!(
            client.list_hosts(),
            client.list_groups(),
            client.list_pools(),
            client.list_images(),
        )?;

        let (hosts, mut rejected) = convert_all::<_, Host>(host_records);
        let (groups, rejected_groups) = convert_all::<_, Group>(group_records);
        rejected.extend(rejected_groups);
        let pools: Vec<Pool> = pool_records.into_iter().map(Pool::from).collect();
        let images: Vec<Image> = image_records.into_iter().map(Image::from).collect();

        let report = RefreshReport {
            hosts: hosts.len(),
            groups: groups.len(),
            pools: pools.len(),
            images: images.len(),
            rejected,
        };

        self.inner
            .store
            .apply_full_refresh(hosts, groups, pools, images);

        debug!(
            hosts = report.hosts,
            groups = report.groups,
            pools = report.pools,
            images = report.images,
            rejected = report.rejected.len(),
            "full refresh complete"
        );
        Ok(report)
    }

    /// Apply one progress event: merge it into the progress store and,
    /// when it marks completion, queue a refetch behind any pending writes.
    pub async fn apply_progress_event(&self, event: &ProgressEvent) -> Result<(), CoreError> {
        self.inner.progress.apply(event);

        if event.is_completed() {
            self.execute(Command::ReconcileCompleted(HostId(event.host_id)))
                .await?;
        }
        Ok(())
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the server.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    pub(crate) async fn client(&self) -> Result<Arc<ViaClient>, CoreError> {
        self.inner
            .client
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn hosts_snapshot(&self) -> Arc<Vec<Arc<Host>>> {
        self.inner.store.hosts_snapshot()
    }

    pub fn groups_snapshot(&self) -> Arc<Vec<Arc<Group>>> {
        self.inner.store.groups_snapshot()
    }

    pub fn pools_snapshot(&self) -> Arc<Vec<Arc<Pool>>> {
        self.inner.store.pools_snapshot()
    }

    pub fn hosts(&self) -> EntityStream<Host> {
        self.inner.store.subscribe_hosts()
    }

    pub fn groups(&self) -> EntityStream<Group> {
        self.inner.store.subscribe_groups()
    }

    pub fn progress_records(&self) -> EntityStream<ProgressRecord> {
        self.inner.progress.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(console: Console, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = console.inner.cancel_child.lock().await.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let name = envelope.command.name();
                let result = route_command(&console, envelope.command).await;
                if let Err(ref e) = result {
                    warn!(command = name, error = %e, "command failed");
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

/// Route a command to its API call and apply the confirmed result to
/// the store.
async fn route_command(console: &Console, cmd: Command) -> Result<CommandResult, CoreError> {
    let client = console.client().await?;
    let store = &console.inner.store;
    let progress = &console.inner.progress;

    match cmd {
        // ── Host operations ──────────────────────────────────────
        Command::CreateHost(req) => {
            let record = client.create_host(&HostForm::from(&req)).await?;
            let host = Host::try_from(record)?;
            debug!(host_id = host.id.get(), fqdn = %host.fqdn(), "host created");
            Ok(CommandResult::Host(stored_host(store, host)?))
        }

        Command::DeleteHost(id) => {
            client.delete_host(id.get()).await?;
            store.remove_host(id);
            progress.clear(id);
            Ok(CommandResult::Ok)
        }

        // ── Reimage ──────────────────────────────────────────────
        Command::ReimageHost(id) => {
            let host = reimage::start(&client, store, progress, id).await?;
            Ok(CommandResult::Host(host))
        }

        Command::CancelReimage(id) => {
            let host = reimage::cancel(&client, store, progress, id).await?;
            Ok(CommandResult::Host(host))
        }

        Command::ReconcileCompleted(id) => {
            reimage::reconcile_completed(&client, store, id).await?;
            Ok(CommandResult::Ok)
        }

        // ── Group operations ─────────────────────────────────────
        Command::DeleteGroup(id) => {
            ensure_group_empty(store, id)?;
            client.delete_group(id.get()).await?;
            store.remove_group(id);
            Ok(CommandResult::Ok)
        }

        // ── Pool operations ──────────────────────────────────────
        Command::CreatePool(req) => {
            let record = client.create_pool(&PoolForm::from(&req)).await?;
            Ok(CommandResult::Pool(stored_pool(store, Pool::from(record))?))
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

pub(crate) fn stored_host(store: &EntityStore, host: Host) -> Result<Arc<Host>, CoreError> {
    let id = host.id;
    store.upsert_host(host);
    store.host(id).ok_or_else(|| CoreError::not_found("host", id))
}

fn stored_pool(store: &EntityStore, pool: Pool) -> Result<Arc<Pool>, CoreError> {
    let id = pool.id;
    store.upsert_pool(pool);
    store.pool(id).ok_or_else(|| CoreError::not_found("pool", id))
}

/// The backend deletes a group's hosts along with it; refuse instead.
fn ensure_group_empty(store: &EntityStore, id: GroupId) -> Result<(), CoreError> {
    match store.group(id) {
        Some(group) if group.host_count() > 0 => Err(CoreError::InvalidState {
            message: format!(
                "group '{}' still has {} host(s); remove them first",
                group.name,
                group.host_count()
            ),
        }),
        _ => Ok(()),
    }
}

/// Build a [`TransportConfig`] from the console configuration.
fn build_transport(config: &ConsoleConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
        cookie_jar: None, // ViaClient::new adds one automatically
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
