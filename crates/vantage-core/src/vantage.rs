// ── Client facade ──
//
// `Vantage` wires one command client, one event stream, and the
// built-in controllers together, and is what applications hold.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};
use vantage_api::{CommandClient, EventStream, Registry, Subscription};

use crate::config::{ClientConfig, StatusMode};
use crate::controller::{BUTTONS, Controller, ControllerDeps, ENCLOSURES, LOADS, STANDARD};
use crate::discovery::Discovery;
use crate::error::CoreError;
use crate::interface::button::Button;
use crate::interface::load::Load;
use crate::model::{EventKind, ObjectEvent, Vid};
use crate::object::{ObjectContext, SystemObject};
use crate::probe::{EnhancedLogProbe, FixedProbe, StatusProbe, StatusType};
use crate::registry::TypeRegistry;
use crate::snapshot;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<VantageInner>`.
#[derive(Clone)]
pub struct Vantage {
    inner: Arc<VantageInner>,
}

struct VantageInner {
    config: ClientConfig,
    client: CommandClient,
    events: EventStream,
    bus: Registry<EventKind, ObjectEvent>,
    types: TypeRegistry,
    controllers: Vec<Arc<Controller>>,
    snapshot_loaded: AtomicBool,
}

impl fmt::Debug for Vantage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vantage")
            .field("host", &self.inner.config.host)
            .field("controllers", &self.inner.controllers)
            .finish_non_exhaustive()
    }
}

impl Vantage {
    /// Build a client. Does not connect; call
    /// [`initialize`](Self::initialize).
    pub fn new(config: ClientConfig, discovery: Arc<dyn Discovery>) -> Self {
        let probe: Arc<dyn StatusProbe> = match config.status_mode {
            StatusMode::Auto => Arc::new(EnhancedLogProbe::new()),
            StatusMode::EnhancedLog => Arc::new(FixedProbe::new(StatusType::EnhancedLog)),
            StatusMode::Category => Arc::new(FixedProbe::new(StatusType::Category)),
        };
        Self::with_probe(config, discovery, probe)
    }

    /// Build a client with a custom monitoring probe.
    pub fn with_probe(
        config: ClientConfig,
        discovery: Arc<dyn Discovery>,
        probe: Arc<dyn StatusProbe>,
    ) -> Self {
        let transport = config.transport();
        let client = CommandClient::new(transport.clone(), config.command_options());
        let events = EventStream::new(transport, config.event_options());
        let bus = Registry::new();

        let deps = ControllerDeps {
            context: ObjectContext::new(client.clone(), bus.clone()),
            events: events.clone(),
            discovery,
            probe,
            fetch_concurrency: config.fetch_concurrency,
        };
        let controllers = STANDARD
            .iter()
            .map(|definition| Arc::new(Controller::new(definition, deps.clone())))
            .collect();

        Self {
            inner: Arc::new(VantageInner {
                config,
                client,
                events,
                bus,
                types: TypeRegistry::standard(),
                controllers,
                snapshot_loaded: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn command_client(&self) -> &CommandClient {
        &self.inner.client
    }

    pub fn event_stream(&self) -> &EventStream {
        &self.inner.events
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.inner.types
    }

    // ── Controllers ──────────────────────────────────────────────────

    pub fn controllers(&self) -> &[Arc<Controller>] {
        &self.inner.controllers
    }

    pub fn controller(&self, name: &str) -> Option<&Arc<Controller>> {
        self.inner.controllers.iter().find(|c| c.name() == name)
    }

    /// Controller owning objects of `type_name`.
    pub fn controller_for(&self, type_name: &str) -> Option<&Arc<Controller>> {
        let definition = self.inner.types.definition(type_name)?;
        self.controller(definition.name)
    }

    pub fn buttons(&self) -> Vec<Button> {
        self.typed(BUTTONS.name, Button::new)
    }

    pub fn loads(&self) -> Vec<Load> {
        self.typed(LOADS.name, Load::new)
    }

    pub fn enclosures(&self) -> Vec<Arc<SystemObject>> {
        self.typed(ENCLOSURES.name, Some)
    }

    pub fn button(&self, vid: Vid) -> Option<Button> {
        self.controller(BUTTONS.name)?.get(vid).and_then(Button::new)
    }

    pub fn load(&self, vid: Vid) -> Option<Load> {
        self.controller(LOADS.name)?.get(vid).and_then(Load::new)
    }

    fn typed<T>(&self, name: &str, wrap: impl Fn(Arc<SystemObject>) -> Option<T>) -> Vec<T> {
        self.controller(name)
            .map(|c| c.objects().iter().cloned().filter_map(&wrap).collect())
            .unwrap_or_default()
    }

    // ── Registry across controllers ──────────────────────────────────

    pub fn get(&self, vid: Vid) -> Option<Arc<SystemObject>> {
        self.inner.controllers.iter().find_map(|c| c.get(vid))
    }

    pub fn contains(&self, vid: Vid) -> bool {
        self.inner.controllers.iter().any(|c| c.contains(vid))
    }

    /// Every known object. Order is unspecified.
    pub fn objects(&self) -> Vec<Arc<SystemObject>> {
        self.inner
            .controllers
            .iter()
            .flat_map(|c| c.objects().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Register `callback` for events of `kind`.
    ///
    /// Callbacks run synchronously on the task that observed the change
    /// (usually the event stream's read task). Hand long work off to
    /// another task before returning. A `PropertyChanged` callback must
    /// not write to the object it is told about; spawn the write instead.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&ObjectEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(Some(kind), callback)
    }

    /// Register `callback` for every event kind.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ObjectEvent) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        Subscription::merge(
            EventKind::iter()
                .map(|kind| {
                    let callback = Arc::clone(&callback);
                    self.inner
                        .bus
                        .subscribe(Some(kind), move |event| callback(event))
                })
                .collect::<Vec<_>>(),
        )
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Inject every recognized object from the configured snapshot file.
    /// Returns the number of objects injected.
    pub async fn load_snapshot(&self) -> Result<usize, CoreError> {
        let Some(path) = self.inner.config.local_config_file.as_deref() else {
            return Ok(0);
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!(path = %path.display(), "snapshot file not found; using live discovery");
            return Ok(0);
        }

        let records = snapshot::read_objects(path, &self.inner.types).await?;
        let mut injected = 0_usize;
        for record in records {
            let Some(controller) = self.controller_for(&record.type_name) else {
                continue;
            };
            if controller.inject(record)? {
                injected += 1;
            }
        }
        info!(path = %path.display(), injected, "loaded objects from snapshot");
        Ok(injected)
    }

    /// Connect, populate every controller, and optionally fetch state
    /// and enable monitoring.
    ///
    /// Controllers initialize concurrently. Every controller runs to
    /// completion; the first failure is returned afterwards.
    pub async fn initialize(&self, fetch: bool, monitor: bool) -> Result<(), CoreError> {
        self.inner.client.connect().await?;

        if !self.inner.snapshot_loaded.swap(true, Ordering::AcqRel) {
            if let Err(e) = self.load_snapshot().await {
                warn!(error = %e, "failed to load snapshot; falling back to live discovery");
            }
        }

        let results = join_all(
            self.inner
                .controllers
                .iter()
                .map(|c| c.initialize(fetch, monitor)),
        )
        .await;
        first_error(results)
    }

    /// Fetch state for every controller concurrently. Returns the number
    /// of properties that changed.
    pub async fn fetch_state(&self) -> usize {
        join_all(self.inner.controllers.iter().map(|c| c.fetch_state()))
            .await
            .into_iter()
            .sum()
    }

    pub async fn enable_state_monitoring(&self) {
        join_all(
            self.inner
                .controllers
                .iter()
                .map(|c| c.enable_state_monitoring()),
        )
        .await;
    }

    pub async fn disable_state_monitoring(&self) {
        join_all(
            self.inner
                .controllers
                .iter()
                .map(|c| c.disable_state_monitoring()),
        )
        .await;
    }

    /// Stop monitoring and close both connections. In-flight requests
    /// fail with `ConnectionClosed`.
    pub async fn close(&self) {
        self.disable_state_monitoring().await;
        self.inner.events.stop().await;
        self.inner.client.close().await;
        info!(host = %self.inner.config.host, "client closed");
    }
}

fn first_error(results: Vec<Result<(), CoreError>>) -> Result<(), CoreError> {
    results.into_iter().collect()
}
