// ── Object controllers ──
//
// One controller per object family. A controller owns the registry of
// its objects, populates it from discovery or injection, fetches state,
// and routes pushed status into object caches.
//
//   Uninitialized ─initialize/inject─▶ Populated ─enable─▶ Monitoring
//                                          ▲                  │
//                                          └──── Disabled ◀───┘

mod definitions;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, trace};
use vantage_api::{EventStream, STATUS_CATEGORY, StatusEvent, Subscription};

pub use self::definitions::{BUTTONS, ControllerDefinition, ENCLOSURES, LOADS, STANDARD};
use crate::discovery::Discovery;
use crate::error::CoreError;
use crate::model::{ObjectEvent, ObjectRecord, Vid};
use crate::object::{ObjectContext, SystemObject};
use crate::probe::{StatusProbe, StatusType};
use crate::store::ObjectCollection;

// ── ControllerState ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControllerState {
    Uninitialized,
    Populated,
    Monitoring,
    Disabled,
}

/// Shared collaborators handed to every controller of one client.
#[derive(Clone)]
pub struct ControllerDeps {
    pub context: ObjectContext,
    pub events: EventStream,
    pub discovery: Arc<dyn Discovery>,
    pub probe: Arc<dyn StatusProbe>,
    pub fetch_concurrency: usize,
}

struct Monitoring {
    status_type: StatusType,
    subscription: Subscription,
}

// ── Controller ───────────────────────────────────────────────────────

pub struct Controller {
    definition: &'static ControllerDefinition,
    objects: Arc<ObjectCollection<SystemObject>>,
    deps: ControllerDeps,
    /// Types populated by injection; discovery skips them.
    injected: StdMutex<HashSet<String>>,
    discovered: AtomicBool,
    state: watch::Sender<ControllerState>,
    monitoring: Mutex<Option<Monitoring>>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.definition.name)
            .field("objects", &self.objects.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(definition: &'static ControllerDefinition, deps: ControllerDeps) -> Self {
        let (state, _) = watch::channel(ControllerState::Uninitialized);
        Self {
            definition,
            objects: Arc::new(ObjectCollection::new()),
            deps,
            injected: StdMutex::new(HashSet::new()),
            discovered: AtomicBool::new(false),
            state,
            monitoring: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn definition(&self) -> &'static ControllerDefinition {
        self.definition
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub fn get(&self, vid: Vid) -> Option<Arc<SystemObject>> {
        self.objects.get(vid)
    }

    pub fn contains(&self, vid: Vid) -> bool {
        self.objects.contains(vid)
    }

    /// All owned objects. Order is unspecified.
    pub fn objects(&self) -> Arc<Vec<Arc<SystemObject>>> {
        self.objects.snapshot()
    }

    /// Watch the object set as it grows.
    pub fn watch_objects(&self) -> watch::Receiver<Arc<Vec<Arc<SystemObject>>>> {
        self.objects.subscribe()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // ── Population ───────────────────────────────────────────────────

    /// Pre-populate one object, typically from an offline snapshot.
    ///
    /// The record's type is marked as populated, so a later
    /// [`initialize`](Self::initialize) does not discover it live.
    /// Returns `false` if an object with the same id already exists.
    pub fn inject(&self, record: ObjectRecord) -> Result<bool, CoreError> {
        if !self.definition.handles(&record.type_name) {
            return Err(CoreError::Discovery {
                message: format!(
                    "{} controller does not handle type {}",
                    self.name(),
                    record.type_name
                ),
            });
        }
        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.type_name.clone());
        Ok(self.add(record))
    }

    fn add(&self, record: ObjectRecord) -> bool {
        let vid = record.vid;
        let type_name = record.type_name.clone();
        let object = SystemObject::new(
            record,
            self.definition.build_interfaces(),
            self.deps.context.clone(),
        );
        let added = self.objects.insert(vid, Arc::new(object));
        if added {
            self.mark_populated();
            let event = ObjectEvent::ObjectAdded { vid, type_name };
            self.deps.context.events.dispatch(&event.kind(), &event);
        }
        added
    }

    fn mark_populated(&self) {
        self.state.send_if_modified(|state| {
            let advance = *state == ControllerState::Uninitialized;
            if advance {
                *state = ControllerState::Populated;
            }
            advance
        });
    }

    fn pending_types(&self) -> Vec<&'static str> {
        let injected = self.injected.lock().unwrap_or_else(PoisonError::into_inner);
        self.definition
            .vantage_types
            .iter()
            .copied()
            .filter(|t| !injected.contains(*t))
            .collect()
    }

    /// Populate from discovery, then optionally fetch and monitor.
    ///
    /// Types already populated by injection are not discovered. Discovery
    /// runs once per controller; later calls only fetch and monitor.
    pub async fn initialize(&self, fetch: bool, monitor: bool) -> Result<(), CoreError> {
        if !self.discovered.load(Ordering::Acquire) {
            let types = self.pending_types();
            if types.is_empty() {
                debug!(controller = self.name(), "populated by injection; skipping discovery");
            } else {
                let records = self.deps.discovery.objects(&types).await?;
                let mut added = 0_usize;
                for record in records {
                    if types.contains(&record.type_name.as_str()) && self.add(record) {
                        added += 1;
                    }
                }
                debug!(controller = self.name(), added, "discovered objects");
            }
            self.discovered.store(true, Ordering::Release);
            self.mark_populated();
        }

        if fetch {
            self.fetch_state().await;
        }
        if monitor {
            self.enable_state_monitoring().await;
        }
        Ok(())
    }

    // ── State ────────────────────────────────────────────────────────

    /// Fetch state for every object, a bounded number at a time.
    /// Returns the number of properties that changed.
    pub async fn fetch_state(&self) -> usize {
        let objects = self.objects.snapshot();
        let limit = self.deps.fetch_concurrency.max(1);
        let changed = stream::iter(objects.iter().cloned())
            .map(|object| async move { object.fetch_state().await.len() })
            .buffer_unordered(limit)
            .fold(0, |total, n| async move { total + n })
            .await;
        debug!(
            controller = self.name(),
            objects = objects.len(),
            changed,
            "fetched state"
        );
        changed
    }

    // ── Monitoring ───────────────────────────────────────────────────

    /// Status type chosen by the active monitoring, if any.
    pub async fn status_type(&self) -> Option<StatusType> {
        self.monitoring.lock().await.as_ref().map(|m| m.status_type)
    }

    /// Subscribe to pushed status for this controller's objects.
    ///
    /// Idempotent: a second call without an intervening
    /// [`disable_state_monitoring`](Self::disable_state_monitoring) keeps
    /// the existing subscriptions.
    pub async fn enable_state_monitoring(&self) -> Option<StatusType> {
        let mut monitoring = self.monitoring.lock().await;
        if let Some(active) = monitoring.as_ref() {
            return Some(active.status_type);
        }

        let has_interfaces = !(self.definition.interfaces)().is_empty();
        if !has_interfaces {
            self.state.send_replace(ControllerState::Monitoring);
            return None;
        }

        self.deps.events.start();
        let status_type = self.deps.probe.status_type(&self.deps.events).await;

        let mut categories = self.definition.categories(status_type);
        if status_type == StatusType::EnhancedLog {
            categories.insert(0, STATUS_CATEGORY);
        }

        let subscriptions = categories.iter().map(|category| {
            let objects = Arc::clone(&self.objects);
            self.deps
                .events
                .subscribe_status(move |event| route(&objects, event), category)
        });
        let subscription = Subscription::merge(subscriptions.collect::<Vec<_>>());

        info!(
            controller = self.name(),
            %status_type,
            ?categories,
            "state monitoring enabled"
        );
        *monitoring = Some(Monitoring {
            status_type,
            subscription,
        });
        self.state.send_replace(ControllerState::Monitoring);
        Some(status_type)
    }

    /// Drop every status subscription. Cached state is kept.
    pub async fn disable_state_monitoring(&self) {
        let mut monitoring = self.monitoring.lock().await;
        if let Some(active) = monitoring.take() {
            active.subscription.unsubscribe();
            debug!(controller = self.name(), "state monitoring disabled");
        }
        if self.state() == ControllerState::Monitoring {
            self.state.send_replace(ControllerState::Disabled);
        }
    }
}

/// Deliver one pushed event to the object it names.
fn route(objects: &ObjectCollection<SystemObject>, event: &StatusEvent) {
    let Some(object) = objects.get(Vid::new(event.vid)) else {
        trace!(vid = event.vid, category = %event.category, "status for unowned object");
        return;
    };
    let changed = if event.category == STATUS_CATEGORY {
        object.handle_object_status(&event.args)
    } else {
        object.handle_category_status(&event.category, &event.args)
    };
    trace!(vid = event.vid, category = %event.category, changed = changed.len(), "status routed");
}
