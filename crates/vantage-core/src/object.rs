// ── System objects ──
//
// A `SystemObject` is identity plus an ordered chain of interfaces.
// Typed wrappers (`Button`, `Load`) hold an `Arc<SystemObject>` and
// route every call through the generic descriptor-driven paths here.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use vantage_api::{CommandClient, InvokeReply, Registry, protocol};

use crate::error::CoreError;
use crate::interface::{Interface, MethodDescriptor, MethodKind, RawFetch, Updates};
use crate::model::{EventKind, ObjectEvent, ObjectRecord, PropertyChange, Value, Vid};

/// Handles shared by every object of one client.
#[derive(Clone)]
pub struct ObjectContext {
    pub(crate) client: CommandClient,
    pub(crate) events: Registry<EventKind, ObjectEvent>,
}

impl ObjectContext {
    pub fn new(client: CommandClient, events: Registry<EventKind, ObjectEvent>) -> Self {
        Self { client, events }
    }

    pub fn client(&self) -> &CommandClient {
        &self.client
    }
}

/// One addressable controller object.
pub struct SystemObject {
    record: ObjectRecord,
    interfaces: Vec<Interface>,
    context: ObjectContext,
    /// Held from a cache write until its events are dispatched.
    commit_lock: Mutex<()>,
}

impl fmt::Debug for SystemObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemObject")
            .field("vid", &self.record.vid)
            .field("type_name", &self.record.type_name)
            .field("interfaces", &self.interface_names())
            .finish_non_exhaustive()
    }
}

impl SystemObject {
    pub fn new(record: ObjectRecord, interfaces: Vec<Interface>, context: ObjectContext) -> Self {
        Self {
            record,
            interfaces,
            context,
            commit_lock: Mutex::new(()),
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn vid(&self) -> Vid {
        self.record.vid
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn type_name(&self) -> &str {
        &self.record.type_name
    }

    pub fn parent(&self) -> Option<Vid> {
        self.record.parent
    }

    pub fn record(&self) -> &ObjectRecord {
        &self.record
    }

    // ── Interfaces ───────────────────────────────────────────────────

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface_names(&self) -> Vec<&'static str> {
        self.interfaces.iter().map(Interface::name).collect()
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name() == name)
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interface(name).is_some()
    }

    /// First cached value of `property` along the interface chain.
    pub fn property(&self, property: &str) -> Option<Value> {
        self.interfaces.iter().find_map(|i| i.property(property))
    }

    /// `(interface, property, value)` for every declared property.
    pub fn properties(&self) -> Vec<(&'static str, &'static str, Option<Value>)> {
        self.interfaces
            .iter()
            .flat_map(|i| {
                let name = i.name();
                i.snapshot().into_iter().map(move |(p, v)| (name, p, v))
            })
            .collect()
    }

    /// Resolve `Interface.Method`, a bare method name, or a wire verb.
    fn resolve(&self, method: &str) -> Result<(&Interface, &MethodDescriptor), CoreError> {
        let found = match method.split_once('.') {
            Some((interface, verb)) => self
                .interface(interface)
                .and_then(|i| i.spec().method(verb).map(|m| (i, m))),
            None => self
                .interfaces
                .iter()
                .find_map(|i| i.spec().method(method).map(|m| (i, m))),
        };
        found.ok_or_else(|| CoreError::UnknownMethod {
            vid: self.vid(),
            method: method.to_owned(),
        })
    }

    // ── Remote calls ─────────────────────────────────────────────────

    /// Call a getter. `hw` selects the hardware verb. The decoded result
    /// is written to the bound cache slot before returning.
    pub async fn get(&self, method: &str, hw: bool) -> Result<Value, CoreError> {
        let (interface, descriptor) = self.resolve(method)?;
        let (value, _) = self.call_getter(interface, descriptor, hw).await?;
        Ok(value)
    }

    /// Call a setter. `sw` selects the cached verb. On success the bound
    /// cache slot takes the written value.
    pub async fn set(&self, method: &str, args: &[Value], sw: bool) -> Result<(), CoreError> {
        let (interface, descriptor) = self.resolve(method)?;
        if descriptor.kind != MethodKind::Setter {
            return Err(CoreError::UnknownMethod {
                vid: self.vid(),
                method: method.to_owned(),
            });
        }
        if args.len() != descriptor.args.len() {
            return Err(CoreError::conversion(format!(
                "{} takes {} argument(s), got {}",
                descriptor.name,
                descriptor.args.len(),
                args.len()
            )));
        }
        let encoded = descriptor
            .args
            .iter()
            .zip(args)
            .map(|(codec, value)| codec.encode(value))
            .collect::<Result<Vec<_>, _>>()?;

        let verb = descriptor.verb_for(sw);
        let reply = self.send(interface, verb, &encoded).await?;
        reply.check_rcode()?;

        if let (Some(property), Some(value)) = (descriptor.property, args.first()) {
            self.commit(interface, |iface| {
                iface.update_properties([(property, value.clone())])
            });
        }
        Ok(())
    }

    /// Untyped passthrough for `Interface.Method` calls with no descriptor.
    pub async fn invoke<S: AsRef<str>>(
        &self,
        method: &str,
        args: &[S],
    ) -> Result<InvokeReply, CoreError> {
        Ok(self
            .context
            .client
            .invoke(self.vid().get(), method, args)
            .await?)
    }

    /// Send an ad hoc command line on the shared command connection.
    pub async fn raw_request(&self, line: &str) -> Result<Vec<String>, CoreError> {
        Ok(self.context.client.raw_request(line).await?)
    }

    async fn send(
        &self,
        interface: &Interface,
        verb: &str,
        args: &[String],
    ) -> Result<InvokeReply, CoreError> {
        let method = format!("{}.{verb}", interface.name());
        Ok(self
            .context
            .client
            .invoke(self.vid().get(), &method, args)
            .await?)
    }

    async fn call_getter(
        &self,
        interface: &Interface,
        descriptor: &MethodDescriptor,
        hw: bool,
    ) -> Result<(Value, Vec<PropertyChange>), CoreError> {
        let codec = match (descriptor.kind, descriptor.result) {
            (MethodKind::Getter, Some(codec)) => codec,
            _ => {
                return Err(CoreError::UnknownMethod {
                    vid: self.vid(),
                    method: descriptor.name.to_owned(),
                });
            }
        };
        let reply = self.send(interface, descriptor.verb_for(hw), &[]).await?;
        let value = codec.decode(&reply.result)?;

        let changed = match descriptor.property {
            Some(property) => self.commit(interface, |iface| {
                iface.update_properties([(property, value.clone())])
            }),
            None => Vec::new(),
        };
        Ok((value, changed))
    }

    // ── State synchronization ────────────────────────────────────────

    /// Refresh every cached property from the controller.
    ///
    /// A failed property is logged and keeps its previous value; the
    /// remaining properties are still fetched.
    pub async fn fetch_state(&self) -> Vec<PropertyChange> {
        let mut changed = Vec::new();
        for interface in &self.interfaces {
            for descriptor in interface.spec().cached_getters() {
                match self.call_getter(interface, descriptor, false).await {
                    Ok((_, mut updates)) => changed.append(&mut updates),
                    Err(e) => warn!(
                        vid = %self.vid(),
                        method = descriptor.name,
                        error = %e,
                        "failed to fetch property"
                    ),
                }
            }

            if let Some(raw) = interface.spec().raw_fetch() {
                match self.raw_fetch(interface, raw).await {
                    Ok(mut updates) => changed.append(&mut updates),
                    Err(e) => warn!(
                        vid = %self.vid(),
                        interface = interface.name(),
                        error = %e,
                        "failed to fetch extended state"
                    ),
                }
            }
        }
        changed
    }

    async fn raw_fetch(
        &self,
        interface: &Interface,
        raw: RawFetch,
    ) -> Result<Vec<PropertyChange>, CoreError> {
        let lines = self.raw_request(&(raw.command)(self.vid())).await?;
        let terminal = lines
            .last()
            .ok_or_else(|| CoreError::Protocol {
                message: "empty response".into(),
            })?;
        let updates = (raw.parse)(self.vid(), &protocol::tokenize(terminal))?;
        Ok(self.commit(interface, |iface| iface.update_properties(updates)))
    }

    /// Apply locally known values to one interface's cache.
    pub fn update_properties(&self, interface: &str, updates: Updates) -> Vec<PropertyChange> {
        let Some(target) = self.interface(interface) else {
            debug!(vid = %self.vid(), interface, "update for missing interface");
            return Vec::new();
        };
        self.commit(target, |iface| iface.update_properties(updates))
    }

    /// Route a pushed category event along the interface chain.
    ///
    /// The first interface that recognizes `category` handles it; an
    /// unrecognized category is a no-op.
    pub fn handle_category_status(&self, category: &str, args: &[String]) -> Vec<PropertyChange> {
        let _commit = self.lock_commit();
        for interface in &self.interfaces {
            let Some(result) = interface.handle_category_status(category, args) else {
                continue;
            };
            return self.settle(interface, category, result);
        }
        Vec::new()
    }

    /// Route an object-status record (`[Interface.Method, result, ...]`).
    pub fn handle_object_status(&self, args: &[String]) -> Vec<PropertyChange> {
        let [method, result, ..] = args else {
            warn!(vid = %self.vid(), ?args, "truncated object status");
            return Vec::new();
        };
        let _commit = self.lock_commit();
        for interface in &self.interfaces {
            let Some(outcome) = interface.handle_object_status(method, result) else {
                continue;
            };
            return self.settle(interface, method, outcome);
        }
        Vec::new()
    }

    fn settle(
        &self,
        interface: &Interface,
        source: &str,
        result: Result<Vec<PropertyChange>, CoreError>,
    ) -> Vec<PropertyChange> {
        match result {
            Ok(changed) => {
                self.publish(interface.name(), changed.clone());
                changed
            }
            Err(e) => {
                warn!(vid = %self.vid(), source, error = %e, "failed to decode status");
                Vec::new()
            }
        }
    }

    /// Run a cache write and publish its changes as one step, so events
    /// for this object go out in the order its caches changed.
    ///
    /// Subscribers run under the commit lock and must not write to the
    /// object that is publishing.
    fn commit(
        &self,
        interface: &Interface,
        update: impl FnOnce(&Interface) -> Vec<PropertyChange>,
    ) -> Vec<PropertyChange> {
        let _commit = self.lock_commit();
        let changed = update(interface);
        self.publish(interface.name(), changed.clone());
        changed
    }

    fn lock_commit(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit one `PropertyChanged` per change.
    fn publish(&self, interface: &'static str, changes: Vec<PropertyChange>) {
        for change in changes {
            let event = ObjectEvent::PropertyChanged {
                vid: self.vid(),
                interface,
                property: change.property,
                old: change.old,
                new: change.new,
            };
            self.context.events.dispatch(&EventKind::PropertyChanged, &event);
        }
    }
}
