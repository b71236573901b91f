//! Stateful fake controller for integration tests.
//!
//! Speaks enough of the host command protocol to drive the object
//! runtime end to end: button and load state behind `INVOKE`, LED state
//! behind `GETLED`/`LED`, category and enhanced-log enablement. Every
//! request line is recorded, lines can be pushed to every live
//! connection, and connections can be dropped on demand.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use vantage_api::{ReconnectConfig, TlsMode};
use vantage_core::{ClientConfig, CoreError, Discovery, ObjectRecord, StatusMode};

const BLANK_LED: &str = "0 0 0 0 0 0 0 OFF";

#[derive(Default)]
struct Device {
    buttons: HashMap<u32, String>,
    levels: HashMap<u32, String>,
    leds: HashMap<u32, String>,
}

struct State {
    received: Mutex<Vec<String>>,
    device: Mutex<Device>,
    /// `Interface.Method` names answered with `R:ERROR`.
    failing: Mutex<HashSet<String>>,
    enhanced_log: AtomicBool,
    accepted: AtomicUsize,
    push: broadcast::Sender<String>,
    kill: broadcast::Sender<()>,
}

pub struct FakeController {
    addr: SocketAddr,
    state: Arc<State>,
    handle: JoinHandle<()>,
}

impl FakeController {
    /// Start a controller. `enhanced_log` decides whether `ELENABLE` and
    /// `ELLOG` are accepted.
    pub async fn start(enhanced_log: bool) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push, _) = broadcast::channel(64);
        let (kill, _) = broadcast::channel(4);
        let state = Arc::new(State {
            received: Mutex::new(Vec::new()),
            device: Mutex::new(Device::default()),
            failing: Mutex::new(HashSet::new()),
            enhanced_log: AtomicBool::new(enhanced_log),
            accepted: AtomicUsize::new(0),
            push,
            kill,
        });

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move { serve(stream, &state).await });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Client configuration pointing at this controller.
    pub fn config(&self, status_mode: StatusMode) -> ClientConfig {
        ClientConfig {
            tls: TlsMode::Disabled,
            command_port: Some(self.addr.port()),
            request_timeout: Duration::from_secs(2),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(200),
                max_retries: None,
            },
            status_mode,
            ..ClientConfig::new("127.0.0.1")
        }
    }

    pub fn set_button(&self, vid: u32, ordinal: &str) {
        self.state.device.lock().unwrap().buttons.insert(vid, ordinal.into());
    }

    pub fn set_led(&self, vid: u32, fields: &str) {
        self.state.device.lock().unwrap().leds.insert(vid, fields.into());
    }

    pub fn set_level(&self, vid: u32, level: &str) {
        self.state.device.lock().unwrap().levels.insert(vid, level.into());
    }

    pub fn button(&self, vid: u32) -> Option<String> {
        self.state.device.lock().unwrap().buttons.get(&vid).cloned()
    }

    /// Answer `method` (`Interface.Method`) with `R:ERROR:4`.
    pub fn fail(&self, method: &str) {
        self.state.failing.lock().unwrap().insert(method.into());
    }

    pub fn push(&self, line: &str) {
        let _ = self.state.push.send(line.to_owned());
    }

    pub fn drop_connections(&self) {
        let _ = self.state.kill.send(());
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.received().iter().filter(|l| *l == line).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.received().iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = self.state.kill.send(());
    }
}

async fn serve(stream: TcpStream, state: &State) {
    let (rd, mut wr) = stream.into_split();
    let mut lines = BufReader::new(rd).lines();
    let mut push = state.push.subscribe();
    let mut kill = state.kill.subscribe();

    loop {
        tokio::select! {
            _ = kill.recv() => return,
            Ok(line) = push.recv() => {
                if write(&mut wr, &[line]).await.is_err() {
                    return;
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { return };
                state.received.lock().unwrap().push(line.clone());
                let reply = respond(state, &line);
                if write(&mut wr, &[reply]).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn respond(state: &State, line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["INVOKE", vid, method, args @ ..] => invoke(state, vid, method, args),
        ["GETLED", vid] => {
            let device = state.device.lock().unwrap();
            let fields = vid
                .parse()
                .ok()
                .and_then(|v: u32| device.leds.get(&v).cloned())
                .unwrap_or_else(|| BLANK_LED.to_owned());
            format!("R:GETLED {vid} {fields}")
        }
        ["LED", vid, fields @ ..] => {
            if let Ok(v) = vid.parse() {
                state.device.lock().unwrap().leds.insert(v, fields.join(" "));
            }
            format!("R:{line}")
        }
        ["ELENABLE" | "ELLOG", ..] => {
            if state.enhanced_log.load(Ordering::SeqCst) {
                format!("R:{line}")
            } else {
                "R:ERROR:3 Unknown command".to_owned()
            }
        }
        ["STATUS", category] => format!("R:STATUS {category}"),
        _ => "R:ERROR:1 Unknown command".to_owned(),
    }
}

fn invoke(state: &State, vid: &str, method: &str, args: &[&str]) -> String {
    if state.failing.lock().unwrap().contains(method) {
        return "R:ERROR:4 Invalid Parameter".to_owned();
    }
    let Ok(id) = vid.parse::<u32>() else {
        return "R:ERROR:2 Invalid object".to_owned();
    };
    let mut device = state.device.lock().unwrap();
    let result = match (method, args) {
        ("Button.GetState" | "Button.GetStateHW", []) => {
            device.buttons.get(&id).cloned().unwrap_or_else(|| "0".into())
        }
        ("Button.SetState" | "Button.SetStateSW", [value]) => {
            device.buttons.insert(id, (*value).to_owned());
            "0".into()
        }
        ("Load.GetLevel" | "Load.GetLevelHW", []) => device
            .levels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "0.000".into()),
        ("Load.SetLevel" | "Load.SetLevelSW", [value]) => {
            device.levels.insert(id, (*value).to_owned());
            "0".into()
        }
        _ => return "R:ERROR:2 Invalid method".to_owned(),
    };
    let echoed = args.join(" ");
    if echoed.is_empty() {
        format!("R:INVOKE {vid} {result} {method}")
    } else {
        format!("R:INVOKE {vid} {result} {method} {echoed}")
    }
}

async fn write(wr: &mut OwnedWriteHalf, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        wr.write_all(line.as_bytes()).await?;
        wr.write_all(b"\r\n").await?;
    }
    wr.flush().await
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Discovery doubles ───────────────────────────────────────────────

/// Serves fixed records and remembers which types were requested.
/// Types listed in `failing` fail with a discovery error.
#[derive(Default)]
pub struct RecordingDiscovery {
    records: Vec<ObjectRecord>,
    failing: Vec<&'static str>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl RecordingDiscovery {
    pub fn new(records: Vec<ObjectRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            ..Self::default()
        })
    }

    pub fn failing(records: Vec<ObjectRecord>, failing: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            records,
            failing,
            ..Self::default()
        })
    }

    /// Every requested type, flattened and sorted.
    pub fn requested_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.requests.lock().unwrap().concat();
        types.sort();
        types
    }
}

#[async_trait]
impl Discovery for RecordingDiscovery {
    async fn objects(&self, types: &[&str]) -> Result<Vec<ObjectRecord>, CoreError> {
        self.requests
            .lock()
            .unwrap()
            .push(types.iter().map(|t| (*t).to_owned()).collect());
        if let Some(failed) = types.iter().find(|t| self.failing.contains(t)) {
            return Err(CoreError::Discovery {
                message: format!("{failed} query failed"),
            });
        }
        Ok(self
            .records
            .iter()
            .filter(|r| types.contains(&r.type_name.as_str()))
            .cloned()
            .collect())
    }
}
