// ── Monitoring strategy selection ──
//
// Controllers ask a `StatusProbe` once, when monitoring is first
// enabled, whether to follow the consolidated enhanced log or to arm
// per-category `STATUS` subscriptions.

use async_trait::async_trait;
use serde::Serialize;
use strum::Display;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use vantage_api::EventStream;

/// Enhanced-log type carrying object status records.
pub const STATUS_LOG: &str = "STATUSEX";

/// How pushed state reaches a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StatusType {
    /// Object status records from the enhanced log (`EL:` / `S:STATUS`).
    EnhancedLog,
    /// Per-category pushes (`S:BTN`, `S:LOAD`, ...).
    Category,
}

#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Pick the status type for objects reported through `events`.
    /// The stream is running when this is called.
    async fn status_type(&self, events: &EventStream) -> StatusType;
}

/// Tries to enable the enhanced log once and remembers the verdict.
#[derive(Debug, Default)]
pub struct EnhancedLogProbe {
    verdict: OnceCell<StatusType>,
}

impl EnhancedLogProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusProbe for EnhancedLogProbe {
    async fn status_type(&self, events: &EventStream) -> StatusType {
        *self
            .verdict
            .get_or_init(|| async {
                match events.enable_enhanced_log(STATUS_LOG).await {
                    Ok(()) => {
                        info!("enhanced log available; using object status");
                        StatusType::EnhancedLog
                    }
                    Err(e) => {
                        warn!(error = %e, "enhanced log unavailable; using category status");
                        StatusType::Category
                    }
                }
            })
            .await
    }
}

/// Always answers with one status type.
#[derive(Debug)]
pub struct FixedProbe {
    status_type: StatusType,
    enabled: OnceCell<()>,
}

impl FixedProbe {
    pub fn new(status_type: StatusType) -> Self {
        Self {
            status_type,
            enabled: OnceCell::new(),
        }
    }
}

#[async_trait]
impl StatusProbe for FixedProbe {
    async fn status_type(&self, events: &EventStream) -> StatusType {
        if self.status_type == StatusType::EnhancedLog {
            self.enabled
                .get_or_init(|| async {
                    if let Err(e) = events.enable_enhanced_log(STATUS_LOG).await {
                        warn!(error = %e, "failed to enable enhanced log");
                    }
                })
                .await;
        }
        self.status_type
    }
}
