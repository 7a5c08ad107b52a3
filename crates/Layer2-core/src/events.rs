//! Registry Events - 레지스트리 시그널
//!
//! 카테고리 변경, 블록리스트 초기화, 모듈 로드/언로드 등을 구독자에게 브로드캐스트한다.

use crate::hooks::LoaderHook;
use crate::module::CodeModule;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

// ============================================================================
// RegistryEvent
// ============================================================================

/// 레지스트리 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// 이벤트 타입
    pub event_type: EventType,

    /// 이벤트 데이터
    pub data: Value,

    /// 타임스탬프
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// 소스 (이벤트 발생 위치)
    pub source: String,
}

impl RegistryEvent {
    pub fn new(event_type: EventType, data: Value, source: impl Into<String>) -> Self {
        Self {
            event_type,
            data,
            timestamp: chrono::Utc::now(),
            source: source.into(),
        }
    }

    /// 데이터 없는 이벤트
    pub fn simple(event_type: EventType) -> Self {
        Self::new(event_type, Value::Null, "registry")
    }

    /// 카테고리 변경 이벤트
    pub fn category_changed(category: &str) -> Self {
        Self::new(
            EventType::ClassCategoryChanged,
            serde_json::json!({ "category": category }),
            "registry",
        )
    }

    /// `ClassCategoryChanged` 이벤트의 카테고리
    pub fn category(&self) -> Option<&str> {
        self.data.get("category").and_then(Value::as_str)
    }

    /// 모듈 이벤트의 경로
    pub fn path(&self) -> Option<&str> {
        self.data.get("path").and_then(Value::as_str)
    }
}

/// 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // 클래스 이벤트
    ClassCategoryChanged,

    // 블록리스트 이벤트
    ResetBlocklistDone,

    // 모듈 이벤트
    ModuleLoaded,
    ModuleUnloaded,

    // 시스템 이벤트
    TerminatePlugins,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassCategoryChanged => write!(f, "class_category_changed"),
            Self::ResetBlocklistDone => write!(f, "reset_blocklist_done"),
            Self::ModuleLoaded => write!(f, "module_loaded"),
            Self::ModuleUnloaded => write!(f, "module_unloaded"),
            Self::TerminatePlugins => write!(f, "terminate_plugins"),
        }
    }
}

// ============================================================================
// SignalBus - 동기 발행 / 비동기 구독
// ============================================================================

/// 시그널 버스
///
/// 발행은 동기이며 레지스트리 락을 잡은 채로 호출되지 않는다.
pub struct SignalBus {
    sender: broadcast::Sender<RegistryEvent>,
    history: Mutex<Vec<RegistryEvent>>,
    history_size: usize,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::with_capacity(256, 64)
    }

    pub fn with_capacity(channel_capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            history: Mutex::new(Vec::with_capacity(history_size)),
            history_size,
        }
    }

    /// 이벤트 발행
    pub fn publish(&self, event: RegistryEvent) {
        debug!("Publishing event: {}", event.event_type);

        {
            let mut history = self.history.lock();
            if history.len() >= self.history_size {
                history.remove(0);
            }
            history.push(event.clone());
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// 최근 이벤트
    pub fn history(&self) -> Vec<RegistryEvent> {
        self.history.lock().clone()
    }

    pub fn history_by_type(&self, event_type: EventType) -> Vec<RegistryEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ModuleSignalHook - 모듈 로드/언로드를 시그널로 전달
// ============================================================================

pub(crate) struct ModuleSignalHook {
    bus: Arc<SignalBus>,
}

impl ModuleSignalHook {
    pub(crate) fn new(bus: Arc<SignalBus>) -> Self {
        Self { bus }
    }

    fn module_event(event_type: EventType, module: &CodeModule) -> RegistryEvent {
        RegistryEvent::new(
            event_type,
            serde_json::json!({
                "path": module.path().display().to_string(),
                "kind": module.kind().as_str(),
            }),
            "module",
        )
    }
}

impl LoaderHook for ModuleSignalHook {
    fn on_load(&self, module: &CodeModule) {
        self.bus
            .publish(Self::module_event(EventType::ModuleLoaded, module));
    }

    fn on_unload(&self, module: &CodeModule) {
        self.bus
            .publish(Self::module_event(EventType::ModuleUnloaded, module));
    }
}
