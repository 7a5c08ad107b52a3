//! Deferred Unloads - 지연 언로드 대기열
//!
//! 인스턴스 수가 0 이 된 모듈은 즉시 언로드하지 않고 대기열에 넣는다.
//! 첫 예약 시점에 마감 시각이 정해지고, 그 창 안에서 예약된 모듈은 모두 한 번에 처리된다.

use super::CodeModule;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[derive(Default)]
struct PendingState {
    modules: Vec<Arc<CodeModule>>,
    deadline: Option<Instant>,
}

/// 지연 언로드 대기열
pub struct DeferredUnloads {
    state: Mutex<PendingState>,
    delay: Duration,
    main_thread: ThreadId,
    wake: Notify,
}

impl DeferredUnloads {
    /// 현재 스레드를 메인 실행 컨텍스트로 기록하여 생성
    pub fn new(delay: Duration) -> Self {
        Self {
            state: Mutex::new(PendingState::default()),
            delay,
            main_thread: thread::current().id(),
            wake: Notify::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 현재 스레드가 메인 실행 컨텍스트인지
    pub fn is_main_context(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    /// 언로드 예약. 이미 대기 중이면 무시
    pub fn schedule(&self, module: Arc<CodeModule>) {
        let mut state = self.state.lock();
        if state.modules.iter().any(|m| Arc::ptr_eq(m, &module)) {
            return;
        }
        debug!("Deferring unload of {}", module.name());
        state.modules.push(module);
        if state.deadline.is_none() {
            state.deadline = Some(Instant::now() + self.delay);
        }
        drop(state);
        self.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().modules.is_empty()
    }

    pub fn contains(&self, module: &Arc<CodeModule>) -> bool {
        self.state
            .lock()
            .modules
            .iter()
            .any(|m| Arc::ptr_eq(m, module))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.lock().deadline
    }

    /// 마감 시각이 지났으면 대기열 전체를 꺼낸다
    pub fn take_due(&self, now: Instant) -> Vec<Arc<CodeModule>> {
        let mut state = self.state.lock();
        match state.deadline {
            Some(deadline) if deadline <= now => {
                state.deadline = None;
                std::mem::take(&mut state.modules)
            }
            _ => Vec::new(),
        }
    }

    /// 마감 시각과 무관하게 대기열 전체를 꺼낸다
    pub fn take_all(&self) -> Vec<Arc<CodeModule>> {
        let mut state = self.state.lock();
        state.deadline = None;
        std::mem::take(&mut state.modules)
    }

    /// 조건에 맞는 모듈을 대기열에서 제거
    pub fn remove_where(&self, predicate: impl Fn(&CodeModule) -> bool) {
        let mut state = self.state.lock();
        state.modules.retain(|m| !predicate(m));
        if state.modules.is_empty() {
            state.deadline = None;
        }
    }

    /// 마감 시각까지 대기 (대기열이 비어 있으면 다음 예약까지 대기)
    pub async fn wait_due(&self) {
        loop {
            match self.deadline() {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    return;
                }
                None => self.wake.notified().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookList;
    use crate::module::{CodeLoader, CodeResource, ModuleKind};
    use plugforge_foundation::{Error, Result};
    use std::path::{Path, PathBuf};

    struct NoLoader;

    impl CodeLoader for NoLoader {
        fn kind(&self) -> ModuleKind {
            ModuleKind::Native
        }

        fn is_code_resource(&self, _path: &Path) -> bool {
            false
        }

        fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>> {
            Err(Error::load_failure(path, "not loadable"))
        }
    }

    fn module(unloads: &Arc<DeferredUnloads>, name: &str) -> Arc<CodeModule> {
        Arc::new(CodeModule::new(
            PathBuf::from(format!("/plugins/{}", name)),
            Arc::new(NoLoader),
            Arc::new(HookList::new()),
            unloads.clone(),
        ))
    }

    #[test]
    fn test_batch_shares_first_deadline() {
        let unloads = Arc::new(DeferredUnloads::new(Duration::from_millis(1000)));
        let a = module(&unloads, "a.so");
        let b = module(&unloads, "b.so");

        unloads.schedule(a.clone());
        let deadline = unloads.deadline().unwrap();
        unloads.schedule(b.clone());
        unloads.schedule(a.clone());

        assert_eq!(unloads.len(), 2);
        assert_eq!(unloads.deadline(), Some(deadline));

        assert!(unloads.take_due(deadline - Duration::from_millis(1)).is_empty());
        let due = unloads.take_due(deadline);
        assert_eq!(due.len(), 2);
        assert!(unloads.is_empty());
        assert!(unloads.deadline().is_none());
    }

    #[test]
    fn test_remove_where_clears_deadline() {
        let unloads = Arc::new(DeferredUnloads::new(Duration::from_millis(10)));
        let a = module(&unloads, "a.so");
        unloads.schedule(a.clone());
        unloads.remove_where(|m| m.name() == "a.so");
        assert!(unloads.is_empty());
        assert!(unloads.deadline().is_none());
    }

    #[test]
    fn test_main_context_is_creator_thread() {
        let unloads = Arc::new(DeferredUnloads::new(Duration::from_millis(10)));
        assert!(unloads.is_main_context());
        let other = unloads.clone();
        let on_worker = std::thread::spawn(move || other.is_main_context())
            .join()
            .unwrap();
        assert!(!on_worker);
    }
}
