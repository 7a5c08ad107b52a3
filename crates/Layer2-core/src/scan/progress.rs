//! Progress - 스캔 진행 알림과 취소

use std::sync::atomic::{AtomicBool, Ordering};

/// 진행 상황 알림
///
/// 스캔은 모듈 하나를 처리할 때마다 `set_text` / `update_progress` 를 호출하고
/// `is_canceled` 가 `true` 이면 남은 모듈을 건너뛴다.
pub trait ProgressNotify: Send + Sync {
    fn set_text(&self, _text: &str) {}

    /// 0.0 ~ 1.0
    fn update_progress(&self, _fraction: f64) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// 취소만 지원하는 간단한 구현
#[derive(Debug, Default)]
pub struct CancelFlag {
    canceled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }
}

impl ProgressNotify for CancelFlag {
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}
