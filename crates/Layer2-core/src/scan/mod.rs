//! Scan - 폴더 스캔 입력과 결과
//!
//! - `options`: 재귀 여부, discardable 처리, 경로 필터
//! - `progress`: 진행 알림과 취소
//! - `report`: 모듈별 결과
//! - `walker`: 로더가 인식하는 후보 수집

mod options;
mod progress;
mod report;
mod walker;

pub use options::ScanOptions;
pub use progress::{CancelFlag, ProgressNotify};
pub use report::{ModuleOutcome, ScanReport};
pub use walker::collect_candidates;
