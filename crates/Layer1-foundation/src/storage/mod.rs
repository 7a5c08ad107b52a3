//! Storage module for PlugForge
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `settings`: 섹션 단위 영속 설정 (스캔 캐시, 블록리스트)

mod json;
mod settings;

// JSON Storage (범용)
pub use json::JsonStore;

// Settings (섹션 저장소)
pub use settings::Settings;
