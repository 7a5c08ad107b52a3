//! # plugforge-foundation
//!
//! Foundation layer for PlugForge:
//! - Error: 공통 에러 타입
//! - Attributes: 타입이 있는 속성 맵 (클래스 속성, 캐시 섹션)
//! - Storage: JsonStore (범용), Settings (섹션 단위 영속 설정)
//! - Config: RegistryConfig
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ClassRegistry (plugforge-core)              │
//! │     │                    │                   │
//! │     ▼                    ▼                   │
//! │  Scan Cache          Blocklist               │
//! │  (Settings)          (Settings)              │
//! │     └────────┬───────────┘                   │
//! │              ▼                               │
//! │          JsonStore                           │
//! └──────────────────────────────────────────────┘
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Attributes (속성 맵)
// ============================================================================
pub use attributes::{AttrValue, Attributes};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{RegistryConfig, REGISTRY_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonStore, Settings};
