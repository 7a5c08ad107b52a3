//! Config - 레지스트리 설정 관리
//!
//! - `registry.rs` - RegistryConfig (캐시 위치, 언어, 블록리스트, 지연 언로드)

mod registry;

pub use registry::{RegistryConfig, REGISTRY_CONFIG_FILE};
