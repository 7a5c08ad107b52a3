//! Cache - 스캔 캐시와 블록리스트
//!
//! - `key`: 모듈 경로 → SettingsKey
//! - `scan_cache`: 모듈별 클래스 스냅샷
//! - `blocklist`: 로드하지 않을 모듈

mod blocklist;
mod key;
mod scan_cache;

pub use blocklist::{Blocklist, BlocklistEntry};
pub use key::{SettingsKey, BLOCKLIST_URL_SCHEME};
pub use scan_cache::{keys as cache_keys, CachedModule, ScanCache};
