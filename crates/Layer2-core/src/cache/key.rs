//! Settings Key - 모듈 경로에서 파생된 안정적인 캐시 키

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// 블록리스트 URL 프로토콜
pub const BLOCKLIST_URL_SCHEME: &str = "blocklist";

/// 모듈 하나의 캐시/블록리스트 섹션 키
///
/// 정규화된 경로의 SHA-256 앞 16바이트를 소문자 hex 로 표현한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsKey(String);

impl SettingsKey {
    pub fn for_path(path: &Path) -> Self {
        let normalized = normalize_path(path);
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(&digest[..16]))
    }

    /// 이미 해시된 키 (저장된 섹션 이름, 블록리스트 URL 등)
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `blocklist://<key>`
    pub fn blocklist_url(&self) -> String {
        format!("{}://{}", BLOCKLIST_URL_SCHEME, self.0)
    }

    pub fn from_blocklist_url(url: &str) -> Option<Self> {
        let key = url
            .strip_prefix(BLOCKLIST_URL_SCHEME)?
            .strip_prefix("://")?
            .trim_end_matches('/');
        (!key.is_empty()).then(|| Self(key.to_string()))
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 키 계산용 경로 정규화
fn normalize_path(path: &Path) -> String {
    let absolute: PathBuf = std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    });

    let text = absolute.to_string_lossy().replace('\\', "/");
    if cfg!(windows) {
        text.to_lowercase()
    } else {
        text
    }
}
