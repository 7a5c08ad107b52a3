//! Error types for PlugForge
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// PlugForge 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    /// 캐시 엔트리가 자기 일관성 검사를 통과하지 못함 (내부용, 재스캔으로 복구)
    #[error("Invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    // ========================================================================
    // 클래스 / 모듈 관련
    // ========================================================================
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Failed to load module: {path} - {message}")]
    LoadFailure { path: String, message: String },

    #[error("Failed to create instance of {0}")]
    InstanceCreation(String),

    #[error("Interface not supported by {0}")]
    InterfaceNotSupported(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Wrong execution context: {0}")]
    WrongThread(String),

    #[error("Not applicable: {0}")]
    NotApplicable(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재스캔 등으로 복구 가능한 에러인지 확인
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidCacheEntry(_) | Error::LoadFailure { .. } | Error::Storage(_)
        )
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::ClassNotFound(_)
                | Error::NotFound(_)
                | Error::AlreadyRegistered(_)
                | Error::InvalidInput(_)
                | Error::NotApplicable(_)
                | Error::Cancelled
        )
    }

    /// 모듈 로드 실패 에러 생성 헬퍼
    pub fn load_failure(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Error::LoadFailure {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
