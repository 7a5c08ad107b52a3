//! Code Loader - 모듈 종류별 로더

use super::CodeResource;
use plugforge_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// ModuleKind
// ============================================================================

/// 모듈 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// 네이티브 동적 라이브러리
    Native,
    /// 스크립트 패키지
    Script,
    /// 정적으로 링크된 코어 모듈
    Core,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Script => "script",
            Self::Core => "core",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "script" => Ok(Self::Script),
            "core" => Ok(Self::Core),
            other => Err(Error::InvalidInput(format!("Unknown module kind: {}", other))),
        }
    }
}

// ============================================================================
// CodeLoader
// ============================================================================

/// 모듈 로더
pub trait CodeLoader: Send + Sync {
    /// 이 로더가 담당하는 모듈 종류
    fn kind(&self) -> ModuleKind;

    /// 경로가 이 로더가 열 수 있는 코드 리소스인지
    ///
    /// 디렉토리가 코드 리소스로 인식되면 스캔은 그 하위로 내려가지 않는다.
    fn is_code_resource(&self, path: &Path) -> bool;

    /// 코드 리소스 로드
    fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>>;
}

// ============================================================================
// LoaderTable
// ============================================================================

/// 종류 → 로더 테이블
#[derive(Default, Clone)]
pub struct LoaderTable {
    loaders: HashMap<ModuleKind, Arc<dyn CodeLoader>>,
}

impl LoaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 로더 등록. 같은 종류의 이전 로더를 반환
    pub fn register(&mut self, loader: Arc<dyn CodeLoader>) -> Option<Arc<dyn CodeLoader>> {
        self.loaders.insert(loader.kind(), loader)
    }

    pub fn unregister(&mut self, kind: ModuleKind) -> Option<Arc<dyn CodeLoader>> {
        self.loaders.remove(&kind)
    }

    pub fn get(&self, kind: ModuleKind) -> Option<Arc<dyn CodeLoader>> {
        self.loaders.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ModuleKind> {
        self.loaders.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_parse() {
        assert_eq!("native".parse::<ModuleKind>().unwrap(), ModuleKind::Native);
        assert_eq!("Script".parse::<ModuleKind>().unwrap(), ModuleKind::Script);
        assert!("python".parse::<ModuleKind>().is_err());
        assert_eq!(ModuleKind::Core.to_string(), "core");
    }
}
