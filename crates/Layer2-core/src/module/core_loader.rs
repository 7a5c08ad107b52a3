//! Core Loader - 정적으로 링크된 코어 모듈
//!
//! 코어 팩토리는 이름으로 등록되고, 스캔 폴더의 `<name>.core` 표식 파일로 발견된다.

use super::{ClassFactory, CodeLoader, CodeResource, ModuleKind};
use parking_lot::RwLock;
use plugforge_foundation::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 코어 모듈 표식 파일 확장자
pub const CORE_MARKER_EXTENSION: &str = "core";

struct CoreResource {
    path: PathBuf,
    factory: Arc<dyn ClassFactory>,
}

impl CodeResource for CoreResource {
    fn class_factory(&self) -> Arc<dyn ClassFactory> {
        self.factory.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// 코어 모듈 로더
#[derive(Default)]
pub struct CoreLoader {
    factories: RwLock<HashMap<String, Arc<dyn ClassFactory>>>,
}

impl CoreLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 코어 팩토리 등록
    pub fn register(&self, name: impl Into<String>, factory: Arc<dyn ClassFactory>) {
        self.factories.write().insert(name.into(), factory);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    fn module_name(path: &Path) -> Option<&str> {
        let is_marker = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(CORE_MARKER_EXTENSION));
        if !is_marker {
            return None;
        }
        path.file_stem().and_then(|s| s.to_str())
    }
}

impl CodeLoader for CoreLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Core
    }

    fn is_code_resource(&self, path: &Path) -> bool {
        Self::module_name(path).is_some_and(|name| self.factories.read().contains_key(name))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>> {
        let name = Self::module_name(path)
            .ok_or_else(|| Error::load_failure(path, "Not a core module marker"))?;
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::load_failure(path, format!("Unknown core module '{}'", name)))?;
        Ok(Box::new(CoreResource {
            path: path.to_path_buf(),
            factory,
        }))
    }
}
