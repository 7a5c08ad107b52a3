//! Native Loader - 동적 라이브러리 모듈
//!
//! 모듈은 `plugforge_class_factory` 심볼을 내보내야 한다. 같은 툴체인으로 빌드된
//! 라이브러리만 지원한다 (Rust ABI).

use super::{ClassFactory, CodeLoader, CodeResource, ModuleKind};
use libloading::{Library, Symbol};
use plugforge_foundation::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 진입점 심볼 이름
pub const NATIVE_ENTRY_SYMBOL: &[u8] = b"plugforge_class_factory\0";

/// 진입점 시그니처
pub type NativeEntryFn = unsafe extern "Rust" fn() -> Box<dyn ClassFactory>;

/// 플러그인 라이브러리에서 진입점을 선언한다
///
/// ```ignore
/// plugforge_core::declare_class_factory!(|| Box::new(MyFactory::new()));
/// ```
#[macro_export]
macro_rules! declare_class_factory {
    ($constructor:expr) => {
        #[no_mangle]
        pub extern "Rust" fn plugforge_class_factory() -> Box<dyn $crate::module::ClassFactory> {
            let constructor: fn() -> Box<dyn $crate::module::ClassFactory> = $constructor;
            constructor()
        }
    };
}

const NATIVE_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// 로드된 라이브러리
///
/// 필드 순서가 drop 순서이다. 팩토리가 라이브러리보다 먼저 해제되어야 한다.
struct NativeResource {
    factory: Arc<dyn ClassFactory>,
    path: PathBuf,
    _library: Library,
}

impl CodeResource for NativeResource {
    fn class_factory(&self) -> Arc<dyn ClassFactory> {
        self.factory.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// 네이티브 모듈 로더
#[derive(Debug, Default)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl CodeLoader for NativeLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Native
    }

    fn is_code_resource(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    NATIVE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
    }

    fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>> {
        debug!("Loading native module: {}", path.display());
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::load_failure(path, format!("Failed to load library: {}", e)))?;

        let factory: Arc<dyn ClassFactory> = {
            let entry: Symbol<NativeEntryFn> = unsafe { library.get(NATIVE_ENTRY_SYMBOL) }
                .map_err(|e| Error::load_failure(path, format!("Missing entry point: {}", e)))?;
            Arc::from(unsafe { entry() })
        };

        Ok(Box::new(NativeResource {
            factory,
            path: path.to_path_buf(),
            _library: library,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_library_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("fx.SO");
        let other = dir.path().join("readme.txt");
        std::fs::write(&lib, b"").unwrap();
        std::fs::write(&other, b"").unwrap();

        let loader = NativeLoader::new();
        assert!(loader.is_code_resource(&lib));
        assert!(!loader.is_code_resource(&other));
        assert!(!loader.is_code_resource(dir.path()));
    }

    #[test]
    fn test_invalid_library_fails() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("broken.so");
        std::fs::write(&lib, b"not a library").unwrap();

        let err = NativeLoader::new().load(&lib).err().unwrap();
        assert!(matches!(err, Error::LoadFailure { .. }));
    }
}
