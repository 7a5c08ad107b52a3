//! plugforge-core: Class Registry Runtime
//!
//! Layer2 - 플러그인 클래스 레지스트리와 코드 모듈 수명 관리
//!
//! # 주요 모듈
//!
//! - `class`: 클래스 ID, 디스크립터, 저장소, 검색
//! - `module`: 코드 모듈, 로더(native / script / core), 지연 언로드
//! - `cache`: 스캔 캐시와 블록리스트
//! - `scan`: 폴더 스캔 옵션과 결과
//! - `manager`: `ClassRegistry` (스캔, 인스턴스 생성, 팩토리 갱신)
//! - `events`: 레지스트리 시그널
//!
//! # 사용 예시
//!
//! ```ignore
//! use plugforge_core::{ClassRegistry, ModuleKind, ScanOptions};
//! use plugforge_foundation::RegistryConfig;
//!
//! let registry = ClassRegistry::startup(RegistryConfig::load()?)?;
//!
//! // 설치된 모듈 스캔 (변경되지 않은 모듈은 캐시에서 복원)
//! let report = registry.scan_folder(&plugin_dir, ModuleKind::Native, &ScanOptions::new(), None)?;
//!
//! // 인스턴스 생성 (핸들이 drop 되면 모듈 언로드 검사)
//! let instance = registry.create_instance_by_name("Effect:Dynamics:Compressor")?;
//!
//! registry.shutdown()?;
//! ```

// Core modules
pub mod cache;
pub mod class;
pub mod events;
pub mod hooks;
pub mod instance;
pub mod manager;
pub mod module;
pub mod scan;

// Re-exports: Class
pub use class::{
    meta, ClassCollection, ClassDescriptor, ClassFlags, ClassId, ClassInfo, ClassOwner,
    ClassSearcher, ClassStore, SearchDescription, VersionDescriptor, CLASS_URL_SCHEME,
};

// Re-exports: Module
pub use module::{
    module_modified_time, ClassFactory, CodeLoader, CodeModule, CodeResource, Constructor,
    CoreLoader, DeferredUnloads, LoaderTable, ModuleKind, ModuleUnloadGuard, NativeEntryFn,
    NativeLoader, PluginObject, ScriptLoader, ScriptObject, StaticClassFactory,
    CORE_MARKER_EXTENSION, NATIVE_ENTRY_SYMBOL, PACKAGE_FILE_SUFFIX, PACKAGE_META_FILE,
};

// Re-exports: Cache
pub use cache::{
    cache_keys, Blocklist, BlocklistEntry, CachedModule, ScanCache, SettingsKey,
    BLOCKLIST_URL_SCHEME,
};

// Re-exports: Scan
pub use scan::{collect_candidates, CancelFlag, ModuleOutcome, ProgressNotify, ScanOptions, ScanReport};

// Re-exports: Registry
pub use events::{EventType, RegistryEvent, SignalBus};
pub use hooks::{ClassFilter, HookList, LoaderHook};
pub use instance::PluginInstance;
pub use manager::{ClassRegistry, DiagnosticData, FactoryUpdate};
