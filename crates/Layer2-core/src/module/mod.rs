//! Module - 코드 모듈과 로더
//!
//! - `factory`: ClassFactory / CodeResource 트레이트, StaticClassFactory
//! - `loader`: ModuleKind, CodeLoader 트레이트, LoaderTable
//! - `code_module`: CodeModule (로드 상태, 인스턴스 카운트)
//! - `deferred`: 지연 언로드 대기열
//! - `native` / `script` / `core_loader`: 기본 로더

mod code_module;
mod core_loader;
mod deferred;
mod factory;
mod loader;
mod native;
mod script;

pub use code_module::{module_modified_time, CodeModule, ModuleUnloadGuard};
pub use core_loader::{CoreLoader, CORE_MARKER_EXTENSION};
pub use deferred::DeferredUnloads;
pub use factory::{ClassFactory, CodeResource, Constructor, PluginObject, StaticClassFactory};
pub use loader::{CodeLoader, LoaderTable, ModuleKind};
pub use native::{NativeEntryFn, NativeLoader, NATIVE_ENTRY_SYMBOL};
pub use script::{ScriptLoader, ScriptObject, PACKAGE_FILE_SUFFIX, PACKAGE_META_FILE};
