//! Code Module - 파일 하나에 대응하는 코드 모듈

use super::{ClassFactory, CodeLoader, CodeResource, DeferredUnloads, ModuleKind};
use crate::cache::SettingsKey;
use crate::hooks::HookList;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use plugforge_foundation::{Attributes, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 코드 모듈
///
/// 로드/언로드 전이는 `resource` 락 안에서만 일어난다. 인스턴스 수가 0 보다 크면
/// 모듈은 항상 로드된 상태로 유지된다.
pub struct CodeModule {
    path: PathBuf,
    name: String,
    settings_key: SettingsKey,
    loader: Arc<dyn CodeLoader>,
    hooks: Arc<HookList>,
    unloads: Arc<DeferredUnloads>,
    resource: Mutex<Option<Box<dyn CodeResource>>>,
    instances: AtomicUsize,
}

impl CodeModule {
    pub fn new(
        path: PathBuf,
        loader: Arc<dyn CodeLoader>,
        hooks: Arc<HookList>,
        unloads: Arc<DeferredUnloads>,
    ) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let settings_key = SettingsKey::for_path(&path);
        Self {
            path,
            name,
            settings_key,
            loader,
            hooks,
            unloads,
            resource: Mutex::new(None),
            instances: AtomicUsize::new(0),
        }
    }

    // ========================================================================
    // 기본 정보
    // ========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings_key(&self) -> &SettingsKey {
        &self.settings_key
    }

    pub fn kind(&self) -> ModuleKind {
        self.loader.kind()
    }

    pub fn loader(&self) -> &Arc<dyn CodeLoader> {
        &self.loader
    }

    pub fn is_loaded(&self) -> bool {
        self.resource.lock().is_some()
    }

    /// 파일 수정 시각
    ///
    /// 디렉토리 형태의 스크립트 패키지는 내부 파일 변경을 추적할 수 없으므로 항상 현재 시각이다.
    pub fn modified_time(&self) -> Option<DateTime<Utc>> {
        module_modified_time(&self.path, self.kind())
    }

    // ========================================================================
    // 로드 / 언로드
    // ========================================================================

    /// 클래스 팩토리 (필요하면 로드)
    pub fn class_factory(&self) -> Result<Arc<dyn ClassFactory>> {
        self.acquire_factory(false)
    }

    /// 인스턴스 하나를 예약하고 클래스 팩토리 반환 (필요하면 로드)
    ///
    /// 카운트 증가와 팩토리 획득은 같은 `resource` 락 안에서 일어난다. 로드에 실패하면
    /// 카운트는 그대로다.
    pub fn class_factory_for_instance(&self) -> Result<Arc<dyn ClassFactory>> {
        self.acquire_factory(true)
    }

    fn acquire_factory(&self, reserve_instance: bool) -> Result<Arc<dyn ClassFactory>> {
        let mut resource = self.resource.lock();
        let (factory, loaded_now) = match resource.as_ref().map(|r| r.class_factory()) {
            Some(factory) => (factory, false),
            None => {
                let loaded = self.loader.load(&self.path)?;
                let factory = loaded.class_factory();
                *resource = Some(loaded);
                (factory, true)
            }
        };
        if reserve_instance {
            self.instances.fetch_add(1, Ordering::AcqRel);
        }
        drop(resource);

        if loaded_now {
            debug!("Loaded module {}", self.path.display());
            self.hooks.notify_load(self);
        }
        Ok(factory)
    }

    /// 로드된 리소스의 메타 정보
    pub fn meta_info(&self) -> Option<Attributes> {
        self.resource.lock().as_ref().and_then(|r| r.meta_info())
    }

    /// 언로드. 실제로 언로드되었는지 반환
    pub fn unload(&self) -> bool {
        let resource = self.resource.lock().take();
        self.release_resource(resource)
    }

    /// 인스턴스가 없을 때만 언로드
    ///
    /// 인스턴스 수는 `resource` 락을 잡은 채로 다시 확인한다.
    pub fn unload_if_idle(&self) -> bool {
        let resource = {
            let mut resource = self.resource.lock();
            if self.instance_count() > 0 {
                return false;
            }
            resource.take()
        };
        self.release_resource(resource)
    }

    fn release_resource(&self, resource: Option<Box<dyn CodeResource>>) -> bool {
        let Some(resource) = resource else {
            return false;
        };
        self.hooks.notify_unload(self);
        drop(resource);
        debug!("Unloaded module {}", self.path.display());
        true
    }

    /// 남은 인스턴스를 버리고 강제 언로드. 버려진 인스턴스 수 반환
    pub fn force_unload(&self) -> usize {
        let abandoned = self.instances.swap(0, Ordering::AcqRel);
        if abandoned > 0 {
            warn!(
                "Forcing unload of {}, {} instances left",
                self.path.display(),
                abandoned
            );
        }
        self.unload();
        abandoned
    }

    // ========================================================================
    // 인스턴스 카운트
    // ========================================================================

    pub fn instance_count(&self) -> usize {
        self.instances.load(Ordering::Acquire)
    }

    /// 인스턴스 추가 (`resource` 락 안에서)
    pub fn add_instance(&self) {
        let _resource = self.resource.lock();
        self.instances.fetch_add(1, Ordering::AcqRel);
    }

    /// 인스턴스 해제. 남은 수 반환 (0 미만으로 내려가지 않는다)
    pub fn release_instance(&self) -> usize {
        match self
            .instances
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!("Instance released twice for {}", self.name);
                0
            }
        }
    }

    /// 인스턴스가 없으면 언로드 (강제 또는 스크립트는 즉시, 그 외는 지연)
    pub fn check_unload(self: &Arc<Self>, force: bool) {
        if self.instance_count() > 0 {
            return;
        }

        if force || self.kind() == ModuleKind::Script {
            debug_assert!(
                self.unloads.is_main_context(),
                "synchronous unload outside main context"
            );
            if self.unloads.is_main_context() {
                self.unload_if_idle();
                return;
            }
        }

        if self.is_loaded() {
            self.unloads.schedule(self.clone());
        }
    }
}

impl fmt::Debug for CodeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeModule")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .field("loaded", &self.is_loaded())
            .field("instances", &self.instance_count())
            .finish()
    }
}

/// 모듈 수정 시각 (밀리초 정밀도)
pub fn module_modified_time(path: &Path, kind: ModuleKind) -> Option<DateTime<Utc>> {
    if kind == ModuleKind::Script && path.is_dir() {
        return Some(Utc::now());
    }
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let time = DateTime::<Utc>::from(modified);
    DateTime::from_timestamp_millis(time.timestamp_millis())
}

// ============================================================================
// ModuleUnloadGuard - 일시 로드 범위 가드
// ============================================================================

/// 범위를 벗어날 때 인스턴스가 없으면 모듈을 언로드한다
pub struct ModuleUnloadGuard<'a> {
    module: &'a CodeModule,
}

impl<'a> ModuleUnloadGuard<'a> {
    pub fn new(module: &'a CodeModule) -> Self {
        Self { module }
    }
}

impl Drop for ModuleUnloadGuard<'_> {
    fn drop(&mut self) {
        self.module.unload_if_idle();
    }
}
