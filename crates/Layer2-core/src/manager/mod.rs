//! Class Registry - 플러그인 클래스 레지스트리
//!
//! 설치된 모듈을 스캔해 클래스 디스크립터를 등록하고, 인스턴스 생성에 맞춰
//! 모듈을 로드/언로드한다.
//!
//! - `scanning`: 폴더 스캔, 캐시 복원, 단일 파일 저장/복원
//! - `instances`: 인스턴스 생성과 지연 언로드 처리
//! - `runtime`: 런타임 팩토리 등록/갱신, 대체 클래스 조회, 로더 해제
//! - `blocklist`: 블록리스트 조작
//! - `diagnostics`: 진단용 저장소 내보내기

mod blocklist;
mod diagnostics;
mod instances;
mod runtime;
mod scanning;

pub use diagnostics::DiagnosticData;
pub use runtime::FactoryUpdate;

use crate::cache::{Blocklist, ScanCache, SettingsKey};
use crate::class::{ClassDescriptor, ClassId, ClassSearcher, ClassStore, SearchDescription};
use crate::events::{EventType, ModuleSignalHook, RegistryEvent, SignalBus};
use crate::hooks::{ClassFilter, HookList, LoaderHook};
use crate::module::{
    ClassFactory, CodeLoader, CodeModule, CoreLoader, DeferredUnloads, LoaderTable, ModuleKind,
    NativeLoader, ScriptLoader,
};
use parking_lot::{Mutex, RwLock};
use plugforge_foundation::{AttrValue, Error, RegistryConfig, Result};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 런타임에 등록된 팩토리와 그 팩토리가 등록한 클래스
struct RuntimeEntry {
    factory: Arc<dyn ClassFactory>,
    classes: Vec<Arc<ClassDescriptor>>,
}

/// 클래스 레지스트리
///
/// 시작 시 한 번 생성해 공유 참조로 전달한다. 생성한 스레드가 메인 실행 컨텍스트가 되며
/// 모듈 언로드와 종료 처리는 그 스레드에서만 수행된다.
pub struct ClassRegistry {
    /// 설정
    config: RegistryConfig,

    /// 등록된 클래스
    classes: RwLock<ClassStore>,

    /// 파일에서 발견된 모듈
    modules: Mutex<Vec<Arc<CodeModule>>>,

    /// 런타임 등록 팩토리
    runtime: Mutex<Vec<RuntimeEntry>>,

    /// 종류별 로더
    loaders: RwLock<LoaderTable>,

    /// 코어 팩토리 로더
    core: Arc<CoreLoader>,

    /// 로드 훅 / 클래스 필터
    hooks: Arc<HookList>,

    /// 스캔 캐시
    cache: Mutex<ScanCache>,

    /// 블록리스트
    blocklist: Mutex<Blocklist>,

    /// 지연 언로드 대기열
    unloads: Arc<DeferredUnloads>,

    /// 살아있는 싱글톤 객체
    singletons: Mutex<HashMap<ClassId, Weak<dyn Any + Send + Sync>>>,

    /// 시그널
    events: Arc<SignalBus>,

    /// 첫 스캔 이후 `true`
    scanned: AtomicBool,

    /// 대체 클래스 선형 탐색 횟수
    alternative_scans: AtomicUsize,
}

impl ClassRegistry {
    /// 레지스트리 생성
    ///
    /// 스캔 캐시와 블록리스트를 설정 디렉토리에서 읽고 기본 로더(native, script, core)를 등록한다.
    pub fn startup(config: RegistryConfig) -> Result<Self> {
        let settings_dir = config.resolve_settings_dir()?;
        let cache = ScanCache::open(
            settings_dir.clone(),
            config.settings_file_name(),
            config.auto_save,
        );
        let blocklist = Blocklist::open(
            settings_dir.clone(),
            config.blocklist_file_name(),
            config.blocklist_enabled,
        );

        let events = Arc::new(SignalBus::new());
        let hooks = Arc::new(HookList::new());
        hooks.add_loader_hook(Arc::new(ModuleSignalHook::new(events.clone())));

        let core = Arc::new(CoreLoader::new());
        let mut loaders = LoaderTable::new();
        loaders.register(Arc::new(NativeLoader::new()));
        loaders.register(Arc::new(ScriptLoader::new()));
        loaders.register(core.clone());

        info!(
            "Class registry started: settings in {} ({} cached modules, {} blocklisted)",
            settings_dir.display(),
            cache.len(),
            blocklist.len()
        );

        Ok(Self {
            unloads: Arc::new(DeferredUnloads::new(config.defer_unload_delay())),
            config,
            classes: RwLock::new(ClassStore::new()),
            modules: Mutex::new(Vec::new()),
            runtime: Mutex::new(Vec::new()),
            loaders: RwLock::new(loaders),
            core,
            hooks,
            cache: Mutex::new(cache),
            blocklist: Mutex::new(blocklist),
            singletons: Mutex::new(HashMap::new()),
            events,
            scanned: AtomicBool::new(false),
            alternative_scans: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // 로더 / 훅
    // ========================================================================

    /// 로더 등록. 같은 종류의 이전 로더 반환
    pub fn register_loader(&self, loader: Arc<dyn CodeLoader>) -> Option<Arc<dyn CodeLoader>> {
        debug!("Registering {} loader", loader.kind());
        self.loaders.write().register(loader)
    }

    pub fn loader(&self, kind: ModuleKind) -> Result<Arc<dyn CodeLoader>> {
        self.loaders
            .read()
            .get(kind)
            .ok_or_else(|| Error::NotFound(format!("No loader registered for {} modules", kind)))
    }

    /// 이름으로 코어 팩토리 등록 (`<name>.core` 표식 파일로 스캔됨)
    pub fn register_core_factory(&self, name: impl Into<String>, factory: Arc<dyn ClassFactory>) {
        self.core.register(name, factory);
    }

    pub fn add_loader_hook(&self, hook: Arc<dyn LoaderHook>) {
        self.hooks.add_loader_hook(hook);
    }

    pub fn remove_loader_hook(&self, hook: &Arc<dyn LoaderHook>) -> bool {
        self.hooks.remove_loader_hook(hook)
    }

    pub fn add_class_filter(&self, filter: Arc<dyn ClassFilter>) {
        self.hooks.add_class_filter(filter);
    }

    pub fn remove_class_filter(&self, filter: &Arc<dyn ClassFilter>) -> bool {
        self.hooks.remove_class_filter(filter)
    }

    // ========================================================================
    // 클래스 조회
    // ========================================================================

    pub fn class(&self, class_id: &ClassId) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(class_id)
    }

    /// `category[:subCategory]:name` 으로 조회
    pub fn class_by_name(&self, qualified_name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().find_by_name(qualified_name)
    }

    /// `class://{UID}/...` 로 조회
    pub fn class_by_url(&self, url: &str) -> Option<Arc<ClassDescriptor>> {
        ClassDescriptor::class_id_from_url(url).and_then(|id| self.class(&id))
    }

    /// URL, UID 문자열, 이름 순서로 해석해 조회
    pub fn lookup(&self, text: &str) -> Option<Arc<ClassDescriptor>> {
        if let Some(class) = self.class_by_url(text) {
            return Some(class);
        }
        if let Some(class_id) = ClassId::parse(text) {
            return self.class(&class_id);
        }
        self.class_by_name(text)
    }

    /// 카테고리의 클래스 (등록 순서)
    pub fn classes_in_category(&self, category: &str) -> Vec<Arc<ClassDescriptor>> {
        self.classes.read().category(category)
    }

    pub fn categories(&self) -> Vec<String> {
        self.classes.read().category_names()
    }

    pub fn all_classes(&self) -> Vec<Arc<ClassDescriptor>> {
        self.classes.read().iter().cloned().collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    /// `Class:MetaClassID` 속성이 가리키는 메타 클래스
    pub fn meta_class_description(&self, class_id: &ClassId) -> Option<Arc<ClassDescriptor>> {
        let meta_id = self.class(class_id)?.meta_class_id()?;
        self.class(&meta_id)
    }

    /// 카테고리 안에서 검색. 결과는 클래스 URL
    pub fn search(&self, category: &str, description: &SearchDescription) -> Vec<String> {
        let classes = self.classes_in_category(category);
        ClassSearcher::new(description).search(classes.iter())
    }

    /// 클래스 속성 변경 (모듈 캐시 스냅샷에도 기록)
    pub fn set_class_attribute(
        &self,
        class: &ClassDescriptor,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let value = value.into();
        class.set_attribute(key, value.clone());
        if let Some(module) = class.module() {
            let stored = self.cache.lock().update_class_attribute(
                module.settings_key(),
                &class.class_id(),
                key,
                value,
            )?;
            if !stored {
                debug!(
                    "No cached snapshot for {} in {}",
                    class.class_id(),
                    module.name()
                );
            }
        }
        Ok(())
    }

    // ========================================================================
    // 모듈
    // ========================================================================

    pub fn modules(&self) -> Vec<Arc<CodeModule>> {
        self.modules.lock().clone()
    }

    /// 경로의 모듈 (이미 발견된 경우)
    pub fn module_for_path(&self, path: &Path) -> Option<Arc<CodeModule>> {
        self.module_for_key(&SettingsKey::for_path(path))
    }

    fn module_for_key(&self, key: &SettingsKey) -> Option<Arc<CodeModule>> {
        self.modules
            .lock()
            .iter()
            .find(|m| m.settings_key() == key)
            .cloned()
    }

    fn new_module(&self, path: &Path, loader: Arc<dyn CodeLoader>) -> Arc<CodeModule> {
        Arc::new(CodeModule::new(
            path.to_path_buf(),
            loader,
            self.hooks.clone(),
            self.unloads.clone(),
        ))
    }

    /// 모듈 목록에서 빼고 그 클래스를 등록 해제한다. 바뀐 카테고리 반환
    fn detach_module(&self, module: &Arc<CodeModule>) -> BTreeSet<String> {
        self.modules.lock().retain(|m| !Arc::ptr_eq(m, module));
        self.unloads.remove_where(|m| std::ptr::eq(m, Arc::as_ptr(module)));

        let removed = self.classes.write().remove_where(|c| c.is_owned_by(module));
        let mut singletons = self.singletons.lock();
        removed
            .iter()
            .map(|class| {
                singletons.remove(&class.class_id());
                class.category().to_string()
            })
            .collect()
    }

    fn publish_category_changes(&self, categories: &BTreeSet<String>) {
        for category in categories {
            self.events.publish(RegistryEvent::category_changed(category));
        }
    }

    // ========================================================================
    // 시그널
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &SignalBus {
        &self.events
    }

    // ========================================================================
    // 종료
    // ========================================================================

    /// 종료 처리
    ///
    /// 대기 중인 언로드를 처리한 뒤 모든 모듈을 강제 언로드하고 저장소를 기록한다.
    pub fn shutdown(&self) -> Result<()> {
        if !self.unloads.is_main_context() {
            return Err(Error::WrongThread(
                "shutdown must run on the thread that started the registry".to_string(),
            ));
        }

        self.events
            .publish(RegistryEvent::simple(EventType::TerminatePlugins));
        self.unload_unused_modules()?;

        let modules = std::mem::take(&mut *self.modules.lock());
        let mut abandoned = 0;
        for module in &modules {
            abandoned += module.force_unload();
        }

        self.runtime.lock().clear();
        self.singletons.lock().clear();
        let removed = self.classes.write().clear();
        for class in removed.iter().filter(|c| c.live_instances() > 0) {
            warn!(
                "Class {} still has {} live instances at shutdown",
                class.qualified_name(),
                class.live_instances()
            );
        }

        self.cache.lock().flush()?;
        self.blocklist.lock().flush()?;

        info!(
            "Class registry shut down: {} modules released, {} instances abandoned",
            modules.len(),
            abandoned
        );
        Ok(())
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.class_count())
            .field("modules", &self.modules.lock().len())
            .field("runtime_factories", &self.runtime.lock().len())
            .finish()
    }
}
