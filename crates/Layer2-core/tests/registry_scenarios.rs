//! 레지스트리 통합 테스트 - 스캔, 캐시, 블록리스트, 지연 언로드
//!
//! `cargo test -p plugforge-core --test registry_scenarios`

use plugforge_core::{
    meta, CancelFlag, ClassFactory, ClassId, ClassInfo, ClassRegistry, CodeLoader, CodeResource,
    EventType, ModuleKind, ModuleOutcome, PluginObject, ProgressNotify, ScanOptions,
    ScriptObject, SettingsKey, StaticClassFactory, VersionDescriptor,
};
use plugforge_foundation::{Attributes, Error, RegistryConfig, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

// ============================================================================
// 테스트 로더
// ============================================================================

/// `*.mod` 파일을 읽는 로더
///
/// 한 줄에 클래스 하나: `<uuid> <category> <name>`. 내용이 `fail` 이면 로드에 실패한다.
struct TextModuleLoader {
    loads: AtomicUsize,
}

impl TextModuleLoader {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

struct TextModule {
    path: PathBuf,
    factory: Arc<dyn ClassFactory>,
}

impl CodeResource for TextModule {
    fn class_factory(&self) -> Arc<dyn ClassFactory> {
        self.factory.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl CodeLoader for TextModuleLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Native
    }

    fn is_code_resource(&self, path: &Path) -> bool {
        path.is_file() && path.extension().is_some_and(|e| e == "mod")
    }

    fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let content = fs::read_to_string(path)?;
        if content.trim() == "fail" {
            return Err(Error::load_failure(path, "simulated crash"));
        }

        let factory = StaticClassFactory::new(VersionDescriptor::new("TextModule", "1.0"));
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let class_id = ClassId::parse(parts[0]).expect("valid class id");
            let name = parts[2].to_string();
            let constructor: plugforge_core::Constructor =
                Arc::new(move || Arc::new(name.clone()) as PluginObject);
            factory.add_class(
                ClassInfo::new(class_id, parts[1], parts[2]),
                Attributes::new().with(meta::CLASS_VENDOR, "Acme"),
                Some(constructor),
            );
        }

        Ok(Box::new(TextModule {
            path: path.to_path_buf(),
            factory: Arc::new(factory),
        }))
    }
}

// ============================================================================
// Fixture
// ============================================================================

const X1: &str = "{9B2F4C10-6A1D-4E0B-8C3A-1F5D7E9A0B21}";
const X2: &str = "{9B2F4C10-6A1D-4E0B-8C3A-1F5D7E9A0B22}";

struct Fixture {
    _root: tempfile::TempDir,
    settings: PathBuf,
    plugins: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let settings = root.path().join("settings");
        let plugins = root.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        Self {
            _root: root,
            settings,
            plugins,
        }
    }

    fn write_module(&self, name: &str, content: &str) -> PathBuf {
        let path = self.plugins.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config(&self) -> RegistryConfig {
        RegistryConfig::new().settings_dir(&self.settings)
    }

    fn start(&self, loader: &Arc<TextModuleLoader>) -> ClassRegistry {
        self.start_with(self.config(), loader)
    }

    fn start_with(&self, config: RegistryConfig, loader: &Arc<TextModuleLoader>) -> ClassRegistry {
        let registry = ClassRegistry::startup(config).unwrap();
        let loader: Arc<dyn CodeLoader> = loader.clone();
        registry.register_loader(loader);
        registry
    }

    fn scan(&self, registry: &ClassRegistry) -> plugforge_core::ScanReport {
        registry
            .scan_folder(&self.plugins, ModuleKind::Native, &ScanOptions::new(), None)
            .unwrap()
    }
}

fn class_id(text: &str) -> ClassId {
    ClassId::parse(text).unwrap()
}

fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

// ============================================================================
// 스캔 / 캐시
// ============================================================================

#[test]
fn test_first_scan_registers_and_caches() {
    let fixture = Fixture::new();
    let path = fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);

    let report = fixture.scan(&registry);
    assert_eq!(report.count(), 1);
    assert_eq!(loader.loads(), 1);

    let class = registry.class(&class_id(X1)).unwrap();
    assert_eq!(class.category(), "Tools");
    assert_eq!(class.vendor().as_deref(), Some("Acme"));

    // 수집이 끝나면 일시 로드된 모듈은 언로드된다
    let modules = registry.modules();
    assert_eq!(modules.len(), 1);
    assert!(!modules[0].is_loaded());

    assert!(registry.last_modified_time(&path).is_ok());
    let diagnostics = registry.diagnostic_data().unwrap();
    let cache = String::from_utf8(diagnostics[0].contents.clone()).unwrap();
    assert!(cache.contains(SettingsKey::for_path(&path).as_str()));
    assert!(cache.contains("\"numClasses\": 1"));
    assert!(!registry.is_blocklisted(&path));
}

#[test]
fn test_restart_restores_from_cache_without_loading() {
    let fixture = Fixture::new();
    fixture.write_module(
        "tools.mod",
        &format!("{} Tools Hammer\n{} Tools Saw\n", X1, X2),
    );

    let first_loader = TextModuleLoader::new();
    let first = fixture.start(&first_loader);
    fixture.scan(&first);
    let mut original: Vec<_> = first
        .all_classes()
        .iter()
        .map(|c| (c.class_id(), c.category().to_string(), c.name().to_string(), c.attributes()))
        .collect();
    first.shutdown().unwrap();

    let second_loader = TextModuleLoader::new();
    let second = fixture.start(&second_loader);
    let report = fixture.scan(&second);

    assert_eq!(second_loader.loads(), 0);
    assert_eq!(report.count(), 1);
    assert_eq!(report.modules[0].1, ModuleOutcome::Restored { classes: 2 });

    let mut restored: Vec<_> = second
        .all_classes()
        .iter()
        .map(|c| (c.class_id(), c.category().to_string(), c.name().to_string(), c.attributes()))
        .collect();
    original.sort_by_key(|entry| entry.0);
    restored.sort_by_key(|entry| entry.0);
    assert_eq!(original, restored);
}

#[test]
fn test_changed_modification_time_forces_rescan() {
    let fixture = Fixture::new();
    let path = fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));

    let first = fixture.start(&TextModuleLoader::new());
    fixture.scan(&first);
    first.shutdown().unwrap();

    set_mtime(&path, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000));

    let loader = TextModuleLoader::new();
    let second = fixture.start(&loader);
    let report = fixture.scan(&second);
    assert_eq!(loader.loads(), 1);
    assert_eq!(report.modules[0].1, ModuleOutcome::Registered { classes: 1 });
    assert!(second.class(&class_id(X1)).is_some());
}

#[test]
fn test_confirmed_empty_module_is_not_rescanned() {
    let fixture = Fixture::new();
    fixture.write_module("empty.mod", "");

    let first = fixture.start(&TextModuleLoader::new());
    let report = fixture.scan(&first);
    assert_eq!(report.count(), 0);
    assert_eq!(report.modules[0].1, ModuleOutcome::Empty);
    first.shutdown().unwrap();

    let loader = TextModuleLoader::new();
    let second = fixture.start(&loader);
    fixture.scan(&second);
    assert_eq!(loader.loads(), 0);
}

#[test]
fn test_validity_confirmed_empty_module_is_retried() {
    let fixture = Fixture::new();
    let path = fixture.write_module("later.mod", "");
    let options = ScanOptions::new().validity_confirmed(true);

    let loader = TextModuleLoader::new();
    let first = fixture.start(&loader);
    first
        .scan_folder(&fixture.plugins, ModuleKind::Native, &options, None)
        .unwrap();
    assert!(first.is_discardable(&path));
    first.shutdown().unwrap();

    let second = fixture.start(&loader);
    second
        .scan_folder(&fixture.plugins, ModuleKind::Native, &options, None)
        .unwrap();
    assert_eq!(loader.loads(), 2);
    // 비어 있는 discardable 모듈은 블록리스트 후보가 아니다
    assert!(!second.is_blocklisted(&path));
}

#[test]
fn test_duplicate_class_id_keeps_first_registration() {
    let fixture = Fixture::new();
    fixture.write_module("a.mod", &format!("{} Tools Hammer\n", X1));
    fixture.write_module("b.mod", &format!("{} Tools Mallet\n{} Tools Saw\n", X1, X2));

    let registry = fixture.start(&TextModuleLoader::new());
    let report = fixture.scan(&registry);

    assert_eq!(report.count(), 2);
    assert_eq!(registry.class_count(), 2);
    assert_eq!(registry.class(&class_id(X1)).unwrap().name(), "Hammer");
    assert_eq!(registry.classes_in_category("Tools").len(), 2);
}

/// 첫 모듈을 넘겨받으면 스캔을 취소한다
struct StopAfterFirst {
    flag: CancelFlag,
}

impl ProgressNotify for StopAfterFirst {
    fn set_text(&self, _text: &str) {
        self.flag.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.flag.is_canceled()
    }
}

#[test]
fn test_canceled_scan_keeps_committed_classes() {
    let fixture = Fixture::new();
    fixture.write_module("a.mod", &format!("{} Tools Hammer\n", X1));
    fixture.write_module("b.mod", &format!("{} Tools Saw\n", X2));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);

    let progress = StopAfterFirst {
        flag: CancelFlag::new(),
    };
    let report = registry
        .scan_folder(&fixture.plugins, ModuleKind::Native, &ScanOptions::new(), Some(&progress))
        .unwrap();

    assert!(report.canceled);
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.count(), 1);
    assert!(registry.class(&class_id(X1)).is_some());
    assert!(registry.class(&class_id(X2)).is_none());
    assert_eq!(loader.loads(), 1);

    // 다시 스캔하면 남은 모듈만 새로 등록된다
    let report = fixture.scan(&registry);
    assert!(!report.canceled);
    assert_eq!(report.modules[0].1, ModuleOutcome::AlreadyKnown);
    assert!(registry.class(&class_id(X2)).is_some());
}

// ============================================================================
// 블록리스트
// ============================================================================

#[test]
fn test_blocklist_round_trip() {
    let fixture = Fixture::new();
    let path = fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);
    fixture.scan(&registry);

    registry.add_to_blocklist(path.to_str().unwrap()).unwrap();
    assert!(registry.class(&class_id(X1)).is_none());

    let report = fixture.scan(&registry);
    assert_eq!(report.count(), 0);
    assert_eq!(report.blocklisted(), vec![&path]);
    assert!(registry.class(&class_id(X1)).is_none());
    assert_eq!(loader.loads(), 1);

    let entries = registry.blocklist_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "tools.mod");
    assert!(registry.remove_from_blocklist(&entries[0].url()).unwrap());

    let report = fixture.scan(&registry);
    assert_eq!(report.count(), 1);
    assert!(registry.class(&class_id(X1)).is_some());
}

#[test]
fn test_blocklist_add_by_url() {
    let fixture = Fixture::new();
    let path = fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let registry = fixture.start(&TextModuleLoader::new());
    fixture.scan(&registry);
    let module = registry.modules()[0].clone();

    let url = SettingsKey::for_path(&path).blocklist_url();
    registry.add_to_blocklist(&url).unwrap();
    assert!(registry.is_blocklisted(&path));
    assert!(registry.class(&class_id(X1)).is_none());
    assert!(registry.modules().iter().all(|m| !Arc::ptr_eq(m, &module)));

    let entries = registry.blocklist_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "tools.mod");
    assert_eq!(entries[0].url(), url);
}

#[test]
fn test_failed_load_stays_blocklisted() {
    let fixture = Fixture::new();
    let path = fixture.write_module("crash.mod", "fail");
    let loader = TextModuleLoader::new();

    let first = fixture.start(&loader);
    let report = fixture.scan(&first);
    assert_eq!(report.failed(), vec![&path]);
    assert!(first.is_blocklisted(&path));
    first.shutdown().unwrap();

    let second = fixture.start(&loader);
    let mut events = second.subscribe();
    let report = fixture.scan(&second);
    assert_eq!(report.blocklisted(), vec![&path]);
    assert_eq!(loader.loads(), 1);

    second.reset_blocklist().unwrap();
    assert_eq!(
        events.try_recv().unwrap().event_type,
        EventType::ResetBlocklistDone
    );
    fixture.scan(&second);
    assert_eq!(loader.loads(), 2);
}

#[test]
fn test_empty_discardable_module_is_never_blocklisted() {
    let fixture = Fixture::new();
    let path = fixture.write_module("later.mod", "");
    let options = ScanOptions::new().validity_confirmed(true);

    let first = fixture.start(&TextModuleLoader::new());
    first
        .scan_folder(&fixture.plugins, ModuleKind::Native, &options, None)
        .unwrap();
    first.shutdown().unwrap();

    fs::write(&path, "fail").unwrap();
    set_mtime(&path, SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000));

    let second = fixture.start(&TextModuleLoader::new());
    let report = second
        .scan_folder(&fixture.plugins, ModuleKind::Native, &options, None)
        .unwrap();
    assert_eq!(report.failed(), vec![&path]);
    assert!(!second.is_blocklisted(&path));
}

#[test]
fn test_disabled_blocklist_is_not_applicable() {
    let fixture = Fixture::new();
    let path = fixture.write_module("crash.mod", "fail");
    let loader = TextModuleLoader::new();
    let registry = fixture.start_with(fixture.config().blocklist_enabled(false), &loader);

    assert!(matches!(
        registry.add_to_blocklist(path.to_str().unwrap()),
        Err(Error::NotApplicable(_))
    ));
    fixture.scan(&registry);
    fixture.scan(&registry);
    // 블록리스트가 꺼져 있으면 실패한 모듈도 매번 다시 시도한다
    assert_eq!(loader.loads(), 2);
    assert!(registry.blocklist_entries().is_empty());

    assert!(!registry.enable_blocklist(true));
    registry.add_to_blocklist(path.to_str().unwrap()).unwrap();
    assert!(registry.is_blocklisted(&path));
}

// ============================================================================
// 단일 파일
// ============================================================================

#[test]
fn test_store_and_restore_file() {
    let fixture = Fixture::new();
    let path = fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);

    let data = registry
        .store_file(&path, ModuleKind::Native, "en", None)
        .unwrap();
    assert_eq!(data.get_list("Classes").map(|l| l.len()), Some(1));
    assert_eq!(registry.class_count(), 0);

    let outcome = registry
        .restore_file(&path, ModuleKind::Native, &ScanOptions::new(), Some(&data), None)
        .unwrap();
    assert_eq!(outcome, ModuleOutcome::Restored { classes: 1 });
    assert_eq!(loader.loads(), 1);

    assert!(matches!(
        registry.restore_file(&path, ModuleKind::Native, &ScanOptions::new(), None, None),
        Err(Error::AlreadyRegistered(_))
    ));
    assert!(matches!(
        registry.store_file(&fixture.plugins.join("readme.txt"), ModuleKind::Native, "en", None),
        Err(Error::InvalidInput(_))
    ));
}

// ============================================================================
// 인스턴스 / 언로드
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_instance_release_defers_unload() {
    let fixture = Fixture::new();
    fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);
    fixture.scan(&registry);
    let module = registry.modules()[0].clone();

    let instance = registry.create_instance(&class_id(X1)).unwrap();
    assert_eq!(instance.downcast_ref::<String>().map(String::as_str), Some("Hammer"));
    assert!(module.is_loaded());
    assert_eq!(module.instance_count(), 1);

    drop(instance);
    assert_eq!(module.instance_count(), 0);
    assert!(module.is_loaded());
    assert_eq!(registry.pending_unload_count(), 1);
    assert_eq!(registry.poll_deferred_unloads(), 0);

    tokio::time::advance(Duration::from_millis(1000)).await;
    assert_eq!(registry.poll_deferred_unloads(), 1);
    assert!(!module.is_loaded());
}

#[tokio::test(start_paused = true)]
async fn test_unloads_in_one_window_are_batched() {
    let fixture = Fixture::new();
    fixture.write_module("a.mod", &format!("{} Tools Hammer\n", X1));
    fixture.write_module("b.mod", &format!("{} Tools Saw\n", X2));
    let registry = fixture.start(&TextModuleLoader::new());
    fixture.scan(&registry);

    let hammer = registry.create_instance(&class_id(X1)).unwrap();
    let saw = registry.create_instance(&class_id(X2)).unwrap();
    drop(hammer);
    tokio::time::advance(Duration::from_millis(400)).await;
    drop(saw);
    assert_eq!(registry.pending_unload_count(), 2);

    // 구동 루프는 첫 예약 후 1초에 두 모듈을 함께 언로드한다
    let driver = tokio::time::timeout(Duration::from_millis(700), registry.run_deferred_unloads());
    assert!(driver.await.is_err());
    assert_eq!(registry.pending_unload_count(), 0);
    assert!(registry.modules().iter().all(|m| !m.is_loaded()));
}

#[test]
fn test_worker_thread_instances_schedule_one_unload() {
    let fixture = Fixture::new();
    fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let loader = TextModuleLoader::new();
    let registry = fixture.start(&loader);
    fixture.scan(&registry);
    let module = registry.modules()[0].clone();
    assert!(!module.is_loaded());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let instance = registry.create_instance(&class_id(X1)).unwrap();
                    assert!(module.instance_count() > 0);
                    drop(instance);
                }
            });
        }
    });

    assert_eq!(module.instance_count(), 0);
    assert!(module.is_loaded());
    // 스캔 때 한 번, 인스턴스 생성 때 한 번
    assert_eq!(loader.loads(), 2);
    assert_eq!(registry.pending_unload_count(), 1);

    // 작업 스레드는 언로드하지 않는다. 언로드는 레지스트리를 만든 스레드에서
    assert_eq!(registry.unload_unused_modules().unwrap(), 1);
    assert!(!module.is_loaded());
    assert_eq!(registry.pending_unload_count(), 0);
}

#[test]
fn test_script_package_unloads_immediately() {
    let fixture = Fixture::new();
    let package = fixture.plugins.join("tools.package.json");
    fs::write(
        &package,
        format!(
            r#"{{
                "packageID": "com.acme.tools",
                "version": {{ "name": "Acme Tools", "version": "1.0", "vendor": "Acme" }},
                "classes": [ {{ "classID": "{}", "category": "Command", "name": "Cleanup" }} ]
            }}"#,
            X1
        ),
    )
    .unwrap();

    let registry = ClassRegistry::startup(fixture.config()).unwrap();
    let report = registry
        .scan_folder(&fixture.plugins, ModuleKind::Script, &ScanOptions::new(), None)
        .unwrap();
    assert_eq!(report.count(), 1);

    let instance = registry.create_instance_by_name("Command:Cleanup").unwrap();
    let script = instance.downcast_ref::<ScriptObject>().unwrap();
    assert_eq!(script.package_id, "com.acme.tools");
    let module = instance.module().unwrap().clone();
    assert!(module.is_loaded());

    drop(instance);
    assert!(!module.is_loaded());
    assert_eq!(registry.pending_unload_count(), 0);
}

#[test]
fn test_shutdown_force_unloads_modules_with_instances() {
    let fixture = Fixture::new();
    fixture.write_module("tools.mod", &format!("{} Tools Hammer\n", X1));
    let registry = fixture.start(&TextModuleLoader::new());
    fixture.scan(&registry);

    let instance = registry.create_instance(&class_id(X1)).unwrap();
    let module = instance.module().unwrap().clone();
    registry.shutdown().unwrap();

    assert!(!module.is_loaded());
    assert_eq!(module.instance_count(), 0);
    assert!(registry.modules().is_empty());
    drop(instance);
    assert_eq!(module.instance_count(), 0);
}
