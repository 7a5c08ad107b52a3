//! 폴더 스캔과 캐시 복원

use super::ClassRegistry;
use crate::cache::{cache_keys, SettingsKey};
use crate::class::{ClassCollection, ClassDescriptor, ClassOwner};
use crate::hooks::ClassFilter;
use crate::module::{module_modified_time, CodeLoader, CodeModule, ModuleKind, ModuleUnloadGuard};
use crate::scan::{collect_candidates, ModuleOutcome, ProgressNotify, ScanOptions, ScanReport};
use chrono::{DateTime, Utc};
use plugforge_foundation::{Attributes, Error, Result};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ClassRegistry {
    // ========================================================================
    // 폴더 스캔
    // ========================================================================

    /// 폴더 스캔
    ///
    /// 로더가 인식하는 파일마다 캐시 복원을 시도하고, 실패하면 일시 로드해서 클래스를 수집한다.
    /// 개별 모듈의 실패는 보고서에 기록될 뿐 스캔을 중단시키지 않는다. 취소되면 이미 등록된
    /// 클래스는 그대로 남는다.
    pub fn scan_folder(
        &self,
        folder: &Path,
        kind: ModuleKind,
        options: &ScanOptions,
        progress: Option<&dyn ProgressNotify>,
    ) -> Result<ScanReport> {
        let loader = self.loader(kind)?;
        self.scanned.store(true, Ordering::Release);

        let mut report = ScanReport::new();
        if !folder.is_dir() {
            debug!("Scan folder {} does not exist", folder.display());
            return Ok(report);
        }

        let candidates = collect_candidates(folder, loader.as_ref(), options);
        let total = candidates.len();
        debug!("Scanning {} ({} candidates)", folder.display(), total);

        for (index, path) in candidates.into_iter().enumerate() {
            if let Some(progress) = progress {
                if progress.is_canceled() {
                    info!("Scan of {} canceled", folder.display());
                    report.canceled = true;
                    break;
                }
                progress.set_text(&path.display().to_string());
                progress.update_progress(index as f64 / total as f64);
            }

            let outcome = match self.module_for_path(&path) {
                Some(_) => ModuleOutcome::AlreadyKnown,
                None => {
                    let module = self.new_module(&path, loader.clone());
                    self.restore_module(&module, options)
                }
            };
            report.record(path, outcome);
        }

        if let Some(progress) = progress {
            if !report.canceled {
                progress.update_progress(1.0);
            }
        }

        info!(
            "Scanned {}: {} modules contributed {} classes ({} from cache)",
            folder.display(),
            report.count(),
            report.class_count(),
            report.restored()
        );
        Ok(report)
    }

    /// 모듈 하나 복원 (캐시 또는 일시 로드)
    ///
    /// 성공하면 모듈을 목록에 추가한다.
    fn restore_module(&self, module: &Arc<CodeModule>, options: &ScanOptions) -> ModuleOutcome {
        let key = module.settings_key().clone();
        if self.blocklist.lock().contains(&key) {
            info!("Module {} is on blocklist, skipped", module.name());
            return ModuleOutcome::Blocklisted;
        }

        let modified = module.modified_time();
        let cached = {
            let cache = self.cache.lock();
            match modified {
                Some(time) if cache.modified_time(&key) == Some(time) => {
                    Some(cache.restore(&key, options.keep_discardable))
                }
                _ => None,
            }
        };

        let outcome = match cached {
            Some(Ok(entry)) => {
                let added = self.add_module_classes(module, entry.classes);
                if added == 0 {
                    ModuleOutcome::Empty
                } else {
                    ModuleOutcome::Restored { classes: added }
                }
            }
            Some(Err(e)) => {
                debug!("Rescanning {}: {}", module.name(), e);
                self.register_module(module, modified, options)
            }
            None => self.register_module(module, modified, options),
        };

        if matches!(
            outcome,
            ModuleOutcome::Registered { .. } | ModuleOutcome::Restored { .. } | ModuleOutcome::Empty
        ) {
            self.modules.lock().push(module.clone());
        }
        outcome
    }

    /// 일시 로드해서 클래스를 수집하고 캐시에 기록
    ///
    /// 로드 전에 블록리스트에 올려두고 수집이 끝나면 내린다. 클래스가 없는 discardable
    /// 엔트리는 블록리스트 후보가 아니다.
    fn register_module(
        &self,
        module: &Arc<CodeModule>,
        modified: Option<DateTime<Utc>>,
        options: &ScanOptions,
    ) -> ModuleOutcome {
        let key = module.settings_key().clone();
        let candidate = !self.cache.lock().is_empty_discardable(&key);
        if candidate && !self.blocklist.lock().check_and_arm(&key, module.name()) {
            return ModuleOutcome::Blocklisted;
        }

        let collection = {
            let _guard = ModuleUnloadGuard::new(module);
            let factory = match module.class_factory() {
                Ok(factory) => factory,
                Err(e) => {
                    warn!("Failed to load module {}: {}", module.path().display(), e);
                    return ModuleOutcome::Failed {
                        message: e.to_string(),
                    };
                }
            };
            ClassCollection::collect(factory.as_ref(), &self.config.language, None)
        };

        {
            let mut cache = self.cache.lock();
            let stored = cache.store(&key, &collection, options.keep_discardable).and_then(|_| {
                if collection.is_empty() && options.validity_confirmed {
                    cache.set_discardable(&key)?;
                }
                match modified {
                    Some(time) => cache.set_modified_time(&key, time),
                    None => Ok(()),
                }
            });
            if let Err(e) = stored {
                warn!("Failed to cache classes of {}: {}", module.name(), e);
            }
        }
        self.blocklist.lock().disarm(&key);

        let added = self.add_module_classes(module, collection.into_classes());
        if added == 0 {
            ModuleOutcome::Empty
        } else {
            ModuleOutcome::Registered { classes: added }
        }
    }

    /// 모듈의 클래스를 등록. 실제 등록된 수 반환
    fn add_module_classes(&self, module: &Arc<CodeModule>, classes: Vec<ClassDescriptor>) -> usize {
        let mut store = self.classes.write();
        let mut added = 0;
        for class in classes {
            let class = Arc::new(class);
            class.set_owner(ClassOwner::Module(Arc::downgrade(module)));
            if store.add(class.clone(), &self.hooks) {
                added += 1;
            } else {
                class.unlink();
            }
        }
        added
    }

    // ========================================================================
    // 단일 파일
    // ========================================================================

    /// 모듈을 일시 로드해서 클래스 데이터 반환 (`version`, `discardable`, `Classes`)
    ///
    /// 레지스트리와 캐시는 바뀌지 않는다.
    pub fn store_file(
        &self,
        path: &Path,
        kind: ModuleKind,
        language: &str,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<Attributes> {
        let loader = self.loader(kind)?;
        self.ensure_code_resource(loader.as_ref(), path)?;

        let module = self.new_module(path, loader);
        let _guard = ModuleUnloadGuard::new(&module);
        let factory = module.class_factory()?;
        let collection = ClassCollection::collect(factory.as_ref(), language, filter);
        Ok(collection.to_class_data())
    }

    /// 모듈 하나 복원
    ///
    /// `class_data` 가 주어지면 외부에서 스캔한 데이터로 캐시 엔트리를 대체하고 블록리스트에서
    /// 뺀 뒤 복원한다. 복원에 실패하면 `Blocklisted` 또는 `Failed` 를 반환한다.
    pub fn restore_file(
        &self,
        path: &Path,
        kind: ModuleKind,
        options: &ScanOptions,
        class_data: Option<&Attributes>,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<ModuleOutcome> {
        let loader = self.loader(kind)?;
        self.ensure_code_resource(loader.as_ref(), path)?;

        let key = SettingsKey::for_path(path);
        let modified = module_modified_time(path, kind);
        if let Some(existing) = self.module_for_path(path) {
            if self.cache.lock().modified_time(&key) == modified {
                return Err(Error::AlreadyRegistered(path.display().to_string()));
            }
            let categories = self.detach_module(&existing);
            existing.check_unload(false);
            self.publish_category_changes(&categories);
        }

        let mut override_discardable = false;
        if let Some(data) = class_data {
            let time = modified.unwrap_or_else(Utc::now);
            let count = self
                .cache
                .lock()
                .store_class_data(&key, time, data, filter)?;
            override_discardable = count == 0 && options.validity_confirmed;
            self.blocklist.lock().disarm(&key);
        }

        let module = self.new_module(path, loader);
        let outcome = self.restore_module(&module, options);
        if matches!(
            outcome,
            ModuleOutcome::Blocklisted | ModuleOutcome::Failed { .. }
        ) {
            return Ok(outcome);
        }

        let discardable = class_data
            .and_then(|d| d.get_bool(cache_keys::DISCARDABLE))
            .unwrap_or(false);
        if discardable || override_discardable {
            self.cache.lock().set_discardable(&key)?;
        }
        Ok(outcome)
    }

    fn ensure_code_resource(&self, loader: &dyn CodeLoader, path: &Path) -> Result<()> {
        if loader.is_code_resource(path) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "{} is not a {} module",
                path.display(),
                loader.kind()
            )))
        }
    }

    // ========================================================================
    // 캐시 질의
    // ========================================================================

    pub fn is_discardable(&self, path: &Path) -> bool {
        self.cache.lock().is_discardable(&SettingsKey::for_path(path))
    }

    /// 캐시에 기록된 수정 시각
    pub fn last_modified_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.cache
            .lock()
            .modified_time(&SettingsKey::for_path(path))
            .ok_or_else(|| Error::NotFound(format!("No cache entry for {}", path.display())))
    }

    /// 캐시와 블록리스트 기록
    pub fn save_settings(&self) -> Result<()> {
        self.cache.lock().flush()?;
        self.blocklist.lock().flush()
    }

    /// 캐시 파일 삭제 (첫 스캔 전에만 가능)
    ///
    /// `any_language` 이면 다른 언어의 캐시 파일도 함께 삭제한다.
    pub fn remove_settings(&self, any_language: bool) -> Result<usize> {
        if self.scanned.load(Ordering::Acquire) {
            return Err(Error::NotApplicable(
                "scan cache is in use after the first scan".to_string(),
            ));
        }

        let mut cache = self.cache.lock();
        let mut removed = 0;
        if cache.settings().path().exists() {
            removed += 1;
        }
        cache.remove_file()?;

        if any_language {
            let dir = cache.settings().dir().to_string_lossy().to_string();
            let pattern = format!(
                "{}/{}.*.json",
                glob::Pattern::escape(&dir),
                glob::Pattern::escape(&self.config.settings_name)
            );
            let paths = glob::glob(&pattern)
                .map_err(|e| Error::InvalidInput(format!("Invalid settings pattern: {}", e)))?;
            for path in paths.flatten() {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
        }

        info!("Removed {} scan cache files", removed);
        Ok(removed)
    }
}
