//! 런타임 팩토리, 대체 클래스, 로더 해제

use super::{ClassRegistry, RuntimeEntry};
use crate::class::{meta, ClassCollection, ClassDescriptor, ClassId, ClassOwner};
use crate::hooks::same_object;
use crate::module::{ClassFactory, ModuleKind};
use plugforge_foundation::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// `update_factory` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryUpdate {
    pub added: Vec<ClassId>,
    pub removed: Vec<ClassId>,
    /// 변경 알림을 받은 카테고리 (중복 없음)
    pub categories: Vec<String>,
}

impl FactoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl ClassRegistry {
    // ========================================================================
    // 런타임 팩토리
    // ========================================================================

    /// 파일 없이 팩토리 등록. 등록된 클래스 수 반환
    ///
    /// 이미 등록된 팩토리면 `update_factory` 와 같다.
    pub fn register_factory(&self, factory: Arc<dyn ClassFactory>) -> usize {
        let known = self
            .runtime
            .lock()
            .iter()
            .any(|entry| same_object(&entry.factory, &factory));
        if known {
            return self
                .update_factory(&factory)
                .map(|update| update.added.len())
                .unwrap_or(0);
        }

        let collection = ClassCollection::collect(factory.as_ref(), &self.config.language, None);
        let owner = ClassOwner::Runtime(Arc::downgrade(&factory));

        let mut classes = Vec::with_capacity(collection.len());
        {
            let mut store = self.classes.write();
            for class in collection.into_classes() {
                let class = Arc::new(class);
                class.set_owner(owner.clone());
                if store.add(class.clone(), &self.hooks) {
                    classes.push(class);
                } else {
                    class.unlink();
                }
            }
        }

        let count = classes.len();
        debug!(
            "Registered runtime factory {} with {} classes",
            factory.version().name,
            count
        );
        self.runtime.lock().push(RuntimeEntry { factory, classes });
        count
    }

    /// 팩토리 등록 해제. 그 팩토리가 등록한 클래스만 제거된다.
    pub fn unregister_factory(&self, factory: &Arc<dyn ClassFactory>) -> bool {
        let entry = {
            let mut runtime = self.runtime.lock();
            let Some(index) = runtime
                .iter()
                .position(|entry| same_object(&entry.factory, factory))
            else {
                return false;
            };
            runtime.remove(index)
        };

        let mut categories = BTreeSet::new();
        {
            let mut store = self.classes.write();
            let mut singletons = self.singletons.lock();
            for class in &entry.classes {
                if store.remove(class) {
                    categories.insert(class.category().to_string());
                }
                singletons.remove(&class.class_id());
            }
        }
        self.publish_category_changes(&categories);
        true
    }

    /// 팩토리의 현재 클래스 목록을 다시 읽어 차이만 반영
    ///
    /// 남아 있는 클래스의 디스크립터는 그대로 유지된다. 추가/삭제가 있었던 카테고리마다
    /// 변경 알림이 한 번씩 발행된다.
    pub fn update_factory(&self, factory: &Arc<dyn ClassFactory>) -> Result<FactoryUpdate> {
        let collection = ClassCollection::collect(factory.as_ref(), &self.config.language, None);
        let current: HashSet<ClassId> = collection.classes().iter().map(|c| c.class_id()).collect();
        let owner = ClassOwner::Runtime(Arc::downgrade(factory));

        let mut update = FactoryUpdate::default();
        let mut categories = BTreeSet::new();
        {
            let mut runtime = self.runtime.lock();
            let entry = runtime
                .iter_mut()
                .find(|entry| same_object(&entry.factory, factory))
                .ok_or_else(|| Error::NotFound("factory is not registered".to_string()))?;

            let mut store = self.classes.write();
            let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut entry.classes)
                .into_iter()
                .partition(|class| current.contains(&class.class_id()));

            for class in &removed {
                debug_assert_eq!(
                    class.live_instances(),
                    0,
                    "removing class with live instances"
                );
                if store.remove(class) {
                    categories.insert(class.category().to_string());
                }
                self.singletons.lock().remove(&class.class_id());
                update.removed.push(class.class_id());
            }

            let known: HashSet<ClassId> = kept.iter().map(|c| c.class_id()).collect();
            entry.classes = kept;
            for class in collection.into_classes() {
                if known.contains(&class.class_id()) {
                    continue;
                }
                let class = Arc::new(class);
                class.set_owner(owner.clone());
                if store.add(class.clone(), &self.hooks) {
                    categories.insert(class.category().to_string());
                    update.added.push(class.class_id());
                    entry.classes.push(class);
                } else {
                    class.unlink();
                }
            }
        }

        self.publish_category_changes(&categories);
        update.categories = categories.into_iter().collect();
        Ok(update)
    }

    pub fn runtime_factory_count(&self) -> usize {
        self.runtime.lock().len()
    }

    // ========================================================================
    // 대체 클래스
    // ========================================================================

    /// 폐기된 클래스 ID 를 대체하는 클래스
    ///
    /// 런타임 팩토리에 `old_id` 의 `Class:AlternativeClassID` 속성을 먼저 묻고, 없으면 모든
    /// 디스크립터의 `Class:AlternativeClassID` 목록을 선형 탐색한다. 실패한 ID 는 새 클래스가
    /// 등록될 때까지 기억된다.
    pub fn alternative_class(&self, old_id: &ClassId) -> Option<Arc<ClassDescriptor>> {
        if self.classes.read().is_known_alternative_miss(old_id) {
            return None;
        }

        let factories: Vec<_> = self
            .runtime
            .lock()
            .iter()
            .map(|entry| entry.factory.clone())
            .collect();
        for factory in factories {
            let Some(list) = factory
                .class_attributes(old_id, &self.config.language)
                .and_then(|attrs| attrs.get_str(meta::ALTERNATIVE_CLASS_ID).map(str::to_string))
            else {
                continue;
            };
            let found = list
                .split(',')
                .filter_map(ClassId::parse)
                .find_map(|id| self.class(&id));
            if found.is_some() {
                return found;
            }
        }

        // 탐색과 실패 기록은 같은 쓰기 락 안에서
        self.alternative_scans.fetch_add(1, Ordering::Relaxed);
        let mut store = self.classes.write();
        let found = store
            .iter()
            .find(|class| class.alternative_class_ids().contains(old_id))
            .cloned();
        if found.is_none() {
            store.record_alternative_miss(*old_id);
        }
        found
    }

    /// 대체 클래스 선형 탐색이 실행된 횟수
    pub fn alternative_scan_count(&self) -> usize {
        self.alternative_scans.load(Ordering::Relaxed)
    }

    // ========================================================================
    // 로더 해제
    // ========================================================================

    /// 로더 해제. 그 로더로 만든 모듈과 클래스도 모두 제거된다.
    pub fn unregister_loader(&self, kind: ModuleKind) -> bool {
        let Some(loader) = self.loaders.write().unregister(kind) else {
            return false;
        };

        let modules: Vec<_> = self
            .modules()
            .into_iter()
            .filter(|module| same_object(module.loader(), &loader))
            .collect();

        let mut categories = BTreeSet::new();
        for module in &modules {
            categories.extend(self.detach_module(module));
            module.force_unload();
        }
        self.publish_category_changes(&categories);

        info!(
            "Unregistered {} loader ({} modules removed)",
            kind,
            modules.len()
        );
        true
    }
}
