//! Scan Cache - 모듈별 클래스 목록 영속 캐시
//!
//! 섹션 하나가 모듈 하나에 대응한다 (키는 [`SettingsKey`]).
//! `numClasses` 표식은 스냅샷 목록이 모두 기록되었음을 나타내는 자기 일관성 검사용이다.

use super::SettingsKey;
use crate::class::{ClassCollection, ClassDescriptor, ClassId, VersionDescriptor};
use crate::hooks::ClassFilter;
use chrono::{DateTime, Utc};
use plugforge_foundation::{AttrValue, Attributes, Error, Result, Settings};
use std::path::PathBuf;
use std::sync::Arc;

/// 섹션 키 이름
pub mod keys {
    pub const MODIFIED: &str = "modified";
    pub const VERSION: &str = "version";
    pub const CLASSES: &str = "Classes";
    pub const NUM_CLASSES: &str = "numClasses";
    pub const DISCARDABLE: &str = "discardable";
}

/// 캐시에서 복원한 모듈 정보
#[derive(Debug)]
pub struct CachedModule {
    pub version: Arc<VersionDescriptor>,
    pub classes: Vec<ClassDescriptor>,
}

/// 스캔 캐시
#[derive(Debug)]
pub struct ScanCache {
    settings: Settings,
}

impl ScanCache {
    pub fn open(dir: impl Into<PathBuf>, file_name: impl Into<String>, auto_save: bool) -> Self {
        Self {
            settings: Settings::open(dir, file_name).with_auto_save(auto_save),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn contains(&self, key: &SettingsKey) -> bool {
        self.settings.contains(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    // ========================================================================
    // 수정 시각
    // ========================================================================

    pub fn modified_time(&self, key: &SettingsKey) -> Option<DateTime<Utc>> {
        let millis = self.settings.section(key.as_str())?.get_int(keys::MODIFIED)?;
        DateTime::from_timestamp_millis(millis)
    }

    pub fn set_modified_time(&mut self, key: &SettingsKey, time: DateTime<Utc>) -> Result<()> {
        self.settings.update_section(key.as_str(), |section| {
            section.set(keys::MODIFIED, time.timestamp_millis())
        })
    }

    // ========================================================================
    // 저장 / 복원
    // ========================================================================

    /// 수집 결과 기록
    ///
    /// discardable 모듈은 `keep_discardable` 일 때만 스냅샷을 남긴다. `numClasses` 는
    /// 항상 수집된 개수이므로 스냅샷 없는 discardable 엔트리는 복원 시 불일치로 재스캔된다.
    pub fn store(
        &mut self,
        key: &SettingsKey,
        collection: &ClassCollection,
        keep_discardable: bool,
    ) -> Result<()> {
        let store_snapshots = keep_discardable || !collection.is_discardable();
        self.settings.update_section(key.as_str(), |section| {
            let modified = section.get(keys::MODIFIED).cloned();
            section.clear();
            if let Some(modified) = modified {
                section.set(keys::MODIFIED, modified);
            }

            section.set(keys::VERSION, collection.version().to_attributes());
            section.set(keys::CLASSES, Vec::<AttrValue>::new());
            if store_snapshots {
                for class in collection.classes() {
                    section.queue(keys::CLASSES, class.to_snapshot());
                }
            }
            section.set(keys::NUM_CLASSES, collection.len());
            if collection.is_discardable() {
                section.set(keys::DISCARDABLE, true);
            }
        })
    }

    /// 외부에서 스캔한 클래스 데이터 주입. 기록된 클래스 수 반환
    pub fn store_class_data(
        &mut self,
        key: &SettingsKey,
        modified: DateTime<Utc>,
        class_data: &Attributes,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<usize> {
        let version_attrs = class_data.get_object(keys::VERSION).cloned().unwrap_or_default();
        let version = Arc::new(VersionDescriptor::from_attributes(&version_attrs));

        let snapshots: Vec<Attributes> = class_data
            .get_list(keys::CLASSES)
            .unwrap_or_default()
            .iter()
            .filter_map(AttrValue::as_object)
            .filter(|snapshot| {
                ClassDescriptor::from_snapshot(snapshot, version.clone())
                    .is_some_and(|class| filter.map_or(true, |f| f.matches(&class)))
            })
            .cloned()
            .collect();
        let count = snapshots.len();

        let mut section = Attributes::new()
            .with(keys::MODIFIED, modified.timestamp_millis())
            .with(keys::VERSION, version.to_attributes())
            .with(keys::CLASSES, Vec::<AttrValue>::new())
            .with(keys::NUM_CLASSES, count);
        for snapshot in snapshots {
            section.queue(keys::CLASSES, snapshot);
        }
        self.settings.replace_section(key.as_str(), section)?;
        Ok(count)
    }

    /// 캐시 엔트리 복원
    ///
    /// discardable 엔트리(`keep_discardable` 이 아닐 때), 버전/표식 누락, 개수 불일치는
    /// 모두 [`Error::InvalidCacheEntry`] 이며 호출자는 재스캔해야 한다.
    pub fn restore(&self, key: &SettingsKey, keep_discardable: bool) -> Result<CachedModule> {
        let invalid = |reason: &str| Error::InvalidCacheEntry(format!("{}: {}", key, reason));

        let section = self
            .settings
            .section(key.as_str())
            .ok_or_else(|| invalid("no entry"))?;

        if !keep_discardable && section.get_bool(keys::DISCARDABLE).unwrap_or(false) {
            return Err(invalid("discardable"));
        }

        let version = section
            .get_object(keys::VERSION)
            .map(|v| Arc::new(VersionDescriptor::from_attributes(v)))
            .ok_or_else(|| invalid("missing version"))?;

        let expected = section
            .get_int(keys::NUM_CLASSES)
            .ok_or_else(|| invalid("missing class count"))?;

        let classes: Vec<ClassDescriptor> = section
            .get_list(keys::CLASSES)
            .unwrap_or_default()
            .iter()
            .filter_map(AttrValue::as_object)
            .filter_map(|snapshot| ClassDescriptor::from_snapshot(snapshot, version.clone()))
            .collect();

        if classes.len() as i64 != expected {
            return Err(invalid("class count mismatch"));
        }

        Ok(CachedModule { version, classes })
    }

    // ========================================================================
    // 개별 값
    // ========================================================================

    pub fn is_discardable(&self, key: &SettingsKey) -> bool {
        self.settings
            .section(key.as_str())
            .and_then(|s| s.get_bool(keys::DISCARDABLE))
            .unwrap_or(false)
    }

    /// 클래스가 없는 discardable 엔트리인지 (블록리스트 후보가 아니다)
    pub fn is_empty_discardable(&self, key: &SettingsKey) -> bool {
        self.settings.section(key.as_str()).is_some_and(|s| {
            s.get_bool(keys::DISCARDABLE).unwrap_or(false)
                && s.get_int(keys::NUM_CLASSES).unwrap_or(0) == 0
        })
    }

    pub fn set_discardable(&mut self, key: &SettingsKey) -> Result<()> {
        self.settings
            .update_section(key.as_str(), |s| s.set(keys::DISCARDABLE, true))
    }

    /// 저장된 스냅샷의 클래스 속성 갱신. 스냅샷을 찾았는지 반환
    pub fn update_class_attribute(
        &mut self,
        key: &SettingsKey,
        class_id: &ClassId,
        attribute: &str,
        value: AttrValue,
    ) -> Result<bool> {
        if !self.contains(key) {
            return Ok(false);
        }
        self.settings.update_section(key.as_str(), |section| {
            let Some(AttrValue::List(classes)) = section.remove(keys::CLASSES) else {
                return false;
            };
            let mut found = false;
            let classes = classes
                .into_iter()
                .map(|item| match item {
                    AttrValue::Object(mut snapshot)
                        if snapshot.get_str("classID").and_then(ClassId::parse)
                            == Some(*class_id) =>
                    {
                        let mut attributes =
                            snapshot.get_object("attributes").cloned().unwrap_or_default();
                        attributes.set(attribute, value.clone());
                        snapshot.set("attributes", attributes);
                        found = true;
                        AttrValue::Object(snapshot)
                    }
                    other => other,
                })
                .collect::<Vec<_>>();
            section.set(keys::CLASSES, classes);
            found
        })
    }

    pub fn remove(&mut self, key: &SettingsKey) -> Result<bool> {
        self.settings.remove_section(key.as_str())
    }

    // ========================================================================
    // 파일
    // ========================================================================

    pub fn flush(&mut self) -> Result<()> {
        self.settings.flush()
    }

    pub fn file_name(&self) -> &str {
        self.settings.file_name()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        self.settings.to_json_bytes()
    }

    /// 캐시 파일 삭제
    pub fn remove_file(&mut self) -> Result<()> {
        self.settings.remove_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassFlags, ClassInfo};
    use crate::module::StaticClassFactory;

    fn collection(discardable: bool, names: &[&str]) -> ClassCollection {
        let mut factory = StaticClassFactory::new(VersionDescriptor::new("Pack", "1.0"))
            .with_discardable(discardable);
        for name in names {
            factory = factory.with_data_class(
                ClassInfo::new(ClassId::generate(), "Effect", *name),
                Attributes::new().with("Class:Vendor", "Acme"),
            );
        }
        ClassCollection::collect(&factory, "en", None)
    }

    fn cache() -> (tempfile::TempDir, ScanCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScanCache::open(dir.path(), "Plugins.en.json", false);
        (dir, cache)
    }

    #[test]
    fn test_empty_discardable_entry() {
        let (_dir, mut cache) = cache();
        let empty = SettingsKey::from_raw("empty");
        let full = SettingsKey::from_raw("full");
        cache.store(&empty, &collection(false, &[]), false).unwrap();
        cache.store(&full, &collection(true, &["A"]), false).unwrap();
        assert!(!cache.is_empty_discardable(&empty));

        cache.set_discardable(&empty).unwrap();
        assert!(cache.is_empty_discardable(&empty));
        assert!(!cache.is_empty_discardable(&full));
        assert!(!cache.is_empty_discardable(&SettingsKey::from_raw("missing")));
    }

    #[test]
    fn test_store_and_restore() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        let collected = collection(false, &["A", "B"]);
        cache.store(&key, &collected, false).unwrap();

        let restored = cache.restore(&key, false).unwrap();
        assert_eq!(restored.version.name, "Pack");
        assert_eq!(restored.classes.len(), 2);
        assert_eq!(restored.classes[0].vendor().as_deref(), Some("Acme"));
    }

    #[test]
    fn test_discardable_needs_keep_flag() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        cache.store(&key, &collection(true, &["A"]), false).unwrap();

        assert!(cache.is_discardable(&key));
        assert!(matches!(
            cache.restore(&key, false),
            Err(Error::InvalidCacheEntry(_))
        ));
        // 스냅샷이 기록되지 않았으므로 keep 플래그로도 개수 불일치
        assert!(cache.restore(&key, true).is_err());

        cache.store(&key, &collection(true, &["A"]), true).unwrap();
        assert_eq!(cache.restore(&key, true).unwrap().classes.len(), 1);
    }

    #[test]
    fn test_count_mismatch_is_invalid() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        cache.store(&key, &collection(false, &["A", "B"]), false).unwrap();
        cache
            .settings
            .update_section(key.as_str(), |s| s.set(keys::NUM_CLASSES, 3))
            .unwrap();
        assert!(cache.restore(&key, false).is_err());

        cache
            .settings
            .update_section(key.as_str(), |s| {
                s.remove(keys::NUM_CLASSES);
            })
            .unwrap();
        assert!(cache.restore(&key, false).is_err());
    }

    #[test]
    fn test_confirmed_empty_entry_restores() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("empty");
        cache.store(&key, &collection(false, &[]), false).unwrap();
        let restored = cache.restore(&key, false).unwrap();
        assert!(restored.classes.is_empty());
    }

    #[test]
    fn test_modified_time_survives_store() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        let time = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        cache.set_modified_time(&key, time).unwrap();
        cache.store(&key, &collection(false, &["A"]), false).unwrap();
        assert_eq!(cache.modified_time(&key), Some(time));
    }

    #[test]
    fn test_update_class_attribute() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        let collected = collection(false, &["A"]);
        let class_id = collected.classes()[0].class_id();
        cache.store(&key, &collected, false).unwrap();

        assert!(cache
            .update_class_attribute(&key, &class_id, "Class:Favorite", true.into())
            .unwrap());
        let restored = cache.restore(&key, false).unwrap();
        assert_eq!(
            restored.classes[0].attribute("Class:Favorite"),
            Some(AttrValue::Bool(true))
        );
        assert!(!cache
            .update_class_attribute(&key, &ClassId::generate(), "x", 1.into())
            .unwrap());
    }

    #[test]
    fn test_store_class_data_applies_filter() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("ext");
        let data = collection(false, &["Keep", "Drop"]).to_class_data();
        let filter: &dyn ClassFilter = &|c: &ClassDescriptor| c.name() == "Keep";

        let count = cache
            .store_class_data(&key, Utc::now(), &data, Some(filter))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(cache.restore(&key, false).unwrap().classes[0].name(), "Keep");
    }

    #[test]
    fn test_flags_persist_without_discardable() {
        let (_dir, mut cache) = cache();
        let key = SettingsKey::from_raw("k1");
        let factory = StaticClassFactory::new(VersionDescriptor::default()).with_data_class(
            ClassInfo::new(ClassId::generate(), "Effect", "S")
                .with_flags(ClassFlags::SINGLETON | ClassFlags::DISCARDABLE),
            Attributes::new(),
        );
        let collected = ClassCollection::collect(&factory, "en", None);
        cache.store(&key, &collected, true).unwrap();

        let restored = cache.restore(&key, true).unwrap();
        assert!(restored.classes[0].is_singleton());
        assert!(!restored.classes[0].is_discardable());
    }
}
