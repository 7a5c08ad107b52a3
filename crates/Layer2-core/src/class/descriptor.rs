//! Class Descriptor - 등록된 클래스 하나에 대한 불변 메타데이터

use super::{meta, ClassId};
use crate::module::{ClassFactory, CodeModule};
use bitflags::bitflags;
use parking_lot::RwLock;
use plugforge_foundation::{AttrValue, Attributes};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// 클래스 URL 프로토콜
pub const CLASS_URL_SCHEME: &str = "class";

// ============================================================================
// ClassFlags
// ============================================================================

bitflags! {
    /// 클래스 플래그
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u32 {
        /// 모든 호출자가 같은 인스턴스를 공유
        const SINGLETON = 1 << 0;
        /// 클래스 목록이 환경에 따라 바뀔 수 있음 (캐시되지 않음)
        const DISCARDABLE = 1 << 1;
        /// 목록 UI 에서 숨김
        const HIDDEN = 1 << 2;
    }
}

// ============================================================================
// VersionDescriptor
// ============================================================================

/// 모듈 버전 정보. 같은 모듈의 모든 클래스가 공유한다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub name: String,
    pub version: String,
    pub vendor: String,
    pub copyright: String,
    pub url: String,
}

impl VersionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = copyright.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// 빈 필드는 기록하지 않는다
    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        for (key, value) in [
            ("name", &self.name),
            ("version", &self.version),
            ("vendor", &self.vendor),
            ("copyright", &self.copyright),
            ("url", &self.url),
        ] {
            if !value.is_empty() {
                attrs.set(key, value.as_str());
            }
        }
        attrs
    }

    pub fn from_attributes(attrs: &Attributes) -> Self {
        let field = |key: &str| attrs.get_str(key).unwrap_or_default().to_string();
        Self {
            name: field("name"),
            version: field("version"),
            vendor: field("vendor"),
            copyright: field("copyright"),
            url: field("url"),
        }
    }
}

// ============================================================================
// ClassInfo
// ============================================================================

/// 팩토리가 제공하는 클래스 기본 정보
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassInfo {
    pub class_id: ClassId,
    pub category: String,
    pub name: String,
    pub sub_category: String,
    pub description: String,
    pub flags: ClassFlags,
}

impl ClassInfo {
    pub fn new(class_id: ClassId, category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_id,
            category: category.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = sub_category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }
}

// ============================================================================
// ClassOwner - 클래스를 제공하는 코드 리소스 (약한 참조)
// ============================================================================

/// 클래스 소유자
#[derive(Clone, Default)]
pub enum ClassOwner {
    /// 아직 연결되지 않았거나 등록 해제됨
    #[default]
    Detached,
    /// 파일에서 로드되는 코드 모듈
    Module(Weak<CodeModule>),
    /// 런타임에 등록된 팩토리
    Runtime(Weak<dyn ClassFactory>),
}

impl fmt::Debug for ClassOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassOwner::Detached => f.write_str("Detached"),
            ClassOwner::Module(m) => match m.upgrade() {
                Some(module) => write!(f, "Module({})", module.path().display()),
                None => f.write_str("Module(<dropped>)"),
            },
            ClassOwner::Runtime(_) => f.write_str("Runtime"),
        }
    }
}

// ============================================================================
// ClassDescriptor
// ============================================================================

/// 클래스 디스크립터
///
/// 식별자/이름/카테고리는 등록 이후 바뀌지 않는다. 속성만 [`ClassDescriptor::set_attribute`]
/// 로 갱신할 수 있다.
#[derive(Debug)]
pub struct ClassDescriptor {
    info: ClassInfo,
    version: Arc<VersionDescriptor>,
    attributes: RwLock<Attributes>,
    owner: RwLock<ClassOwner>,
    live_instances: AtomicUsize,
}

impl ClassDescriptor {
    pub fn new(info: ClassInfo, version: Arc<VersionDescriptor>, attributes: Attributes) -> Self {
        Self {
            info,
            version,
            attributes: RwLock::new(attributes),
            owner: RwLock::new(ClassOwner::Detached),
            live_instances: AtomicUsize::new(0),
        }
    }

    // ========================================================================
    // 기본 정보
    // ========================================================================

    pub fn info(&self) -> &ClassInfo {
        &self.info
    }

    pub fn class_id(&self) -> ClassId {
        self.info.class_id
    }

    pub fn category(&self) -> &str {
        &self.info.category
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn sub_category(&self) -> &str {
        &self.info.sub_category
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn flags(&self) -> ClassFlags {
        self.info.flags
    }

    pub fn is_singleton(&self) -> bool {
        self.info.flags.contains(ClassFlags::SINGLETON)
    }

    pub fn is_discardable(&self) -> bool {
        self.info.flags.contains(ClassFlags::DISCARDABLE)
    }

    pub fn version(&self) -> &Arc<VersionDescriptor> {
        &self.version
    }

    /// `category:name` 또는 `category:subCategory:name`
    pub fn qualified_name(&self) -> String {
        if self.info.sub_category.is_empty() {
            format!("{}:{}", self.info.category, self.info.name)
        } else {
            format!(
                "{}:{}:{}",
                self.info.category, self.info.sub_category, self.info.name
            )
        }
    }

    /// `class://{UID}/category/name`
    pub fn class_url(&self) -> String {
        format!(
            "{}://{}/{}/{}",
            CLASS_URL_SCHEME, self.info.class_id, self.info.category, self.info.name
        )
    }

    /// 클래스 URL 에서 식별자 추출. `class` 프로토콜만 허용
    pub fn class_id_from_url(url: &str) -> Option<ClassId> {
        let rest = url.strip_prefix(CLASS_URL_SCHEME)?.strip_prefix("://")?;
        let host = rest.split('/').next()?;
        ClassId::parse(host)
    }

    // ========================================================================
    // 속성
    // ========================================================================

    /// 속성 전체 복사본
    pub fn attributes(&self) -> Attributes {
        self.attributes.read().clone()
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.attributes.read().get(key).cloned()
    }

    pub fn set_attribute(&self, key: &str, value: AttrValue) {
        self.attributes.write().set(key, value);
    }

    fn string_attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .read()
            .get_str(key)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn vendor(&self) -> Option<String> {
        self.string_attribute(meta::CLASS_VENDOR)
    }

    pub fn localized_name(&self) -> String {
        self.string_attribute(meta::LOCALIZED_NAME)
            .unwrap_or_else(|| self.info.name.clone())
    }

    pub fn localized_sub_category(&self) -> String {
        self.string_attribute(meta::LOCALIZED_SUB_CATEGORY)
            .unwrap_or_else(|| self.info.sub_category.clone())
    }

    pub fn localized_description(&self) -> String {
        self.string_attribute(meta::LOCALIZED_DESCRIPTION)
            .unwrap_or_else(|| self.info.description.clone())
    }

    pub fn alternative_class_name(&self) -> Option<String> {
        self.string_attribute(meta::ALTERNATIVE_CLASS_NAME)
    }

    /// 쉼표로 구분된 대체 클래스 ID 목록
    pub fn alternative_class_ids(&self) -> Vec<ClassId> {
        self.string_attribute(meta::ALTERNATIVE_CLASS_ID)
            .map(|list| list.split(',').filter_map(ClassId::parse).collect())
            .unwrap_or_default()
    }

    pub fn meta_class_id(&self) -> Option<ClassId> {
        self.string_attribute(meta::META_CLASS_ID)
            .and_then(|s| ClassId::parse(&s))
    }

    // ========================================================================
    // 소유자
    // ========================================================================

    pub fn owner(&self) -> ClassOwner {
        self.owner.read().clone()
    }

    pub fn set_owner(&self, owner: ClassOwner) {
        *self.owner.write() = owner;
    }

    /// 소유 모듈 (살아있는 경우)
    pub fn module(&self) -> Option<Arc<CodeModule>> {
        match &*self.owner.read() {
            ClassOwner::Module(module) => module.upgrade(),
            _ => None,
        }
    }

    pub fn is_owned_by(&self, module: &Arc<CodeModule>) -> bool {
        match &*self.owner.read() {
            ClassOwner::Module(owner) => std::ptr::eq(owner.as_ptr(), Arc::as_ptr(module)),
            _ => false,
        }
    }

    /// 등록 해제 시 소유자 연결을 끊는다
    pub fn unlink(&self) {
        *self.owner.write() = ClassOwner::Detached;
    }

    pub fn is_linked(&self) -> bool {
        !matches!(&*self.owner.read(), ClassOwner::Detached)
    }

    // ========================================================================
    // 인스턴스 카운트 (디버그 검증용)
    // ========================================================================

    pub fn live_instances(&self) -> usize {
        self.live_instances.load(Ordering::Acquire)
    }

    pub(crate) fn instance_created(&self) {
        self.live_instances.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn instance_released(&self) {
        let _ = self
            .live_instances
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    // ========================================================================
    // 스냅샷 (캐시 저장 형식)
    // ========================================================================

    /// 캐시에 저장할 스냅샷. discardable 플래그는 저장하지 않는다.
    pub fn to_snapshot(&self) -> Attributes {
        let mut snapshot = Attributes::new()
            .with(
                "classFlags",
                (self.info.flags - ClassFlags::DISCARDABLE).bits(),
            )
            .with("classID", self.info.class_id.to_string())
            .with("category", self.info.category.as_str())
            .with("name", self.info.name.as_str());

        if !self.info.sub_category.is_empty() {
            snapshot.set("subCategory", self.info.sub_category.as_str());
        }
        if !self.info.description.is_empty() {
            snapshot.set("description", self.info.description.as_str());
        }
        let attributes = self.attributes.read();
        if !attributes.is_empty() {
            snapshot.set("attributes", attributes.clone());
        }
        snapshot
    }

    /// 스냅샷 복원. 식별자가 잘못되었거나 이름/카테고리가 비어 있으면 `None`
    pub fn from_snapshot(snapshot: &Attributes, version: Arc<VersionDescriptor>) -> Option<Self> {
        let class_id = ClassId::parse(snapshot.get_str("classID")?)?;
        if !class_id.is_valid() {
            return None;
        }
        let name = snapshot.get_str("name").filter(|s| !s.is_empty())?;
        let category = snapshot.get_str("category").filter(|s| !s.is_empty())?;

        let flags = snapshot
            .get_int("classFlags")
            .map(|bits| ClassFlags::from_bits_truncate(bits as u32))
            .unwrap_or_default();

        let info = ClassInfo {
            class_id,
            category: category.to_string(),
            name: name.to_string(),
            sub_category: snapshot.get_str("subCategory").unwrap_or_default().to_string(),
            description: snapshot.get_str("description").unwrap_or_default().to_string(),
            flags,
        };
        let attributes = snapshot.get_object("attributes").cloned().unwrap_or_default();
        Some(Self::new(info, version, attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassDescriptor {
        let info = ClassInfo::new(ClassId::generate(), "AudioEffect", "Reverb")
            .with_sub_category("Spatial/Room")
            .with_flags(ClassFlags::DISCARDABLE | ClassFlags::SINGLETON);
        let version = Arc::new(VersionDescriptor::new("FX Pack", "1.2").with_vendor("Acme"));
        ClassDescriptor::new(
            info,
            version,
            Attributes::new().with(meta::CLASS_VENDOR, "Acme Audio"),
        )
    }

    #[test]
    fn test_snapshot_strips_discardable() {
        let desc = sample();
        let snapshot = desc.to_snapshot();
        assert_eq!(
            snapshot.get_int("classFlags"),
            Some(ClassFlags::SINGLETON.bits() as i64)
        );
        assert!(!snapshot.contains("description"));

        let restored = ClassDescriptor::from_snapshot(&snapshot, desc.version().clone()).unwrap();
        assert_eq!(restored.class_id(), desc.class_id());
        assert_eq!(restored.sub_category(), "Spatial/Room");
        assert!(restored.is_singleton());
        assert!(!restored.is_discardable());
        assert_eq!(restored.vendor().as_deref(), Some("Acme Audio"));
    }

    #[test]
    fn test_snapshot_rejects_incomplete() {
        let version = Arc::new(VersionDescriptor::default());
        let missing_name = Attributes::new()
            .with("classID", ClassId::generate().to_string())
            .with("category", "AudioEffect");
        assert!(ClassDescriptor::from_snapshot(&missing_name, version.clone()).is_none());

        let nil_id = Attributes::new()
            .with("classID", ClassId::nil().to_string())
            .with("category", "AudioEffect")
            .with("name", "X");
        assert!(ClassDescriptor::from_snapshot(&nil_id, version).is_none());
    }

    #[test]
    fn test_class_url() {
        let desc = sample();
        let url = desc.class_url();
        assert!(url.starts_with("class://{"));
        assert!(url.ends_with("/AudioEffect/Reverb"));
        assert_eq!(ClassDescriptor::class_id_from_url(&url), Some(desc.class_id()));
        assert_eq!(ClassDescriptor::class_id_from_url("file:///tmp/x"), None);
    }

    #[test]
    fn test_localized_fallbacks() {
        let desc = sample();
        assert_eq!(desc.localized_name(), "Reverb");
        desc.set_attribute(meta::LOCALIZED_NAME, "Hall".into());
        assert_eq!(desc.localized_name(), "Hall");
        assert_eq!(desc.qualified_name(), "AudioEffect:Spatial/Room:Reverb");
    }

    #[test]
    fn test_alternative_ids_list() {
        let desc = sample();
        let a = ClassId::generate();
        let b = ClassId::generate();
        desc.set_attribute(
            meta::ALTERNATIVE_CLASS_ID,
            format!("{}, {}", a, b).into(),
        );
        assert_eq!(desc.alternative_class_ids(), vec![a, b]);
    }

    #[test]
    fn test_version_attributes_skip_empty() {
        let version = VersionDescriptor::new("Pack", "2.0").with_url("https://example.com");
        let attrs = version.to_attributes();
        assert!(!attrs.contains("vendor"));
        assert_eq!(VersionDescriptor::from_attributes(&attrs), version);
    }
}
