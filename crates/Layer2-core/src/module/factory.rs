//! Class Factory - 코드 리소스가 노출하는 클래스 생성기

use crate::class::{ClassFlags, ClassId, ClassInfo, VersionDescriptor};
use parking_lot::RwLock;
use plugforge_foundation::Attributes;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

/// 플러그인 인스턴스 (타입 소거)
pub type PluginObject = Arc<dyn Any + Send + Sync>;

/// 인스턴스 생성자
pub type Constructor = Arc<dyn Fn() -> PluginObject + Send + Sync>;

// ============================================================================
// ClassFactory
// ============================================================================

/// 클래스 팩토리
pub trait ClassFactory: Send + Sync {
    /// 모듈 버전 정보
    fn version(&self) -> VersionDescriptor;

    /// 클래스 개수
    fn class_count(&self) -> usize;

    /// 인덱스의 클래스 정보
    fn class_info(&self, index: usize) -> Option<ClassInfo>;

    /// 언어별 클래스 속성
    fn class_attributes(&self, _class_id: &ClassId, _language: &str) -> Option<Attributes> {
        None
    }

    /// 인스턴스 생성. 지원하지 않는 클래스면 `None`
    fn create_instance(&self, class_id: &ClassId) -> Option<PluginObject>;

    /// 클래스 목록 갱신 요청 (수집 직전에 호출)
    fn update_classes(&self) {}

    /// 환경에 따라 바뀌는 클래스를 가지고 있는지
    fn has_discardable_classes(&self) -> bool {
        false
    }
}

// ============================================================================
// CodeResource
// ============================================================================

/// 로드된 코드 리소스. drop 되면 언로드된다.
pub trait CodeResource: Send + Sync {
    fn class_factory(&self) -> Arc<dyn ClassFactory>;

    fn path(&self) -> &Path;

    /// 패키지 메타 정보 (있는 경우)
    fn meta_info(&self) -> Option<Attributes> {
        None
    }
}

// ============================================================================
// StaticClassFactory - 메모리 내 팩토리
// ============================================================================

struct StaticClass {
    info: ClassInfo,
    attributes: Attributes,
    constructor: Option<Constructor>,
}

/// 고정된 클래스 목록을 가진 팩토리
///
/// 코어 모듈, 런타임 등록, 스크립트 패키지가 사용한다. 클래스 목록은 나중에
/// 추가/삭제할 수 있으며 `update_factory` 로 레지스트리에 반영한다.
pub struct StaticClassFactory {
    version: VersionDescriptor,
    classes: RwLock<Vec<StaticClass>>,
    discardable: bool,
}

impl StaticClassFactory {
    pub fn new(version: VersionDescriptor) -> Self {
        Self {
            version,
            classes: RwLock::new(Vec::new()),
            discardable: false,
        }
    }

    /// 생성자가 있는 클래스 추가
    pub fn with_class<F>(self, info: ClassInfo, attributes: Attributes, constructor: F) -> Self
    where
        F: Fn() -> PluginObject + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(constructor);
        self.add_class(info, attributes, Some(constructor));
        self
    }

    /// 인스턴스를 만들 수 없는 (메타데이터 전용) 클래스 추가
    pub fn with_data_class(self, info: ClassInfo, attributes: Attributes) -> Self {
        self.add_class(info, attributes, None);
        self
    }

    pub fn with_discardable(mut self, discardable: bool) -> Self {
        self.discardable = discardable;
        self
    }

    pub fn add_class(&self, info: ClassInfo, attributes: Attributes, constructor: Option<Constructor>) {
        self.classes.write().push(StaticClass {
            info,
            attributes,
            constructor,
        });
    }

    /// 클래스 삭제. 삭제되었는지 반환
    pub fn remove_class(&self, class_id: &ClassId) -> bool {
        let mut classes = self.classes.write();
        let before = classes.len();
        classes.retain(|c| c.info.class_id != *class_id);
        classes.len() != before
    }
}

impl ClassFactory for StaticClassFactory {
    fn version(&self) -> VersionDescriptor {
        self.version.clone()
    }

    fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    fn class_info(&self, index: usize) -> Option<ClassInfo> {
        self.classes.read().get(index).map(|c| c.info.clone())
    }

    fn class_attributes(&self, class_id: &ClassId, _language: &str) -> Option<Attributes> {
        self.classes
            .read()
            .iter()
            .find(|c| c.info.class_id == *class_id)
            .map(|c| c.attributes.clone())
    }

    fn create_instance(&self, class_id: &ClassId) -> Option<PluginObject> {
        let constructor = self
            .classes
            .read()
            .iter()
            .find(|c| c.info.class_id == *class_id)
            .and_then(|c| c.constructor.clone())?;
        Some(constructor())
    }

    fn has_discardable_classes(&self) -> bool {
        self.discardable
            || self
                .classes
                .read()
                .iter()
                .any(|c| c.info.flags.contains(ClassFlags::DISCARDABLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_factory_creates_instances() {
        let id = ClassId::generate();
        let factory = StaticClassFactory::new(VersionDescriptor::new("Pack", "1.0")).with_class(
            ClassInfo::new(id, "Effect", "Gain"),
            Attributes::new(),
            || Arc::new(42u32) as PluginObject,
        );

        assert_eq!(factory.class_count(), 1);
        let object = factory.create_instance(&id).unwrap();
        assert_eq!(object.downcast_ref::<u32>(), Some(&42));
        assert!(factory.create_instance(&ClassId::generate()).is_none());
    }

    #[test]
    fn test_data_class_has_no_instances() {
        let id = ClassId::generate();
        let factory = StaticClassFactory::new(VersionDescriptor::default())
            .with_data_class(ClassInfo::new(id, "Effect", "Preset"), Attributes::new());
        assert!(factory.create_instance(&id).is_none());
        assert!(factory.remove_class(&id));
        assert_eq!(factory.class_count(), 0);
    }
}
