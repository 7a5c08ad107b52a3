//! Class Collection - 팩토리에서 클래스 목록 수집

use super::{ClassDescriptor, ClassFlags, VersionDescriptor};
use crate::hooks::ClassFilter;
use crate::module::ClassFactory;
use plugforge_foundation::{AttrValue, Attributes};
use std::sync::Arc;
use tracing::warn;

/// 팩토리 하나에서 수집한 클래스 목록
#[derive(Debug)]
pub struct ClassCollection {
    version: Arc<VersionDescriptor>,
    classes: Vec<ClassDescriptor>,
    discardable: bool,
}

impl ClassCollection {
    /// 팩토리 질의
    ///
    /// 식별자가 유효하지 않은 클래스는 건너뛴다. discardable 플래그가 있는 클래스가
    /// 하나라도 있으면 컬렉션 전체가 discardable 이 된다.
    pub fn collect(
        factory: &dyn ClassFactory,
        language: &str,
        filter: Option<&dyn ClassFilter>,
    ) -> Self {
        factory.update_classes();

        let mut discardable = factory.has_discardable_classes();
        let version = Arc::new(factory.version());
        let mut classes = Vec::with_capacity(factory.class_count());

        for index in 0..factory.class_count() {
            let Some(info) = factory.class_info(index) else {
                continue;
            };
            if !info.class_id.is_valid() {
                warn!("Skipping class '{}' with invalid id", info.name);
                continue;
            }
            if info.flags.contains(ClassFlags::DISCARDABLE) {
                discardable = true;
            }

            let attributes = factory
                .class_attributes(&info.class_id, language)
                .unwrap_or_default();
            let class = ClassDescriptor::new(info, version.clone(), attributes);
            if filter.map_or(true, |f| f.matches(&class)) {
                classes.push(class);
            }
        }

        Self {
            version,
            classes,
            discardable,
        }
    }

    pub fn version(&self) -> &Arc<VersionDescriptor> {
        &self.version
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn into_classes(self) -> Vec<ClassDescriptor> {
        self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn is_discardable(&self) -> bool {
        self.discardable
    }

    /// 외부 전달용 클래스 데이터 (`version`, `discardable`, `Classes`)
    pub fn to_class_data(&self) -> Attributes {
        let classes: Vec<AttrValue> = self
            .classes
            .iter()
            .map(|class| AttrValue::Object(class.to_snapshot()))
            .collect();
        Attributes::new()
            .with("discardable", self.discardable)
            .with("version", self.version.to_attributes())
            .with("Classes", classes)
    }
}
