//! Plugin Instance - 클래스 인스턴스 핸들
//!
//! 핸들은 디스크립터와 소유 모듈을 강하게 참조한다. 핸들이 drop 되면 모듈의
//! 인스턴스 카운트가 줄고 언로드 검사가 실행된다.

use crate::class::{ClassDescriptor, ClassId};
use crate::module::{CodeModule, ModuleKind, PluginObject};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 플러그인 인스턴스
pub struct PluginInstance {
    object: PluginObject,
    class: Arc<ClassDescriptor>,
    module: Option<Arc<CodeModule>>,
}

impl PluginInstance {
    /// 모듈의 인스턴스 카운트는 호출자가 미리 올려둔 상태여야 한다
    pub(crate) fn new(
        object: PluginObject,
        class: Arc<ClassDescriptor>,
        module: Option<Arc<CodeModule>>,
    ) -> Self {
        class.instance_created();
        Self {
            object,
            class,
            module,
        }
    }

    pub fn object(&self) -> &PluginObject {
        &self.object
    }

    /// 인스턴스의 클래스
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn class_id(&self) -> ClassId {
        self.class.class_id()
    }

    pub fn module(&self) -> Option<&Arc<CodeModule>> {
        self.module.as_ref()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// 구체 타입으로 공유 참조 획득
    ///
    /// 반환된 `Arc` 는 핸들보다 오래 살 수 있지만 모듈 코드의 수명은 핸들이 결정한다.
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("class", &self.class.qualified_name())
            .field("module", &self.module.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        // 언로드 검사 전에 객체를 먼저 해제
        let object = std::mem::replace(&mut self.object, Arc::new(()) as PluginObject);
        let shared = Arc::strong_count(&object) > 1;
        drop(object);

        self.class.instance_released();

        let Some(module) = self.module.take() else {
            return;
        };
        if shared && module.kind() == ModuleKind::Script && !self.class.is_singleton() {
            warn!(
                "Deleted script object from \"{}\" is still referenced",
                module.path().display()
            );
        }
        module.release_instance();
        module.check_unload(false);
    }
}
