//! Hooks - 모듈 로드 훅과 클래스 필터

use crate::class::ClassDescriptor;
use crate::module::CodeModule;
use parking_lot::RwLock;
use std::sync::Arc;

// ============================================================================
// Traits
// ============================================================================

/// 모듈 로드/언로드 알림
pub trait LoaderHook: Send + Sync {
    fn on_load(&self, _module: &CodeModule) {}

    fn on_unload(&self, _module: &CodeModule) {}
}

/// 클래스 등록 필터. `false` 를 반환하면 등록이 거부된다.
pub trait ClassFilter: Send + Sync {
    fn matches(&self, class: &ClassDescriptor) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&ClassDescriptor) -> bool + Send + Sync,
{
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self(class)
    }
}

// ============================================================================
// HookList
// ============================================================================

/// 등록된 훅과 필터 목록
#[derive(Default)]
pub struct HookList {
    hooks: RwLock<Vec<Arc<dyn LoaderHook>>>,
    filters: RwLock<Vec<Arc<dyn ClassFilter>>>,
}

impl HookList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_loader_hook(&self, hook: Arc<dyn LoaderHook>) {
        self.hooks.write().push(hook);
    }

    /// 훅 제거. 제거되었는지 반환
    pub fn remove_loader_hook(&self, hook: &Arc<dyn LoaderHook>) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|h| !same_object(h, hook));
        hooks.len() != before
    }

    pub fn add_class_filter(&self, filter: Arc<dyn ClassFilter>) {
        self.filters.write().push(filter);
    }

    pub fn remove_class_filter(&self, filter: &Arc<dyn ClassFilter>) -> bool {
        let mut filters = self.filters.write();
        let before = filters.len();
        filters.retain(|f| !same_object(f, filter));
        filters.len() != before
    }

    /// 모든 필터를 통과하는지
    pub fn accepts(&self, class: &ClassDescriptor) -> bool {
        self.filters.read().iter().all(|f| f.matches(class))
    }

    pub fn notify_load(&self, module: &CodeModule) {
        for hook in self.hooks.read().iter() {
            hook.on_load(module);
        }
    }

    pub fn notify_unload(&self, module: &CodeModule) {
        for hook in self.hooks.read().iter() {
            hook.on_unload(module);
        }
    }
}

/// vtable 을 제외한 주소 비교
pub(crate) fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassId, ClassInfo, VersionDescriptor};
    use plugforge_foundation::Attributes;

    #[test]
    fn test_filters_all_must_accept() {
        let hooks = HookList::new();
        let class = ClassDescriptor::new(
            ClassInfo::new(ClassId::generate(), "Effect", "Reverb"),
            Arc::new(VersionDescriptor::default()),
            Attributes::new(),
        );
        assert!(hooks.accepts(&class));

        let by_category: Arc<dyn ClassFilter> = Arc::new(|c: &ClassDescriptor| c.category() == "Effect");
        let by_name: Arc<dyn ClassFilter> = Arc::new(|c: &ClassDescriptor| c.name() != "Reverb");
        hooks.add_class_filter(by_category.clone());
        assert!(hooks.accepts(&class));
        hooks.add_class_filter(by_name.clone());
        assert!(!hooks.accepts(&class));

        assert!(hooks.remove_class_filter(&by_name));
        assert!(!hooks.remove_class_filter(&by_name));
        assert!(hooks.accepts(&class));
    }
}
