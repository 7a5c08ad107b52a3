//! 인스턴스 생성과 지연 언로드

use super::ClassRegistry;
use crate::class::{ClassDescriptor, ClassId, ClassOwner};
use crate::instance::PluginInstance;
use crate::module::{CodeModule, PluginObject};
use plugforge_foundation::{Error, Result};
use std::any::Any;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

impl ClassRegistry {
    // ========================================================================
    // 인스턴스 생성
    // ========================================================================

    /// 클래스 인스턴스 생성
    ///
    /// 필요하면 모듈을 로드한다. 생성에 실패하면 모듈 언로드 검사가 바로 실행된다.
    pub fn create_instance(&self, class_id: &ClassId) -> Result<PluginInstance> {
        let class = self
            .class(class_id)
            .ok_or_else(|| Error::ClassNotFound(class_id.to_string()))?;
        self.instantiate(class)
    }

    /// 이름, UID 문자열 또는 클래스 URL 로 인스턴스 생성
    pub fn create_instance_by_name(&self, name: &str) -> Result<PluginInstance> {
        let class = self
            .lookup(name)
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))?;
        self.instantiate(class)
    }

    /// 구체 타입을 요구하는 인스턴스 생성
    pub fn create_instance_as<T: Any + Send + Sync>(
        &self,
        class_id: &ClassId,
    ) -> Result<(PluginInstance, Arc<T>)> {
        let instance = self.create_instance(class_id)?;
        match instance.downcast_arc::<T>() {
            Some(object) => Ok((instance, object)),
            None => Err(Error::InterfaceNotSupported(format!(
                "{} ({})",
                instance.class().qualified_name(),
                std::any::type_name::<T>()
            ))),
        }
    }

    fn instantiate(&self, class: Arc<ClassDescriptor>) -> Result<PluginInstance> {
        if class.is_singleton() {
            if let Some(instance) = self.existing_singleton(&class) {
                return Ok(instance);
            }
        }

        let instance = match class.owner() {
            ClassOwner::Module(module) => {
                let module = module
                    .upgrade()
                    .ok_or_else(|| Error::InstanceCreation(class.qualified_name()))?;
                self.instantiate_from_module(class, module)?
            }
            ClassOwner::Runtime(factory) => {
                let factory = factory
                    .upgrade()
                    .ok_or_else(|| Error::InstanceCreation(class.qualified_name()))?;
                let object = factory
                    .create_instance(&class.class_id())
                    .ok_or_else(|| Error::InstanceCreation(class.qualified_name()))?;
                PluginInstance::new(object, class, None)
            }
            ClassOwner::Detached => {
                return Err(Error::InstanceCreation(format!(
                    "{} is no longer registered",
                    class.qualified_name()
                )))
            }
        };

        if instance.class().is_singleton() {
            self.singletons
                .lock()
                .insert(instance.class_id(), Arc::downgrade(instance.object()));
        }
        Ok(instance)
    }

    fn instantiate_from_module(
        &self,
        class: Arc<ClassDescriptor>,
        module: Arc<CodeModule>,
    ) -> Result<PluginInstance> {
        // 카운트는 팩토리를 얻는 락 안에서 올라간다
        let factory = module
            .class_factory_for_instance()
            .map_err(|_| Error::InstanceCreation(class.qualified_name()))?;

        let object = factory.create_instance(&class.class_id());
        // 팩토리는 언로드 검사 전에 놓아야 한다
        drop(factory);

        match object {
            Some(object) => Ok(PluginInstance::new(object, class, Some(module))),
            None => {
                module.release_instance();
                module.check_unload(false);
                Err(Error::InstanceCreation(class.qualified_name()))
            }
        }
    }

    fn existing_singleton(&self, class: &Arc<ClassDescriptor>) -> Option<PluginInstance> {
        let object: PluginObject = self
            .singletons
            .lock()
            .get(&class.class_id())
            .and_then(|weak| weak.upgrade())?;
        let module = class.module();
        if let Some(module) = &module {
            module.add_instance();
        }
        Some(PluginInstance::new(object, class.clone(), module))
    }

    // ========================================================================
    // 언로드
    // ========================================================================

    /// 대기 중인 언로드와 인스턴스가 없는 로드된 모듈을 모두 언로드
    pub fn unload_unused_modules(&self) -> Result<usize> {
        if !self.unloads.is_main_context() {
            return Err(Error::WrongThread(
                "modules can only be unloaded on the main thread".to_string(),
            ));
        }

        let mut candidates = self.unloads.take_all();
        for module in self.modules.lock().iter() {
            if module.is_loaded() && !candidates.iter().any(|m| Arc::ptr_eq(m, module)) {
                candidates.push(module.clone());
            }
        }
        Ok(Self::unload_idle(candidates))
    }

    /// 마감 시각이 지난 지연 언로드 처리. 언로드된 모듈 수 반환
    pub fn poll_deferred_unloads_at(&self, now: Instant) -> usize {
        if !self.unloads.is_main_context() {
            return 0;
        }
        let due = self.unloads.take_due(now);
        if due.is_empty() {
            return 0;
        }
        let count = Self::unload_idle(due);
        debug!("Deferred unload pass released {} modules", count);
        count
    }

    pub fn poll_deferred_unloads(&self) -> usize {
        self.poll_deferred_unloads_at(Instant::now())
    }

    /// 지연 언로드 구동 루프
    ///
    /// 레지스트리를 만든 스레드의 런타임에서 실행해야 한다 (예: current-thread 런타임이나
    /// `LocalSet`). 반환하지 않는다.
    pub async fn run_deferred_unloads(&self) {
        loop {
            self.unloads.wait_due().await;
            self.poll_deferred_unloads();
        }
    }

    pub fn pending_unload_count(&self) -> usize {
        self.unloads.len()
    }

    fn unload_idle(modules: Vec<Arc<CodeModule>>) -> usize {
        let mut unloaded = 0;
        for module in modules {
            if module.unload_if_idle() {
                unloaded += 1;
            }
        }
        unloaded
    }
}
