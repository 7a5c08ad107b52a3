//! 블록리스트 조작

use super::ClassRegistry;
use crate::cache::{BlocklistEntry, SettingsKey};
use crate::events::{EventType, RegistryEvent};
use plugforge_foundation::Result;
use std::path::Path;
use tracing::info;

impl ClassRegistry {
    /// 모듈을 블록리스트에 추가. 대상은 모듈 경로 또는 `blocklist://<key>` URL
    ///
    /// 이미 등록된 모듈이면 그 클래스와 모듈도 레지스트리에서 제거한다.
    /// 블록리스트가 비활성 상태면 `NotApplicable`.
    pub fn add_to_blocklist(&self, target: &str) -> Result<()> {
        let key = Self::blocklist_key(target);
        let module = self.module_for_key(&key);
        let name = match &module {
            Some(module) => module.name().to_string(),
            None if SettingsKey::from_blocklist_url(target).is_some() => key.as_str().to_string(),
            None => Path::new(target)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| target.to_string()),
        };
        self.blocklist.lock().add(&key, &name)?;
        info!("Added {} to blocklist", target);

        if let Some(module) = module {
            let categories = self.detach_module(&module);
            module.check_unload(false);
            self.publish_category_changes(&categories);
        }
        Ok(())
    }

    /// 블록리스트에서 제거. 대상은 모듈 경로 또는 `blocklist://<key>` URL
    pub fn remove_from_blocklist(&self, target: &str) -> Result<bool> {
        let key = Self::blocklist_key(target);
        let removed = self.blocklist.lock().remove(&key)?;
        if removed {
            info!("Removed {} from blocklist", target);
        }
        Ok(removed)
    }

    /// 블록리스트 초기화 (`ResetBlocklistDone` 발행)
    pub fn reset_blocklist(&self) -> Result<()> {
        self.blocklist.lock().reset()?;
        info!("Blocklist reset");
        self.events
            .publish(RegistryEvent::simple(EventType::ResetBlocklistDone));
        Ok(())
    }

    pub fn blocklist_entries(&self) -> Vec<BlocklistEntry> {
        self.blocklist.lock().entries()
    }

    pub fn is_blocklisted(&self, path: &Path) -> bool {
        self.blocklist.lock().contains(&SettingsKey::for_path(path))
    }

    /// 블록리스트 활성/비활성. 이전 상태 반환
    pub fn enable_blocklist(&self, enabled: bool) -> bool {
        self.blocklist.lock().set_enabled(enabled)
    }

    pub fn is_blocklist_enabled(&self) -> bool {
        self.blocklist.lock().is_enabled()
    }

    fn blocklist_key(target: &str) -> SettingsKey {
        SettingsKey::from_blocklist_url(target)
            .unwrap_or_else(|| SettingsKey::for_path(Path::new(target)))
    }
}
