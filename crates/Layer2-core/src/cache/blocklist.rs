//! Blocklist - 로드하지 않을 모듈 목록
//!
//! 모듈을 처음 로드하기 직전에 키를 블록리스트에 올리고 즉시 디스크에 기록한다.
//! 로드와 클래스 수집이 끝나면 키를 내린다. 로드 중 프로세스가 죽으면 키가 남아
//! 다음 실행에서 그 모듈은 건너뛰게 된다.

use super::SettingsKey;
use plugforge_foundation::{Error, Result, Settings};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

const NAME_KEY: &str = "name";

/// 블록리스트 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlocklistEntry {
    pub key: SettingsKey,
    /// 모듈 파일 이름 (표시용)
    pub name: String,
}

impl BlocklistEntry {
    pub fn url(&self) -> String {
        self.key.blocklist_url()
    }
}

/// 블록리스트
#[derive(Debug)]
pub struct Blocklist {
    settings: Settings,
    enabled: bool,
}

impl Blocklist {
    /// 항상 변경 즉시 저장한다
    pub fn open(dir: impl Into<PathBuf>, file_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            settings: Settings::open(dir, file_name).with_auto_save(true),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 활성 상태 변경. 이전 상태 반환
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.enabled, enabled)
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::NotApplicable("blocklist is disabled".to_string()))
        }
    }

    /// 블록리스트에 있는지 (비활성 상태면 항상 `false`)
    pub fn contains(&self, key: &SettingsKey) -> bool {
        self.enabled && self.settings.contains(key.as_str())
    }

    /// 로드 직전 검사
    ///
    /// 이미 블록리스트에 있으면 `false`. 아니면 키를 올려두고 `true`.
    pub fn check_and_arm(&mut self, key: &SettingsKey, name: &str) -> bool {
        if !self.enabled {
            return true;
        }
        if self.settings.contains(key.as_str()) {
            info!("Module {} is on blocklist, skipped", name);
            return false;
        }
        if let Err(e) = self
            .settings
            .update_section(key.as_str(), |s| s.set(NAME_KEY, name))
        {
            warn!("Failed to persist blocklist guard for {}: {}", name, e);
        }
        true
    }

    /// 로드 성공 후 키 내림 (비활성 상태면 무시)
    pub fn disarm(&mut self, key: &SettingsKey) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.settings.remove_section(key.as_str()) {
            warn!("Failed to update blocklist: {}", e);
        }
    }

    // ========================================================================
    // 명시적 조작
    // ========================================================================

    pub fn add(&mut self, key: &SettingsKey, name: &str) -> Result<()> {
        self.ensure_enabled()?;
        self.settings
            .update_section(key.as_str(), |s| s.set(NAME_KEY, name))
    }

    /// 제거. 있었는지 반환
    pub fn remove(&mut self, key: &SettingsKey) -> Result<bool> {
        self.ensure_enabled()?;
        self.settings.remove_section(key.as_str())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.ensure_enabled()?;
        self.settings.clear()
    }

    pub fn entries(&self) -> Vec<BlocklistEntry> {
        self.settings
            .keys()
            .map(|key| BlocklistEntry {
                key: SettingsKey::from_raw(key.clone()),
                name: self
                    .settings
                    .section(key)
                    .and_then(|s| s.get_str(NAME_KEY))
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn file_name(&self) -> &str {
        self.settings.file_name()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        self.settings.to_json_bytes()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.settings.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_disarm() {
        let dir = tempfile::tempdir().unwrap();
        let mut blocklist = Blocklist::open(dir.path(), "PluginBlocklist.json", true);
        let key = SettingsKey::from_raw("abc");

        assert!(blocklist.check_and_arm(&key, "fx.so"));
        // 프로세스가 죽었다고 가정: 새로 열어도 남아 있음
        let reopened = Blocklist::open(dir.path(), "PluginBlocklist.json", true);
        assert!(reopened.contains(&key));

        assert!(!blocklist.check_and_arm(&key, "fx.so"));
        blocklist.disarm(&key);
        assert!(!blocklist.contains(&key));
    }

    #[test]
    fn test_disabled_blocklist() {
        let dir = tempfile::tempdir().unwrap();
        let mut blocklist = Blocklist::open(dir.path(), "PluginBlocklist.json", false);
        let key = SettingsKey::from_raw("abc");

        assert!(blocklist.check_and_arm(&key, "fx.so"));
        assert!(blocklist.is_empty());
        assert!(matches!(
            blocklist.add(&key, "fx.so"),
            Err(Error::NotApplicable(_))
        ));
        assert!(matches!(blocklist.reset(), Err(Error::NotApplicable(_))));

        assert!(!blocklist.set_enabled(true));
        blocklist.add(&key, "fx.so").unwrap();
        assert!(blocklist.contains(&key));
    }

    #[test]
    fn test_entries_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut blocklist = Blocklist::open(dir.path(), "PluginBlocklist.json", true);
        blocklist.add(&SettingsKey::from_raw("a"), "a.so").unwrap();
        blocklist.add(&SettingsKey::from_raw("b"), "b.so").unwrap();

        let entries = blocklist.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.so");
        assert_eq!(entries[0].url(), "blocklist://a");

        assert!(blocklist.remove(&SettingsKey::from_raw("a")).unwrap());
        blocklist.reset().unwrap();
        assert!(blocklist.is_empty());
    }
}
