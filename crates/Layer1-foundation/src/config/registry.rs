//! Registry Config - 클래스 레지스트리 설정

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const REGISTRY_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Registry Config
// ============================================================================

/// 클래스 레지스트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// 스캔 캐시 / 블록리스트 저장 위치 (없으면 플랫폼 설정 디렉토리)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_dir: Option<PathBuf>,

    /// 스캔 캐시 파일 기본 이름 (`<name>.<language>.json`)
    #[serde(default = "default_settings_name")]
    pub settings_name: String,

    /// 블록리스트 파일 기본 이름
    #[serde(default = "default_blocklist_name")]
    pub blocklist_name: String,

    /// 클래스 속성 언어
    #[serde(default = "default_language")]
    pub language: String,

    /// 블록리스트 사용 여부
    #[serde(default = "default_true")]
    pub blocklist_enabled: bool,

    /// 지연 언로드 대기 시간 (ms)
    #[serde(default = "default_defer_unload_ms")]
    pub defer_unload_ms: u64,

    /// 변경마다 캐시 저장
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            settings_dir: None,
            settings_name: default_settings_name(),
            blocklist_name: default_blocklist_name(),
            language: default_language(),
            blocklist_enabled: true,
            defer_unload_ms: default_defer_unload_ms(),
            auto_save: true,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) =
                global.load_optional::<RegistryConfig>(REGISTRY_CONFIG_FILE)?
            {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<RegistryConfig>(REGISTRY_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(REGISTRY_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: RegistryConfig) {
        if other.settings_dir.is_some() {
            self.settings_dir = other.settings_dir;
        }
        if other.settings_name != default_settings_name() {
            self.settings_name = other.settings_name;
        }
        if other.blocklist_name != default_blocklist_name() {
            self.blocklist_name = other.blocklist_name;
        }
        if other.language != default_language() {
            self.language = other.language;
        }
        if other.defer_unload_ms != default_defer_unload_ms() {
            self.defer_unload_ms = other.defer_unload_ms;
        }
        self.blocklist_enabled = other.blocklist_enabled;
        self.auto_save = other.auto_save;
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn settings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings_dir = Some(dir.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn blocklist_enabled(mut self, enabled: bool) -> Self {
        self.blocklist_enabled = enabled;
        self
    }

    pub fn defer_unload_ms(mut self, ms: u64) -> Self {
        self.defer_unload_ms = ms;
        self
    }

    pub fn auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    /// 실제 설정 디렉토리
    pub fn resolve_settings_dir(&self) -> Result<PathBuf> {
        match &self.settings_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?
                .join("plugforge")),
        }
    }

    /// 언어별 스캔 캐시 파일명
    pub fn settings_file_name(&self) -> String {
        format!("{}.{}.json", self.settings_name, self.language)
    }

    /// 블록리스트 파일명
    pub fn blocklist_file_name(&self) -> String {
        format!("{}.json", self.blocklist_name)
    }

    pub fn defer_unload_delay(&self) -> Duration {
        Duration::from_millis(self.defer_unload_ms)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_settings_name() -> String {
    "Plugins".to_string()
}

fn default_blocklist_name() -> String {
    "PluginBlocklist".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_defer_unload_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_default() {
        let config = RegistryConfig::new();
        assert_eq!(config.language, "en");
        assert_eq!(config.defer_unload_ms, 1000);
        assert!(config.blocklist_enabled);
        assert_eq!(config.settings_file_name(), "Plugins.en.json");
        assert_eq!(config.blocklist_file_name(), "PluginBlocklist.json");
    }

    #[test]
    fn test_config_merge() {
        let mut base = RegistryConfig::new().language("de");

        let overlay: RegistryConfig =
            serde_json::from_str(r#"{ "deferUnloadMs": 250, "blocklistEnabled": false }"#).unwrap();
        base.merge(overlay);

        assert_eq!(base.language, "de");
        assert_eq!(base.defer_unload_ms, 250);
        assert!(!base.blocklist_enabled);
        assert_eq!(base.settings_file_name(), "Plugins.de.json");
    }

    #[test]
    fn test_explicit_settings_dir() {
        let config = RegistryConfig::new().settings_dir("/tmp/plugforge-test");
        assert_eq!(
            config.resolve_settings_dir().unwrap(),
            PathBuf::from("/tmp/plugforge-test")
        );
    }
}
