//! Settings - 섹션 단위 영속 설정 파일
//!
//! 섹션 키 → [`Attributes`] 구조의 JSON 파일 하나를 관리한다.
//! 스캔 캐시와 블록리스트가 각각 하나의 Settings 파일을 소유한다.

use super::JsonStore;
use crate::{Attributes, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 파일에 기록되는 형태
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,

    #[serde(default)]
    sections: BTreeMap<String, Attributes>,
}

/// 섹션 기반 설정 저장소
#[derive(Debug)]
pub struct Settings {
    store: JsonStore,
    file_name: String,
    data: SettingsFile,
    dirty: bool,
    auto_save: bool,
}

impl Settings {
    /// 파일을 열어 내용을 복원한다. 파일이 없거나 손상된 경우 빈 상태로 시작한다.
    pub fn open(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        let mut settings = Self::empty(dir, file_name);
        settings.restore();
        settings
    }

    /// 디스크를 읽지 않고 빈 상태로 생성
    pub fn empty(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            store: JsonStore::new(dir),
            file_name: file_name.into(),
            data: SettingsFile::default(),
            dirty: false,
            auto_save: false,
        }
    }

    /// 변경마다 즉시 저장할지 설정
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> PathBuf {
        self.store.file_path(&self.file_name)
    }

    pub fn dir(&self) -> &Path {
        self.store.base_dir()
    }

    /// 디스크에서 다시 읽기
    pub fn restore(&mut self) {
        self.data = match self.store.load_optional::<SettingsFile>(&self.file_name) {
            Ok(Some(data)) => {
                debug!(
                    "Restored settings {} ({} sections)",
                    self.file_name,
                    data.sections.len()
                );
                data
            }
            Ok(None) => SettingsFile::default(),
            Err(e) => {
                warn!("Discarding unreadable settings {}: {}", self.file_name, e);
                SettingsFile::default()
            }
        };
        self.dirty = false;
    }

    // ========================================================================
    // 섹션 접근
    // ========================================================================

    pub fn section(&self, key: &str) -> Option<&Attributes> {
        self.data.sections.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.sections.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.sections.keys()
    }

    pub fn len(&self) -> usize {
        self.data.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.sections.is_empty()
    }

    /// 섹션 수정 (없으면 생성)
    pub fn update_section<R>(&mut self, key: &str, f: impl FnOnce(&mut Attributes) -> R) -> Result<R> {
        let section = self.data.sections.entry(key.to_string()).or_default();
        let result = f(section);
        self.mark_dirty()?;
        Ok(result)
    }

    /// 섹션 통째로 교체
    pub fn replace_section(&mut self, key: &str, attributes: Attributes) -> Result<()> {
        self.data.sections.insert(key.to_string(), attributes);
        self.mark_dirty()
    }

    /// 섹션 삭제. 존재했는지 반환
    pub fn remove_section(&mut self, key: &str) -> Result<bool> {
        let removed = self.data.sections.remove(key).is_some();
        if removed {
            self.mark_dirty()?;
        }
        Ok(removed)
    }

    /// 모든 섹션 삭제
    pub fn clear(&mut self) -> Result<()> {
        if self.data.sections.is_empty() {
            return Ok(());
        }
        self.data.sections.clear();
        self.mark_dirty()
    }

    // ========================================================================
    // 저장
    // ========================================================================

    fn mark_dirty(&mut self) -> Result<()> {
        self.dirty = true;
        if self.auto_save {
            self.flush()?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 변경 사항이 있으면 저장
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save()
    }

    /// 무조건 저장
    pub fn save(&mut self) -> Result<()> {
        self.data.saved_at = Some(Utc::now());
        self.store.save(&self.file_name, &self.data)?;
        self.dirty = false;
        Ok(())
    }

    /// 현재 메모리 상태를 파일과 같은 형식으로 직렬화 (진단용)
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.data)?)
    }

    /// 파일 삭제 및 메모리 상태 초기화
    pub fn remove_file(&mut self) -> Result<()> {
        self.store.remove(&self.file_name)?;
        self.data = SettingsFile::default();
        self.dirty = false;
        Ok(())
    }
}
