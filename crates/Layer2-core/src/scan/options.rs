//! Scan Options

use std::path::Path;

/// 폴더 스캔 옵션
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 하위 폴더까지 탐색
    pub recursive: bool,

    /// discardable 모듈도 캐시에서 복원/스냅샷 기록
    pub keep_discardable: bool,

    /// 외부에서 유효성이 확인된 스캔 (빈 클래스 목록을 discardable 로 표시)
    pub validity_confirmed: bool,

    /// 경로 필터 (비어 있으면 모두 허용)
    include: Vec<glob::Pattern>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn keep_discardable(mut self, keep: bool) -> Self {
        self.keep_discardable = keep;
        self
    }

    pub fn validity_confirmed(mut self, confirmed: bool) -> Self {
        self.validity_confirmed = confirmed;
        self
    }

    /// 경로 필터 추가. 잘못된 패턴은 무시된다.
    pub fn include(mut self, pattern: &str) -> Self {
        match glob::Pattern::new(pattern) {
            Ok(p) => self.include.push(p),
            Err(e) => tracing::warn!("Ignoring invalid scan filter '{}': {}", pattern, e),
        }
        self
    }

    /// 경로 필터 통과 여부
    pub fn accepts(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let path_str = path.to_string_lossy();
        let normalized = path_str.replace('\\', "/");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.include
            .iter()
            .any(|p| p.matches(&path_str) || p.matches(&normalized) || p.matches(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter_accepts_everything() {
        assert!(ScanOptions::new().accepts(Path::new("/plugins/fx.so")));
    }

    #[test]
    fn test_include_filter() {
        let options = ScanOptions::new().include("*.so").include("[");
        assert!(options.accepts(Path::new("/plugins/fx.so")));
        assert!(!options.accepts(Path::new("/plugins/fx.dll")));
    }
}
