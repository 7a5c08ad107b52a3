//! Candidate Walker - 스캔 대상 파일 수집

use super::ScanOptions;
use crate::module::CodeLoader;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 로더가 인식하는 모듈 경로 목록 (파일 이름 순)
///
/// 디렉토리 형태로 인식된 패키지의 내부는 탐색하지 않는다.
/// 읽을 수 없는 항목은 건너뛴다.
pub fn collect_candidates(root: &Path, loader: &dyn CodeLoader, options: &ScanOptions) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    if !options.recursive {
        builder.max_depth(Some(1));
    }

    let mut candidates = Vec::new();
    let mut packages: Vec<PathBuf> = Vec::new();

    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        if packages.iter().any(|p| path.starts_with(p)) {
            continue;
        }
        if !loader.is_code_resource(path) || !options.accepts(path) {
            continue;
        }

        if path.is_dir() {
            packages.push(path.to_path_buf());
        }
        candidates.push(path.to_path_buf());
    }

    candidates
}
