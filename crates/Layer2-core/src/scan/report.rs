//! Scan Report - 모듈별 스캔 결과

use serde::Serialize;
use std::path::PathBuf;

/// 모듈 하나의 스캔 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModuleOutcome {
    /// 로드해서 클래스를 등록함
    Registered { classes: usize },
    /// 캐시에서 복원함
    Restored { classes: usize },
    /// 클래스가 없음 (확인된 빈 모듈 또는 discardable)
    Empty,
    /// 블록리스트에 있어 건너뜀
    Blocklisted,
    /// 로드 실패
    Failed { message: String },
    /// 이미 등록된 모듈
    AlreadyKnown,
}

impl ModuleOutcome {
    /// 이번 스캔에서 클래스를 등록했는지
    pub fn contributed(&self) -> bool {
        matches!(
            self,
            Self::Registered { classes } | Self::Restored { classes } if *classes > 0
        )
    }
}

/// 폴더 스캔 결과
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub modules: Vec<(PathBuf, ModuleOutcome)>,
    pub canceled: bool,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, outcome: ModuleOutcome) {
        self.modules.push((path, outcome));
    }

    /// 클래스를 등록한 모듈 수
    pub fn count(&self) -> usize {
        self.modules.iter().filter(|(_, o)| o.contributed()).count()
    }

    /// 등록/복원된 클래스 총 수
    pub fn class_count(&self) -> usize {
        self.modules
            .iter()
            .map(|(_, o)| match o {
                ModuleOutcome::Registered { classes } | ModuleOutcome::Restored { classes } => {
                    *classes
                }
                _ => 0,
            })
            .sum()
    }

    pub fn loaded(&self) -> usize {
        self.count_where(|o| matches!(o, ModuleOutcome::Registered { .. }))
    }

    pub fn restored(&self) -> usize {
        self.count_where(|o| matches!(o, ModuleOutcome::Restored { .. }))
    }

    pub fn blocklisted(&self) -> Vec<&PathBuf> {
        self.paths_where(|o| matches!(o, ModuleOutcome::Blocklisted))
    }

    pub fn failed(&self) -> Vec<&PathBuf> {
        self.paths_where(|o| matches!(o, ModuleOutcome::Failed { .. }))
    }

    pub fn merge(&mut self, other: ScanReport) {
        self.modules.extend(other.modules);
        self.canceled |= other.canceled;
    }

    fn count_where(&self, predicate: impl Fn(&ModuleOutcome) -> bool) -> usize {
        self.modules.iter().filter(|(_, o)| predicate(o)).count()
    }

    fn paths_where(&self, predicate: impl Fn(&ModuleOutcome) -> bool) -> Vec<&PathBuf> {
        self.modules
            .iter()
            .filter(|(_, o)| predicate(o))
            .map(|(p, _)| p)
            .collect()
    }
}
