//! 진단 데이터 내보내기

use super::ClassRegistry;
use plugforge_foundation::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// 버그 리포트용 파일 하나
#[derive(Debug, Clone)]
pub struct DiagnosticData {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl ClassRegistry {
    /// 스캔 캐시와 블록리스트를 저장 형식 그대로 반환
    pub fn diagnostic_data(&self) -> Result<Vec<DiagnosticData>> {
        let cache = {
            let cache = self.cache.lock();
            DiagnosticData {
                file_name: cache.file_name().to_string(),
                contents: cache.to_json_bytes()?,
            }
        };
        let blocklist = {
            let blocklist = self.blocklist.lock();
            DiagnosticData {
                file_name: blocklist.file_name().to_string(),
                contents: blocklist.to_json_bytes()?,
            }
        };
        Ok(vec![cache, blocklist])
    }

    /// 진단 파일을 디렉토리에 기록. 기록한 경로 반환
    pub fn write_diagnostics(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for data in self.diagnostic_data()? {
            let path = dir.join(&data.file_name);
            std::fs::write(&path, &data.contents)?;
            written.push(path);
        }
        info!("Wrote {} diagnostic files to {}", written.len(), dir.display());
        Ok(written)
    }
}
