//! Script Loader - 스크립트 패키지 모듈
//!
//! 패키지는 `metainfo.json` 을 가진 디렉토리이거나 단일 `*.package.json` 파일이다.
//! 메타 정보에 클래스 목록이 정적으로 들어 있고, 인스턴스는 [`ScriptObject`] 이다.

use super::{ClassFactory, CodeLoader, CodeResource, ModuleKind, PluginObject, StaticClassFactory};
use crate::class::{ClassFlags, ClassId, ClassInfo, VersionDescriptor};
use plugforge_foundation::{Attributes, Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 패키지 디렉토리의 메타 정보 파일
pub const PACKAGE_META_FILE: &str = "metainfo.json";

/// 단일 파일 패키지 확장자
pub const PACKAGE_FILE_SUFFIX: &str = ".package.json";

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default, rename = "packageID", alias = "packageId")]
    package_id: Option<String>,

    #[serde(default)]
    version: PackageVersion,

    #[serde(default)]
    discardable: bool,

    #[serde(default)]
    classes: Vec<PackageClass>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageVersion {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    vendor: String,
    #[serde(default)]
    copyright: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageClass {
    #[serde(rename = "classID")]
    class_id: String,
    category: String,
    name: String,
    #[serde(default)]
    sub_category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    singleton: bool,
    #[serde(default)]
    discardable: bool,
    #[serde(default)]
    attributes: Attributes,
}

// ============================================================================
// ScriptObject
// ============================================================================

/// 스크립트 클래스 인스턴스
#[derive(Debug, Clone)]
pub struct ScriptObject {
    pub package_id: String,
    pub class_id: ClassId,
    pub class_name: String,
    pub properties: Attributes,
}

// ============================================================================
// ScriptLoader
// ============================================================================

struct ScriptResource {
    path: PathBuf,
    factory: Arc<dyn ClassFactory>,
    meta: Attributes,
}

impl CodeResource for ScriptResource {
    fn class_factory(&self) -> Arc<dyn ClassFactory> {
        self.factory.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn meta_info(&self) -> Option<Attributes> {
        Some(self.meta.clone())
    }
}

/// 스크립트 패키지 로더
#[derive(Debug, Default)]
pub struct ScriptLoader;

impl ScriptLoader {
    pub fn new() -> Self {
        Self
    }

    fn manifest_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(PACKAGE_META_FILE)
        } else {
            path.to_path_buf()
        }
    }

    fn build_factory(manifest: PackageManifest, package_id: &str) -> StaticClassFactory {
        let version = VersionDescriptor {
            name: manifest.version.name,
            version: manifest.version.version,
            vendor: manifest.version.vendor,
            copyright: manifest.version.copyright,
            url: manifest.version.url,
        };

        let factory =
            StaticClassFactory::new(version).with_discardable(manifest.discardable);
        for class in manifest.classes {
            let Some(class_id) = ClassId::parse(&class.class_id) else {
                warn!(
                    "Package {} declares class '{}' with invalid id",
                    package_id, class.name
                );
                continue;
            };

            let mut flags = ClassFlags::empty();
            flags.set(ClassFlags::SINGLETON, class.singleton);
            flags.set(ClassFlags::DISCARDABLE, class.discardable);
            let info = ClassInfo::new(class_id, class.category, class.name.clone())
                .with_sub_category(class.sub_category)
                .with_description(class.description)
                .with_flags(flags);

            let package_id = package_id.to_string();
            let class_name = class.name;
            let properties = class.attributes.clone();
            let constructor: super::Constructor = Arc::new(move || {
                Arc::new(ScriptObject {
                    package_id: package_id.clone(),
                    class_id,
                    class_name: class_name.clone(),
                    properties: properties.clone(),
                }) as PluginObject
            });
            factory.add_class(info, class.attributes, Some(constructor));
        }
        factory
    }
}

impl CodeLoader for ScriptLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Script
    }

    fn is_code_resource(&self, path: &Path) -> bool {
        if path.is_dir() {
            return path.join(PACKAGE_META_FILE).is_file();
        }
        path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_ascii_lowercase().ends_with(PACKAGE_FILE_SUFFIX))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn CodeResource>> {
        let manifest_path = Self::manifest_path(path);
        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|e| Error::load_failure(path, format!("Failed to read package: {}", e)))?;
        let manifest: PackageManifest = serde_json::from_str(&content)
            .map_err(|e| Error::load_failure(path, format!("Invalid package metadata: {}", e)))?;

        let package_id = manifest
            .package_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::load_failure(path, "Package has no packageID"))?;

        debug!("Loading script package {} from {}", package_id, path.display());
        let meta = Attributes::new()
            .with("packageID", package_id.as_str())
            .with("packageVersion", manifest.version.version.as_str())
            .with("packageVendor", manifest.version.vendor.as_str());
        let factory = Self::build_factory(manifest, &package_id);

        Ok(Box::new(ScriptResource {
            path: path.to_path_buf(),
            factory: Arc::new(factory),
            meta,
        }))
    }
}
