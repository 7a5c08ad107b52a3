//! CLI 명령 구현

use anyhow::Context;
use plugforge_core::{
    ClassDescriptor, ClassRegistry, ModuleKind, ModuleOutcome, ProgressNotify, ScanOptions,
    ScanReport, ScriptObject, SearchDescription,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 스캔 진행 상황을 debug 로그로 남긴다
struct LogProgress;

impl ProgressNotify for LogProgress {
    fn set_text(&self, text: &str) {
        debug!("Scanning {}", text);
    }
}

// ============================================================================
// Scan
// ============================================================================

/// 질의 전에 `--plugins` 폴더를 스캔
pub fn scan_plugin_dirs(
    registry: &ClassRegistry,
    dirs: &[PathBuf],
    kind: ModuleKind,
) -> anyhow::Result<ScanReport> {
    let mut report = ScanReport::new();
    for dir in dirs {
        let scanned = registry
            .scan_folder(dir, kind, &ScanOptions::new(), Some(&LogProgress))
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        report.merge(scanned);
    }
    for path in report.failed() {
        eprintln!("Warning: {} failed to load and was blocklisted", path.display());
    }
    Ok(report)
}

pub fn scan(
    registry: &ClassRegistry,
    dir: &Path,
    kind: ModuleKind,
    recursive: bool,
    keep_discardable: bool,
    json: bool,
) -> anyhow::Result<()> {
    let options = ScanOptions::new()
        .recursive(recursive)
        .keep_discardable(keep_discardable);
    let report = registry
        .scan_folder(dir, kind, &options, Some(&LogProgress))
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.modules.is_empty() {
        println!("No {} modules found in {}", kind, dir.display());
        return Ok(());
    }

    println!("{:<40} {:<12} {:<8}", "Module", "Outcome", "Classes");
    println!("{}", "-".repeat(62));
    for (path, outcome) in &report.modules {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let (label, classes) = outcome_columns(outcome);
        println!("{:<40} {:<12} {:<8}", truncate(&name, 38), label, classes);
        if let ModuleOutcome::Failed { message } = outcome {
            println!("    {}", message);
        }
    }
    println!(
        "\n{} modules contributed {} classes ({} from cache)",
        report.count(),
        report.class_count(),
        report.restored()
    );
    Ok(())
}

fn outcome_columns(outcome: &ModuleOutcome) -> (&'static str, String) {
    match outcome {
        ModuleOutcome::Registered { classes } => ("loaded", classes.to_string()),
        ModuleOutcome::Restored { classes } => ("cached", classes.to_string()),
        ModuleOutcome::Empty => ("empty", "0".to_string()),
        ModuleOutcome::Blocklisted => ("blocklisted", "-".to_string()),
        ModuleOutcome::Failed { .. } => ("failed", "-".to_string()),
        ModuleOutcome::AlreadyKnown => ("known", "-".to_string()),
    }
}

// ============================================================================
// Classes
// ============================================================================

pub fn list_classes(registry: &ClassRegistry, category: Option<&str>, search: Option<&str>) {
    let classes: Vec<Arc<ClassDescriptor>> = match (category, search) {
        (Some(category), Some(terms)) => {
            let urls = registry.search(category, &SearchDescription::new(terms));
            urls.iter()
                .filter_map(|url| registry.class_by_url(url))
                .collect()
        }
        (Some(category), None) => registry.classes_in_category(category),
        _ => registry.all_classes(),
    };

    if classes.is_empty() {
        println!("No classes found.");
        return;
    }

    println!("{:<40} {:<40} {:<16}", "ID", "Name", "Vendor");
    println!("{}", "-".repeat(98));
    for class in classes {
        println!(
            "{:<40} {:<40} {:<16}",
            class.class_id(),
            truncate(&class.qualified_name(), 38),
            truncate(&class.vendor().unwrap_or_default(), 16)
        );
    }
}

pub fn show_class(registry: &ClassRegistry, text: &str) -> anyhow::Result<()> {
    let class = registry
        .lookup(text)
        .with_context(|| format!("Class not found: {}", text))?;

    println!("{}", class.localized_name());
    println!("  id:          {}", class.class_id());
    println!("  url:         {}", class.class_url());
    println!("  category:    {}", class.category());
    if !class.sub_category().is_empty() {
        println!("  subcategory: {}", class.localized_sub_category());
    }
    if !class.description().is_empty() {
        println!("  description: {}", class.localized_description());
    }
    println!("  flags:       {:?}", class.flags());
    println!("  owner:       {:?}", class.owner());

    let version = class.version();
    println!("  module:      {} {} ({})", version.name, version.version, version.vendor);

    for alternative in class.alternative_class_ids() {
        println!("  replaces:    {}", alternative);
    }
    if let Some(meta) = registry.meta_class_description(&class.class_id()) {
        println!("  meta class:  {}", meta.qualified_name());
    }

    let attributes = class.attributes();
    if !attributes.is_empty() {
        println!("  attributes:");
        for (key, value) in attributes.iter() {
            println!("    {} = {}", key, value);
        }
    }
    Ok(())
}

/// 인스턴스를 만들고 바로 해제한 뒤 지연 언로드가 끝날 때까지 대기
pub async fn create_instance(registry: &ClassRegistry, text: &str) -> anyhow::Result<()> {
    let instance = registry.create_instance_by_name(text)?;
    println!(
        "Created {} ({})",
        instance.class().qualified_name(),
        instance.class_id()
    );
    if let Some(module) = instance.module() {
        println!(
            "  module: {} ({} instances)",
            module.path().display(),
            module.instance_count()
        );
    }
    if let Some(script) = instance.downcast_ref::<ScriptObject>() {
        println!("  script package: {}", script.package_id);
    }
    drop(instance);

    let pending = registry.pending_unload_count();
    if pending > 0 {
        let wait = registry.config().defer_unload_delay() + Duration::from_millis(100);
        // 구동 루프는 반환하지 않으므로 시간 제한으로 끊는다
        let _ = tokio::time::timeout(wait, registry.run_deferred_unloads()).await;
        println!(
            "Released {} modules after the unload delay",
            pending - registry.pending_unload_count()
        );
    }
    Ok(())
}

// ============================================================================
// Blocklist
// ============================================================================

pub fn list_blocklist(registry: &ClassRegistry) {
    if !registry.is_blocklist_enabled() {
        println!("Blocklist is disabled.");
        return;
    }
    let entries = registry.blocklist_entries();
    if entries.is_empty() {
        println!("Blocklist is empty.");
        return;
    }
    println!("{:<32} {:<44}", "Module", "URL");
    println!("{}", "-".repeat(78));
    for entry in entries {
        println!("{:<32} {:<44}", truncate(&entry.name, 30), entry.url());
    }
}

pub fn add_to_blocklist(registry: &ClassRegistry, target: &str) -> anyhow::Result<()> {
    registry.add_to_blocklist(target)?;
    println!("Blocklisted {}", target);
    Ok(())
}

pub fn remove_from_blocklist(registry: &ClassRegistry, target: &str) -> anyhow::Result<()> {
    if registry.remove_from_blocklist(target)? {
        println!("Removed {} from blocklist", target);
    } else {
        println!("{} is not on the blocklist", target);
    }
    Ok(())
}

pub fn reset_blocklist(registry: &ClassRegistry) -> anyhow::Result<()> {
    let count = registry.blocklist_entries().len();
    registry.reset_blocklist()?;
    println!("Removed {} blocklist entries", count);
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

pub fn write_diagnostics(registry: &ClassRegistry, out_dir: &Path) -> anyhow::Result<()> {
    let written = registry.write_diagnostics(out_dir)?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

pub fn clear_cache(registry: &ClassRegistry, all_languages: bool) -> anyhow::Result<()> {
    let removed = registry.remove_settings(all_languages)?;
    println!("Removed {} cache files", removed);
    Ok(())
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-module-name", 10), "a-very-...");
    }

    #[test]
    fn test_outcome_columns() {
        assert_eq!(
            outcome_columns(&ModuleOutcome::Restored { classes: 3 }),
            ("cached", "3".to_string())
        );
        assert_eq!(outcome_columns(&ModuleOutcome::Blocklisted).0, "blocklisted");
    }
}
