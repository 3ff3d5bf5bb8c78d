use crate::extract::{extract, has_canonical_prefix, DatePattern};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const FALLBACK_BASE_NAME: &str = "file";

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub input: PathBuf,
    pub recursive: bool,
    pub include_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub stamp: String,
    pub residual: String,
    pub pattern: DatePattern,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub matched: usize,
    pub skipped_no_date: usize,
    pub skipped_hidden: usize,
    pub already_normalized: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub candidates: Vec<RenameCandidate>,
    pub skipped: Vec<String>,
    pub already_normalized: Vec<String>,
    pub stats: RenameStats,
}

pub fn generate_plan(options: &PlanOptions) -> Result<RenamePlan> {
    if !options.input.exists() {
        anyhow::bail!("対象フォルダが存在しません: {}", options.input.display());
    }
    if !options.input.is_dir() {
        anyhow::bail!("対象がフォルダではありません: {}", options.input.display());
    }

    let mut stats = RenameStats::default();
    let files = collect_files(
        &options.input,
        options.recursive,
        options.include_hidden,
        &mut stats,
    )?;

    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    let mut already_normalized = Vec::new();
    let mut planned_paths = HashSet::<PathBuf>::new();

    for path in files {
        let file_name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();

        if has_canonical_prefix(&file_name) {
            stats.already_normalized += 1;
            already_normalized.push(file_name);
            continue;
        }

        let Some(extraction) = extract(&file_name) else {
            stats.skipped_no_date += 1;
            skipped.push(file_name);
            continue;
        };
        stats.matched += 1;

        let base = if extraction.residual.is_empty() {
            FALLBACK_BASE_NAME
        } else {
            extraction.residual.as_str()
        };
        let base = format!("{}_{}", extraction.stamp, base);
        let target = resolve_collision(&path, &base, &extraction.extension, &mut planned_paths)?;

        let changed = target != path;
        if !changed {
            stats.unchanged += 1;
        }
        stats.planned += 1;
        candidates.push(RenameCandidate {
            original_path: path,
            target_path: target,
            stamp: extraction.stamp,
            residual: extraction.residual,
            pattern: extraction.pattern,
            changed,
        });
    }

    Ok(RenamePlan {
        root: options.input.clone(),
        candidates,
        skipped,
        already_normalized,
        stats,
    })
}

fn collect_files(
    root: &Path,
    recursive: bool,
    include_hidden: bool,
    stats: &mut RenameStats,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    if recursive {
        // 隠しディレクトリ (.backup を含む) は include_hidden でない限り降りない。
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || include_hidden
                    || !entry.file_type().is_dir()
                    || !is_hidden(entry.path())
            });
        for entry in walker {
            let entry =
                entry.with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            stats.scanned_files += 1;
            if is_hidden(path) && !include_hidden {
                stats.skipped_hidden += 1;
                continue;
            }
            out.push(path.to_path_buf());
        }
    } else {
        for entry in fs::read_dir(root)
            .with_context(|| format!("フォルダを読めませんでした: {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("エントリ読み取り失敗: {}", root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            stats.scanned_files += 1;
            if is_hidden(&path) && !include_hidden {
                stats.skipped_hidden += 1;
                continue;
            }
            out.push(path);
        }
        out.sort();
    }

    Ok(out)
}

fn resolve_collision(
    original_path: &Path,
    base: &str,
    extension: &str,
    planned_paths: &mut HashSet<PathBuf>,
) -> Result<PathBuf> {
    let parent = original_path
        .parent()
        .context("親ディレクトリを取得できませんでした")?;

    let candidate = parent.join(format!("{base}{extension}"));
    if is_available(&candidate, original_path, planned_paths) {
        planned_paths.insert(candidate.clone());
        return Ok(candidate);
    }

    let mut n = 1usize;
    loop {
        let candidate = parent.join(format!("{base}_{n:03}{extension}"));
        if is_available(&candidate, original_path, planned_paths) {
            planned_paths.insert(candidate.clone());
            return Ok(candidate);
        }
        n += 1;
    }
}

fn is_available(candidate: &Path, original_path: &Path, planned_paths: &HashSet<PathBuf>) -> bool {
    if planned_paths.contains(candidate) {
        return false;
    }
    if candidate == original_path {
        return true;
    }
    !candidate.exists()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
