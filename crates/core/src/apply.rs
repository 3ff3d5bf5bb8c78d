use crate::config::{app_paths, AppPaths};
use crate::planner::{RenameCandidate, RenamePlan};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BACKUP_DIR_NAME: &str = ".backup";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoLog {
    operations: Vec<RenameOperation>,
    #[serde(default)]
    backup_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenameOperation {
    from: PathBuf,
    to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyOptions {
    pub backup_originals: bool,
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyFailure {
    #[error("リネーム先が既に存在します: {}", .0.display())]
    TargetExists(PathBuf),
    #[error("リネームに失敗しました: {0}")]
    Rename(String),
    #[error("バックアップに失敗しました: {0}")]
    Backup(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub failures: Vec<(PathBuf, ApplyFailure)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoResult {
    pub restored: usize,
}

pub fn apply_plan(plan: &RenamePlan) -> Result<ApplyResult> {
    apply_plan_with_options(plan, &ApplyOptions::default())
}

pub fn apply_plan_with_options(plan: &RenamePlan, options: &ApplyOptions) -> Result<ApplyResult> {
    apply_plan_with_paths(plan, options, &app_paths()?)
}

// ファイル単位の失敗は failures に積んで続行する。バッチ全体は止めない。
fn apply_plan_with_paths(
    plan: &RenamePlan,
    options: &ApplyOptions,
    paths: &AppPaths,
) -> Result<ApplyResult> {
    let candidates: Vec<&RenameCandidate> = plan.candidates.iter().filter(|c| c.changed).collect();
    let unchanged = plan.candidates.len() - candidates.len();
    if candidates.is_empty() {
        return Ok(ApplyResult {
            applied: 0,
            unchanged,
            failures: Vec::new(),
        });
    }

    let backup_root = if options.backup_originals {
        let root = options
            .backup_dir
            .clone()
            .unwrap_or_else(|| plan.root.join(BACKUP_DIR_NAME));
        fs::create_dir_all(&root).with_context(|| {
            format!(
                "バックアップフォルダを作成できませんでした: {}",
                root.display()
            )
        })?;
        Some(root)
    } else {
        None
    };

    let mut reserved_paths = HashSet::<PathBuf>::new();
    let mut operations = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();

    for candidate in candidates {
        if let Some(backup_root) = backup_root.as_ref() {
            if let Err(failure) = backup_original(
                backup_root,
                &plan.root,
                &candidate.original_path,
                &mut reserved_paths,
            ) {
                failures.push((candidate.original_path.clone(), failure));
                continue;
            }
        }

        if candidate.target_path.exists() {
            failures.push((
                candidate.original_path.clone(),
                ApplyFailure::TargetExists(candidate.target_path.clone()),
            ));
            continue;
        }

        match fs::rename(&candidate.original_path, &candidate.target_path) {
            Ok(()) => operations.push(RenameOperation {
                from: candidate.original_path.clone(),
                to: candidate.target_path.clone(),
            }),
            Err(err) => failures.push((
                candidate.original_path.clone(),
                ApplyFailure::Rename(err.to_string()),
            )),
        }
    }

    if !operations.is_empty() {
        persist_undo(&operations, backup_root, paths)?;
    }

    Ok(ApplyResult {
        applied: operations.len(),
        unchanged,
        failures,
    })
}

fn backup_original(
    backup_root: &Path,
    plan_root: &Path,
    original_path: &Path,
    reserved_paths: &mut HashSet<PathBuf>,
) -> std::result::Result<(), ApplyFailure> {
    let backup_path = resolve_backup_path(backup_root, plan_root, original_path, reserved_paths);
    if let Some(parent) = backup_path.parent() {
        fs::create_dir_all(parent).map_err(|err| ApplyFailure::Backup(err.to_string()))?;
    }
    fs::copy(original_path, &backup_path)
        .map(|_| ())
        .map_err(|err| ApplyFailure::Backup(err.to_string()))
}

fn resolve_backup_path(
    backup_root: &Path,
    plan_root: &Path,
    original_path: &Path,
    reserved_paths: &mut HashSet<PathBuf>,
) -> PathBuf {
    if let Ok(relative) = original_path.strip_prefix(plan_root) {
        if !relative.as_os_str().is_empty() {
            let candidate = backup_root.join(relative);
            return unique_backup_path(candidate, reserved_paths);
        }
    }

    let file_name = original_path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    unique_backup_path(backup_root.join(file_name), reserved_paths)
}

fn unique_backup_path(candidate: PathBuf, reserved_paths: &mut HashSet<PathBuf>) -> PathBuf {
    if !candidate.exists() && !reserved_paths.contains(&candidate) {
        reserved_paths.insert(candidate.clone());
        return candidate;
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new("."));
    let stem = candidate
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = candidate
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut n = 1usize;
    loop {
        let mut name = format!("{}_{:03}", stem, n);
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
        let next = parent.join(name);
        if !next.exists() && !reserved_paths.contains(&next) {
            reserved_paths.insert(next.clone());
            return next;
        }
        n += 1;
    }
}

pub fn undo_last() -> Result<UndoResult> {
    undo_last_with_paths(&app_paths()?)
}

fn undo_last_with_paths(paths: &AppPaths) -> Result<UndoResult> {
    if !paths.undo_path.exists() {
        anyhow::bail!("取り消し可能な履歴がありません");
    }

    let raw = fs::read_to_string(&paths.undo_path).with_context(|| {
        format!(
            "取り消しログを読めませんでした: {}",
            paths.undo_path.display()
        )
    })?;
    let log = serde_json::from_str::<UndoLog>(&raw).context("取り消しログが壊れています")?;

    let restored = restore_operations(&log)?;

    cleanup_backup_if_needed(&log)?;

    fs::remove_file(&paths.undo_path).with_context(|| {
        format!(
            "取り消しログ削除に失敗しました: {}",
            paths.undo_path.display()
        )
    })?;

    Ok(UndoResult { restored })
}

fn restore_operations(log: &UndoLog) -> Result<usize> {
    let mut restored = 0usize;
    for op in log.operations.iter().rev() {
        if !op.to.exists() {
            continue;
        }
        fs::rename(&op.to, &op.from).with_context(|| {
            format!(
                "取り消しに失敗しました: {} -> {}",
                op.to.display(),
                op.from.display()
            )
        })?;
        restored += 1;
    }
    Ok(restored)
}

fn persist_undo(
    operations: &[RenameOperation],
    backup_root: Option<PathBuf>,
    paths: &AppPaths,
) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "設定ディレクトリ作成に失敗しました: {}",
            paths.config_dir.display()
        )
    })?;

    let log = UndoLog {
        operations: operations.to_vec(),
        backup_root,
    };
    let body =
        serde_json::to_string_pretty(&log).context("取り消しログのシリアライズに失敗しました")?;
    fs::write(&paths.undo_path, body).with_context(|| {
        format!(
            "取り消しログ書き込みに失敗しました: {}",
            paths.undo_path.display()
        )
    })?;
    Ok(())
}

fn cleanup_backup_if_needed(log: &UndoLog) -> Result<()> {
    let Some(backup_root) = log.backup_root.as_ref() else {
        return Ok(());
    };
    if !backup_root.exists() {
        return Ok(());
    }

    if backup_root.is_dir() {
        fs::remove_dir_all(backup_root).with_context(|| {
            format!(
                "バックアップフォルダ削除に失敗しました: {}",
                backup_root.display()
            )
        })?;
    } else {
        fs::remove_file(backup_root).with_context(|| {
            format!(
                "バックアップファイル削除に失敗しました: {}",
                backup_root.display()
            )
        })?;
    }

    Ok(())
}
