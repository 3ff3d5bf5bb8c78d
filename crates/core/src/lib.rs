mod apply;
mod config;
mod extract;
mod planner;
mod sanitize;

pub use apply::{
    apply_plan, apply_plan_with_options, undo_last, ApplyFailure, ApplyOptions, ApplyResult,
    UndoResult,
};
pub use config::{app_paths, load_config, save_config, AppConfig, AppPaths};
pub use extract::{extract, has_canonical_prefix, DatePattern, Extraction};
pub use planner::{generate_plan, PlanOptions, RenameCandidate, RenamePlan, RenameStats};
