use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fdate_renamer_core::{
    app_paths, apply_plan_with_options, generate_plan, load_config, save_config, undo_last,
    AppConfig, ApplyOptions, PlanOptions, RenamePlan,
};

#[derive(Debug, Parser)]
#[command(name = "fdate-renamer-cli")]
#[command(about = "ファイル名に含まれる日付を YYYYMMDD_ プレフィックスへ正規化します")]
#[command(
    long_about = "ファイル名に含まれる日付を検出し、YYYYMMDD_ プレフィックスへ正規化して一括リネームします。\nハイフン区切り+4桁年の日付は日-月-年として解釈します (12-03-2024 は 2024年3月12日)。"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Undo,
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[arg(default_value = ".")]
    directory: String,
    #[arg(short, long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, default_value_t = false)]
    backup: bool,
    #[arg(long)]
    backup_dir: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Undo => cmd_undo(),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;

    let options = PlanOptions {
        input: args.directory.into(),
        recursive: args.recursive || config.recursive_default,
        include_hidden: args.include_hidden || config.include_hidden_default,
    };
    let plan = generate_plan(&options)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_table(&plan);
        }
    }

    if args.apply {
        let apply_options = ApplyOptions {
            backup_originals: args.backup || config.backup_default,
            backup_dir: args.backup_dir.map(Into::into).or(config.backup_dir),
        };
        let result = apply_plan_with_options(&plan, &apply_options)?;
        for (path, failure) in &result.failures {
            eprintln!("適用エラー: {}: {}", path.display(), failure);
        }
        eprintln!(
            "適用完了: {}件 (変更なし {}件, 失敗 {}件)",
            result.applied,
            result.unchanged,
            result.failures.len()
        );
    } else {
        eprintln!("dry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。");
    }

    Ok(())
}

fn cmd_undo() -> Result<()> {
    let result = undo_last()?;
    println!("取り消し完了: {}件", result.restored);
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let config = AppConfig::default();
    save_config(&config)?;
    let paths = app_paths()?;
    println!("設定ファイルを作成しました: {}", paths.config_path.display());
    Ok(())
}

fn print_table(plan: &RenamePlan) {
    println!("元ファイル -> 新ファイル (pattern)");
    for candidate in &plan.candidates {
        println!(
            "{} -> {} ({:?})",
            candidate.original_path.display(),
            candidate.target_path.display(),
            candidate.pattern
        );
    }

    if !plan.already_normalized.is_empty() {
        println!("\n正規化済み (変更なし):");
        for name in &plan.already_normalized {
            println!("  {name}");
        }
    }

    if !plan.skipped.is_empty() {
        println!("\nスキップ (日付なし):");
        for name in &plan.skipped {
            println!("  {name}");
        }
    }

    println!(
        "\n集計: scanned={} matched={} no_date_skip={} hidden_skip={} normalized={} planned={} unchanged={}",
        plan.stats.scanned_files,
        plan.stats.matched,
        plan.stats.skipped_no_date,
        plan.stats.skipped_hidden,
        plan.stats.already_normalized,
        plan.stats.planned,
        plan.stats.unchanged
    );
}
