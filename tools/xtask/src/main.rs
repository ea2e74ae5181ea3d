//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-runtime`: 运行 tween-runtime 覆盖率
//! - `cov-workspace`: 运行 workspace 覆盖率
//! - `scene-check`: 检查场景文件（JSON 语法、对象/属性引用、缓动名称）

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tween_host::SceneFile;
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,
    /// 运行 tween-runtime 覆盖率报告
    CovRuntime,
    /// 运行 workspace 覆盖率报告
    CovWorkspace,
    /// 检查场景文件
    ///
    /// 不带参数：检查 tween-host/scenes/ 下所有 .json 文件；
    /// 带路径参数：检查指定文件或目录
    SceneCheck {
        path: Option<PathBuf>,
    },
}

/// 默认场景目录（相对于 workspace root）
const DEFAULT_SCENES_DIR: &str = "tween-host/scenes";

fn ensure_cargo_llvm_cov_available(sh: &Shell) -> anyhow::Result<()> {
    if cmd!(sh, "cargo llvm-cov --version").quiet().run().is_err() {
        anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    match cli.command {
        Commands::CheckAll => {
            eprintln!("\n==> cargo fmt --all -- --check");
            cmd!(sh, "cargo fmt --all -- --check").run()?;

            eprintln!("\n==> cargo clippy --workspace --all-targets");
            cmd!(sh, "cargo clippy --workspace --all-targets").run()?;

            eprintln!("\n==> cargo test --workspace");
            cmd!(sh, "cargo test --workspace").run()?;
        }
        Commands::CovRuntime => {
            ensure_cargo_llvm_cov_available(&sh)?;

            eprintln!("\n==> cargo llvm-cov -p tween-runtime --html");
            cmd!(sh, "cargo llvm-cov -p tween-runtime --all-features --html").run()?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        Commands::CovWorkspace => {
            ensure_cargo_llvm_cov_available(&sh)?;

            // workspace 覆盖率只用于趋势观察，排除 xtask 以免稀释信号
            eprintln!("\n==> cargo llvm-cov --workspace --exclude xtask --html");
            cmd!(
                sh,
                "cargo llvm-cov --workspace --exclude xtask --all-features --html"
            )
            .run()?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        Commands::SceneCheck { path } => scene_check(path.as_deref())?,
    }

    Ok(())
}

//=============================================================================
// scene-check 命令实现
//=============================================================================

/// 执行场景检查
fn scene_check(path: Option<&Path>) -> anyhow::Result<()> {
    let files = match path {
        Some(p) if p.is_file() => vec![p.to_path_buf()],
        Some(p) if p.is_dir() => collect_scene_files(p),
        Some(p) => anyhow::bail!("路径不存在: {}", p.display()),
        None => {
            let dir = Path::new(DEFAULT_SCENES_DIR);
            if !dir.exists() {
                anyhow::bail!(
                    "默认场景目录不存在: {}\n请在 workspace 根目录运行，或指定场景路径",
                    dir.display()
                );
            }
            collect_scene_files(dir)
        }
    };

    if files.is_empty() {
        eprintln!("未找到场景文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个场景文件...\n", files.len());

    let mut errors = 0;
    for file in &files {
        match SceneFile::load(file).and_then(|scene| scene.validate().map(|_| scene)) {
            Ok(scene) => eprintln!(
                "[OK] {}: {} 个对象, {} 个补间",
                file.display(),
                scene.objects.len(),
                scene.tweens.len()
            ),
            Err(e) => {
                eprintln!("[ERROR] {}: {}", file.display(), e);
                errors += 1;
            }
        }
    }

    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个场景", files.len());
    if errors > 0 {
        eprintln!("❌ {} 个错误", errors);
        anyhow::bail!("场景检查发现错误");
    }
    eprintln!("✅ 检查通过，无错误");
    Ok(())
}

/// 收集目录下的所有场景文件
fn collect_scene_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}
