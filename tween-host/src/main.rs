//! Tween Host - 命令行入口
//!
//! ```bash
//! cargo run -p tween-host -- run scenes/demo.json
//! cargo run -p tween-host -- run demo.json --delta 33.3 --output trace.json
//! cargo run -p tween-host -- check scenes/demo.json scenes/other.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, error, info, warn};
use tween_host::{HostConfig, SceneFile, run_scene, write_trace};

#[derive(Parser)]
#[command(name = "tween-host")]
#[command(about = "补间引擎无头宿主 - 按固定步长运行 JSON 场景并输出轨迹")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径（默认：config.json）
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// 日志级别，覆盖配置文件
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行场景
    Run {
        /// 场景文件
        scene: PathBuf,

        /// 帧步长（毫秒）
        #[arg(long)]
        delta: Option<f64>,

        /// 最大帧数
        #[arg(long)]
        frames: Option<u64>,

        /// 全局时间缩放
        #[arg(long)]
        time_scale: Option<f64>,

        /// 采样间隔（帧）
        #[arg(long)]
        sample_every: Option<u64>,

        /// 轨迹输出文件（JSON）；不指定时只打印摘要
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 检查场景文件
    Check {
        /// 场景文件
        #[arg(required = true)]
        scenes: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 配置文件要先于日志读取，读取失败的警告在日志初始化后补记
    let loaded = cli
        .config
        .exists()
        .then(|| HostConfig::try_load(&cli.config));

    let mut config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => HostConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    init_logging(config.level().unwrap_or(Level::INFO));

    if let Some(Err(e)) = &loaded {
        warn!(path = %cli.config.display(), error = %e, "配置文件加载失败，使用默认配置");
    }

    match real_main(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn real_main(cli: Cli, mut config: HostConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            scene,
            delta,
            frames,
            time_scale,
            sample_every,
            output,
        } => {
            if let Some(delta) = delta {
                config.frame_delta_ms = delta;
            }
            if let Some(frames) = frames {
                config.max_frames = frames;
            }
            if let Some(time_scale) = time_scale {
                config.time_scale = time_scale;
            }
            if let Some(sample_every) = sample_every {
                config.sample_every = sample_every;
            }
            config.validate().context("配置无效")?;

            let trace = run_scene(&config, &scene)
                .with_context(|| format!("运行场景失败: {}", scene.display()))?;

            match output {
                Some(path) => {
                    write_trace(&trace, &path)?;
                    info!(path = %path.display(), "轨迹已写入");
                }
                None => {
                    println!(
                        "场景 {}: {} 帧, {:.1} ms, {}",
                        trace.scene,
                        trace.frames,
                        trace.time,
                        if trace.finished { "全部完成" } else { "达到帧数上限" }
                    );
                    if let Some(last) = trace.samples.last() {
                        for (object, props) in &last.values {
                            println!("  {object}: {props:?}");
                        }
                    }
                    println!("  事件: {} 条", trace.events.len());
                }
            }
        }
        Commands::Check { scenes } => {
            let mut failed = 0;
            for path in &scenes {
                let path = config.resolve_scene(path);
                match SceneFile::load(&path).and_then(|scene| scene.validate().map(|_| scene)) {
                    Ok(scene) => println!(
                        "✅ {}: {} 个对象, {} 个补间",
                        path.display(),
                        scene.objects.len(),
                        scene.tweens.len()
                    ),
                    Err(e) => {
                        println!("❌ {}: {}", path.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} 个场景检查失败");
            }
        }
    }
    Ok(())
}
