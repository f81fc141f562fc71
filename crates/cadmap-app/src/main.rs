//! CadMap 命令行工具
//!
//! 打开作业文件、重放编辑记录并报告拓扑；前推、检查和DXF导出都在这里调度。

use anyhow::{bail, Context, Result};
use cadmap_core::config::EngineConfig;
use cadmap_core::model::MapModel;
use cadmap_core::operation::OperationId;
use cadmap_core::rollforward::RollforwardOutcome;
use cadmap_core::shared::{share, TopologyWorker, WorkerEvent};
use cadmap_file::native::{self, JobFile};
use cadmap_file::{dxf_io, JobDirectory};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "cadmap")]
#[command(about = "Cadastral map topology and rollforward engine")]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a job and print its polygons
    Replay {
        /// Path to .cmap file
        job: PathBuf,
        /// Print the geometric model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Roll forward from the given operations (all when none given)
    Rollforward {
        /// Path to .cmap file
        job: PathBuf,
        /// Operation sequence numbers that changed
        #[arg(long = "from")]
        from: Vec<u32>,
        /// Write the job back when the pass completes
        #[arg(long)]
        save: bool,
    },
    /// List topology defects
    Check {
        /// Path to .cmap file
        job: PathBuf,
    },
    /// Export features and polygons to DXF
    ExportDxf {
        /// Path to .cmap file
        job: PathBuf,
        /// Output .dxf path
        out: PathBuf,
    },
    /// List the jobs in a directory
    Jobs {
        dir: PathBuf,
        /// Create an empty job with this name first
        #[arg(long)]
        create: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn open_job(path: &Path, config: &EngineConfig) -> Result<(JobFile, MapModel)> {
    let job = native::load(path).with_context(|| format!("opening {}", path.display()))?;
    let model = job
        .open(config)
        .with_context(|| format!("replaying {}", path.display()))?;
    Ok((job, model))
}

fn replay(job: &Path, json: bool, config: &EngineConfig) -> Result<()> {
    let (file, model) = open_job(job, config)?;
    let snapshot = model.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!(
        "{}: {} operations, {} features, {} dividers",
        file.metadata.name,
        model.operations().len(),
        model.features().len(),
        model.topology().divider_count()
    );
    for (i, polygon) in snapshot.polygons.iter().enumerate() {
        println!(
            "  polygon {:>3}  area {:>14.3}  vertices {:>4}  islands {}",
            i + 1,
            polygon.area,
            polygon.outline.len(),
            polygon.islands
        );
    }
    println!("  total area {:.3}", snapshot.total_area());
    Ok(())
}

fn rollforward(job: &Path, from: Vec<u32>, save: bool, config: &EngineConfig) -> Result<()> {
    let (file, model) = open_job(job, config)?;
    let changed: Vec<OperationId> = if from.is_empty() {
        model.operations().ids().collect()
    } else {
        from.into_iter().map(OperationId).collect()
    };

    // 在后台线程上持有写锁前推，主线程等待事件
    let map = share(model);
    let worker = TopologyWorker::spawn_rollforward(map.clone(), changed);
    let mut outcome = None;
    for event in worker.join() {
        match event {
            WorkerEvent::RolledForward(o) => outcome = Some(o),
            WorkerEvent::Failed(reason) => bail!("rollforward failed: {reason}"),
            WorkerEvent::Started | WorkerEvent::Rebuilt(_) => {}
        }
    }
    let Some(outcome) = outcome else {
        bail!("rollforward worker ended without a result");
    };

    let report = outcome.report();
    println!(
        "replayed {} operations, moved {} points (largest shift {:.3}), {} rings retraced",
        report.replayed.len(),
        report.moved_points(),
        report.largest_shift(),
        report.topology.rings_created
    );
    match &outcome {
        RollforwardOutcome::Complete(_) => {}
        RollforwardOutcome::Faulted { fault, .. } => {
            warn!(operation = %fault.operation, "Rollforward stopped");
            println!("fault: {fault}");
        }
        RollforwardOutcome::Cancelled(_) => println!("cancelled"),
    }

    if save {
        if !outcome.is_complete() {
            bail!("not saving {}: rollforward did not complete", job.display());
        }
        let model = map
            .read()
            .map_err(|_| anyhow::anyhow!("model lock poisoned"))?;
        native::save(&JobFile::from_model(file.metadata, &model), job)?;
    }
    Ok(())
}

fn check(job: &Path, config: &EngineConfig) -> Result<()> {
    let (_, model) = open_job(job, config)?;
    let items = model.check();
    for item in &items {
        let lines: Vec<String> = item.lines.iter().map(|l| l.to_string()).collect();
        println!(
            "{:<13} ({:.3}, {:.3})  {}",
            format!("{:?}", item.check),
            item.position.x,
            item.position.y,
            lines.join(" ")
        );
    }
    info!(defects = items.len(), "Check finished");
    Ok(())
}

fn export_dxf(job: &Path, out: &Path, config: &EngineConfig) -> Result<()> {
    let (_, model) = open_job(job, config)?;
    let summary = dxf_io::export(&model, out)?;
    println!(
        "wrote {}: {} points, {} lines, {} texts, {} polygons",
        out.display(),
        summary.points,
        summary.lines,
        summary.texts,
        summary.polygons
    );
    Ok(())
}

fn jobs(dir: &Path, create: Option<String>) -> Result<()> {
    let directory = JobDirectory::new(dir);
    if let Some(name) = create {
        directory.create_job(&name)?;
    }
    for name in directory.find_all_job_names()? {
        println!("{name}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish(),
    )?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay { job, json } => replay(&job, json, &config),
        Commands::Rollforward { job, from, save } => rollforward(&job, from, save, &config),
        Commands::Check { job } => check(&job, &config),
        Commands::ExportDxf { job, out } => export_dxf(&job, &out, &config),
        Commands::Jobs { dir, create } => jobs(&dir, create),
    }
}
