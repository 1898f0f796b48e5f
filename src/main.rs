//! アプリケーションのエントリポイントとランタイム初期化。

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing_appender::non_blocking::WorkerGuard;

mod batch;
mod compose;
mod config;
mod dispatch;
mod encode;
mod error;
mod events;
mod jobs;
mod normalize;
mod orchestrator;
mod worker;

use config::Config;
use jobs::{LabelRecord, PrintRequest};
use orchestrator::{JobReport, Orchestrator};

#[derive(Parser)]
#[command(name = "label_printer", about = "Print device QR sheets and product labels", version)]
struct Cli {
    /// Settings file; written with defaults when missing.
    #[arg(long, global = true, value_name = "PATH", default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print comma-separated device numbers, two per page.
    Pair { ids: String },
    /// Print comma-separated device numbers as one QR code.
    Bulk { ids: String },
    /// Print one product label.
    Label(LabelArgs),
    /// Print every label in a JSON batch file.
    Batch { file: PathBuf },
    /// Write a "69" EAN-13 barcode image.
    Ean13 { payload: String },
}

#[derive(Args)]
struct LabelArgs {
    #[arg(long)]
    product_name: String,
    #[arg(long)]
    color: String,
    #[arg(long)]
    date: String,
    #[arg(long)]
    quantity: String,
    #[arg(long)]
    net_weight: String,
    #[arg(long)]
    gross_weight: String,
    #[arg(long, default_value = batch::DEFAULT_BARCODE_TYPE)]
    barcode_type: String,
    #[arg(long)]
    box_number: String,
    /// Comma, pipe or newline separated.
    #[arg(long)]
    device_numbers: String,
}

impl From<LabelArgs> for LabelRecord {
    fn from(a: LabelArgs) -> Self {
        LabelRecord {
            product_name: a.product_name,
            product_color: a.color,
            production_date: a.date,
            quantity: a.quantity,
            net_weight: a.net_weight,
            gross_weight: a.gross_weight,
            barcode_type: a.barcode_type,
            box_number: a.box_number,
            device_numbers: a.device_numbers,
            file_prefix: None,
        }
    }
}

/// ファイルロギングを初期化し、非同期ガードを生存させる。
fn init_logging() -> Result<WorkerGuard> {
    // ログ出力先ファイル名を決める。
    let log_file = "label_printer.log";
    // ステータス行を出す標準出力を汚さないよう、ファイルへ直接書き込む。
    let file_appender = tracing_appender::rolling::never(".", log_file);
    // 非同期書き込み用のラッパーとガードを用意する。
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // フォーマッタと出力先を設定して初期化する。
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

#[tokio::main]
/// エントリポイント：ログ初期化→設定読込→コマンド実行。
async fn main() -> Result<()> {
    // ロガーを初期化し、ガードを保持して書き込みを継続させる。
    let _log_guard = init_logging()?;
    let cli = Cli::parse();
    tracing::info!("app starting");
    // 設定を読み込む（無ければ既定値で作成）。
    let cfg = Config::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let res = run(cli.command, cfg, &cli.config).await;
    // エラーがあればログに残す。
    if let Err(ref e) = res {
        tracing::error!("app error: {e:#}");
    }
    tracing::info!("app exiting");
    res
}

async fn run(command: Commands, cfg: Config, config_path: &Path) -> Result<()> {
    // EAN-13 は印刷キューを通さず画像だけ書き出す。
    if let Commands::Ean13 { payload } = &command {
        return write_ean13(payload, &cfg);
    }

    let (orch, mut events) = Orchestrator::start(cfg);
    // ステータス行は受け取った順に標準出力へ流す。
    let printer = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            println!("{ev}");
        }
    });

    let res: Result<()> = match command {
        Commands::Pair { ids } => print_one(&orch, PrintRequest::Pair(ids)).await,
        Commands::Bulk { ids } => print_one(&orch, PrintRequest::Bulk(ids)).await,
        Commands::Label(args) => print_one(&orch, PrintRequest::Label(args.into())).await,
        Commands::Batch { file } => run_batch(&orch, &file, config_path).await,
        Commands::Ean13 { .. } => Ok(()),
    };

    // ワーカーを止め、残りのステータス行を出し切る。
    drop(orch);
    let _ = printer.await;
    res
}

/// Run one request; Ctrl-C cancels it if rendering has not started.
async fn print_one(orch: &Orchestrator, request: PrintRequest) -> Result<()> {
    let handle = orch.submit(request);
    tracing::debug!("request {} submitted", handle.id);
    let canceller = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            canceller.cancel();
        }
    });
    let res = handle.wait().await;
    interrupt.abort();
    summarize(res?);
    Ok(())
}

/// Print batch rows one after another; a failed row does not stop the rest.
///
/// Edits to the settings file take effect from the next row.
async fn run_batch(orch: &Orchestrator, file: &Path, config_path: &Path) -> Result<()> {
    let records = batch::load(file)?;
    let total = records.len();
    let mut stamp = modified(config_path);
    let mut failed = 0;
    for (i, record) in records.into_iter().enumerate() {
        let current = modified(config_path);
        if current != stamp {
            stamp = current;
            match Config::load_or_default(config_path) {
                Ok(cfg) => orch.reload(cfg).await?,
                Err(e) => tracing::warn!("keeping previous settings: {e:#}"),
            }
        }

        let box_number = record.box_number.clone();
        match orch.run(PrintRequest::Label(record)).await {
            Ok(report) => summarize(report),
            Err(e) => {
                failed += 1;
                tracing::warn!("batch row {} ({box_number}) failed: {e}", i + 1);
            }
        }
    }
    println!("batch finished: {}/{total} label(s) printed", total - failed);
    if failed > 0 {
        bail!("{failed} of {total} batch row(s) failed");
    }
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn summarize(report: JobReport) {
    for d in &report.dispatches {
        match &d.outcome {
            Ok(()) => tracing::info!(
                "request {}: {} took {:?}",
                report.id,
                d.document.display(),
                d.finished - d.started
            ),
            Err(e) => tracing::warn!("request {}: {} not printed: {e}", report.id, d.document.display()),
        }
    }
    let failed = report.failed_dispatches();
    if failed > 0 {
        println!(
            "{} document(s) written, {failed} could not be sent to the printer",
            report.documents.len()
        );
    }
}

fn write_ean13(payload: &str, cfg: &Config) -> Result<()> {
    let payload = payload.trim();
    let (w, h) = encode::EAN13_PX;
    let code = encode::encode(
        payload,
        encode::CodeKind::Ean13,
        encode::PixelSize::new(w, h),
    )?;
    fs::create_dir_all(&cfg.paths.image_dir)?;
    let path = cfg.paths.image_dir.join(format!("69_{payload}.png"));
    code.save_png(&path)?;
    println!("✓ wrote {}", path.display());
    Ok(())
}
