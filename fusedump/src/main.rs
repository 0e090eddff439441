//! fusedump - QFPROM 熔丝行批量扫描导出工具
//!
//! 遍历 MSM8974 行地址表（内置，或经 --catalog 指定），逐行读取
//! 并追加导出 CSV。主读报错的行按策略记 SKIP 或用直读回退。
//!
//! 使用方法:
//!   fusedump HOST PORT                     # 扫描 raw 表到 read_out.csv
//!   fusedump HOST PORT -o dump.csv         # 指定输出文件
//!   fusedump HOST PORT --corrected         # 扫描 corrected 表
//!   fusedump HOST PORT -C rows.json        # 使用外部行表

mod catalog;
mod scan;

use anyhow::Result;
use clap::Parser;
use qfprom_client::{ClientConfig, QfpromClient};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_OUTPUT: &str = "read_out.csv";

/// QFPROM fuse-row bulk scanner
#[derive(Parser)]
#[command(name = "fusedump")]
#[command(about = "Scan qfprom fuse rows over TCP and export them to CSV")]
struct Cli {
    /// The host to connect to
    host: String,

    /// The port to connect on
    port: u16,

    /// 输出 CSV 路径（追加写入）
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: String,

    /// 扫描 corrected 表而不是 raw 表
    #[arg(long)]
    corrected: bool,

    /// 不写入表头（默认每次运行都追加一行表头）
    #[arg(long)]
    no_header: bool,

    /// 行地址表 JSON 路径（默认使用内置 MSM8974 表）
    #[arg(short = 'C', long)]
    catalog: Option<String>,

    /// 接收超时（秒），0 表示不限时
    #[arg(short, long, default_value_t = 0)]
    timeout: u64,

    /// 详细输出
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let row_catalog = match &cli.catalog {
        Some(path) => {
            info!("fusedump: Loading catalog from {}", path);
            catalog::RowCatalog::from_file(path)?
        }
        None => catalog::RowCatalog::default(),
    };
    info!(
        "fusedump: Catalog '{}': {} raw rows, {} corrected rows",
        row_catalog.name,
        row_catalog.raw.len(),
        row_catalog.corrected.len()
    );

    info!("Trying to connect to {} on port {}", cli.host, cli.port);

    let client = QfpromClient::new(ClientConfig {
        host: cli.host.clone(),
        port: cli.port,
        timeout_secs: cli.timeout,
    });

    let mut stream = match client.connect().await {
        Ok(s) => s,
        Err(e) => {
            error!("Error connecting to {} on port {}: {}", cli.host, cli.port, e);
            std::process::exit(1);
        }
    };

    let summary = scan::run_scan(
        &client,
        &mut stream,
        &row_catalog,
        scan::ScanOptions {
            output: &cli.output,
            corrected: cli.corrected,
            no_header: cli.no_header,
        },
    )
    .await?;

    info!("Disconnecting");
    if let Err(e) = client.disconnect(&mut stream).await {
        error!("Disconnect failed: {}", e);
    }

    info!(
        "fusedump: Done. {} rows: {} ok, {} domain errors ({} skipped, {} direct fallbacks), {} failed",
        summary.total, summary.ok, summary.domain_errors, summary.skipped, summary.fallbacks,
        summary.failed
    );

    Ok(())
}
