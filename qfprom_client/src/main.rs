//! QFPROM TCP 客户端
//!
//! 连接 qfprom 内核模块的 TCP 服务端，批量读取熔丝行。
//!
//! 使用方法:
//!   qfprom_client HOST PORT -r 0xFC4B80A0 0xFC4B80A8   # 读 raw 行
//!   qfprom_client HOST PORT --rc 0xFC4BC0A0            # 读 corrected 行
//!   qfprom_client HOST PORT --rd 0xFC4B80A0            # 直读 (readl)

use clap::Parser;
use qfprom_client::{batch, ClientConfig, QfpromClient};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// QFPROM fuse-row TCP client
#[derive(Parser, Debug)]
#[command(name = "qfprom_client")]
#[command(about = "Read fuse rows from a qfprom TCP register service")]
struct Args {
    /// The host to connect to
    host: String,

    /// The port to connect on
    port: u16,

    /// Read specified address(es)
    #[arg(short = 'r', long = "read", value_name = "ADDR", num_args = 1..)]
    read: Vec<String>,

    /// Read specified corrected address(es)
    #[arg(long = "rc", value_name = "ADDR", num_args = 1..)]
    read_corrected: Vec<String>,

    /// Read specified addresses directly with readl
    #[arg(long = "rd", value_name = "ADDR", num_args = 1..)]
    read_direct: Vec<String>,

    /// Receive timeout in seconds (0 = wait forever)
    #[arg(short, long, default_value_t = 0)]
    timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// 逐项打印批量结果；失败项上报后继续
fn report_items(items: &[batch::BatchItem]) {
    for item in items {
        match &item.outcome {
            Ok(result) => println!("{}", batch::row_report_line(result)),
            Err(e) => error!("Failed to read '{}': {}", item.input, e),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // 设置日志
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Trying to connect to {} on port {}", args.host, args.port);

    let client = QfpromClient::new(ClientConfig {
        host: args.host.clone(),
        port: args.port,
        timeout_secs: args.timeout,
    });

    let mut stream = match client.connect().await {
        Ok(s) => s,
        Err(e) => {
            error!(
                "Error connecting to {} on port {}: {}",
                args.host, args.port, e
            );
            std::process::exit(1);
        }
    };

    if !args.read.is_empty() {
        report_items(&batch::read_many(&client, &mut stream, &args.read, false).await);
    }
    if !args.read_corrected.is_empty() {
        report_items(&batch::read_many(&client, &mut stream, &args.read_corrected, true).await);
    }
    if !args.read_direct.is_empty() {
        report_items(&batch::read_many_direct(&client, &mut stream, &args.read_direct).await);
    }

    info!("Disconnecting");
    if let Err(e) = client.disconnect(&mut stream).await {
        error!("Disconnect failed: {}", e);
    }
}
