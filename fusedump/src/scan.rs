//! 批量扫描与 CSV 导出
//!
//! 逐条遍历行地址表读取熔丝行，每个地址一行记录，追加写入 CSV。
//! 主读报错时：customer-key 行直接记 SKIP（服务端没有直读路径），
//! 其余 raw 行补发一次直读回退并记录回退读到的 LSB/MSB——回退
//! 自身的错误码不单独落列。

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use qfprom_client::{QfpromClient, RowResult};
use tokio::net::TcpStream;
use tracing::{error, info, warn};

use crate::catalog::{is_cust_key_row, RowCatalog, RowEntry, RowKind};

/// CSV 表头。每次运行都追加一次，与既有数据文件保持历史兼容。
pub const CSV_HEADER: &str = "Name,Address,LSB,MSB,Type,Error,Direct LSB On Error,Direct MSB On Error";

/// 扫描选项
pub struct ScanOptions<'a> {
    /// 输出 CSV 路径（追加写入）
    pub output: &'a str,
    /// 扫描 corrected 表（默认扫 raw 表）
    pub corrected: bool,
    /// 不写入表头
    pub no_header: bool,
}

/// 扫描统计
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    pub ok: usize,
    pub domain_errors: usize,
    pub skipped: usize,
    pub fallbacks: usize,
    /// 传输层失败（只产生诊断日志，不落 CSV 行）
    pub failed: usize,
}

/// 执行一轮扫描
pub async fn run_scan(
    client: &QfpromClient,
    stream: &mut TcpStream,
    catalog: &RowCatalog,
    opts: ScanOptions<'_>,
) -> Result<ScanSummary> {
    let kind = if opts.corrected {
        RowKind::Corrected
    } else {
        RowKind::Raw
    };
    let entries = catalog.entries(kind);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(opts.output)
        .with_context(|| format!("open {}", opts.output))?;
    let mut writer = BufWriter::new(file);

    if !opts.no_header {
        writeln!(writer, "{}", CSV_HEADER)?;
    }

    let mut summary = ScanSummary {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        info!("{} - 0x{:08X}", entry.name, entry.address);

        let result = match client.read_row(stream, entry.address, opts.corrected).await {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to read 0x{:08X} ({}): {}", entry.address, entry.name, e);
                summary.failed += 1;
                continue;
            }
        };

        let row = if !result.is_error() {
            summary.ok += 1;
            info!(
                "Row data for 0x{:08X} - LSB: 0x{:08X} MSB: 0x{:08X}",
                result.address, result.lsb, result.msb
            );
            success_row(entry, kind, &result)
        } else {
            summary.domain_errors += 1;
            warn!("Error reading 0x{:08X} - {}", result.address, result.error);

            match kind {
                RowKind::Corrected => corrected_error_row(entry, &result),
                RowKind::Raw if is_cust_key_row(entry.address) => {
                    summary.skipped += 1;
                    skip_row(entry, &result)
                }
                RowKind::Raw => {
                    summary.fallbacks += 1;
                    match client.read_row_direct(stream, entry.address).await {
                        Ok(direct) => {
                            info!(
                                "Direct Read Row data for 0x{:08X} - LSB: 0x{:08X} MSB: 0x{:08X}",
                                direct.address, direct.lsb, direct.msb
                            );
                            fallback_row(entry, &result, &direct)
                        }
                        Err(e) => {
                            error!(
                                "Direct read failed for 0x{:08X} ({}): {}",
                                entry.address, entry.name, e
                            );
                            summary.failed += 1;
                            continue;
                        }
                    }
                }
            }
        };

        writeln!(writer, "{}", row.join(","))?;
    }

    writer.flush()?;
    info!(
        "scan: saved {} rows to {}",
        summary.total - summary.failed,
        opts.output
    );

    Ok(summary)
}

fn hex(v: u32) -> String {
    format!("0x{:08X}", v)
}

fn success_row(entry: &RowEntry, kind: RowKind, result: &RowResult) -> Vec<String> {
    vec![
        entry.name.clone(),
        hex(entry.address),
        hex(result.lsb),
        hex(result.msb),
        kind.to_string(),
        String::new(),
    ]
}

fn skip_row(entry: &RowEntry, result: &RowResult) -> Vec<String> {
    vec![
        entry.name.clone(),
        hex(entry.address),
        String::new(),
        String::new(),
        RowKind::Raw.to_string(),
        result.error.to_string(),
        "SKIP".to_string(),
        "SKIP".to_string(),
    ]
}

fn fallback_row(entry: &RowEntry, result: &RowResult, direct: &RowResult) -> Vec<String> {
    vec![
        entry.name.clone(),
        hex(entry.address),
        String::new(),
        String::new(),
        RowKind::Raw.to_string(),
        result.error.to_string(),
        hex(direct.lsb),
        hex(direct.msb),
    ]
}

fn corrected_error_row(entry: &RowEntry, result: &RowResult) -> Vec<String> {
    vec![
        entry.name.clone(),
        hex(entry.address),
        String::new(),
        String::new(),
        RowKind::Corrected.to_string(),
        result.error.to_string(),
    ]
}
