//! 批量读取 (batch reader)
//!
//! 按用户给定的地址列表逐个读取。单个地址的解析失败或传输失败
//! 只记为该项的错误，不会中止后续地址。

use thiserror::Error;
use tokio::net::TcpStream;

use crate::client::{ClientError, QfpromClient};
use crate::protocol::RowResult;

/// 批量读取中单项的错误
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("invalid address '{0}': expected a base-16 value")]
    InvalidAddress(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// 批量读取中单项的结果，`input` 为用户原始输入
#[derive(Debug)]
pub struct BatchItem {
    pub input: String,
    pub outcome: Result<RowResult, BatchError>,
}

/// 解析 16 进制地址，`0x` 前缀可选
pub fn parse_address(input: &str) -> Result<u32, BatchError> {
    let s = input.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|_| BatchError::InvalidAddress(input.to_string()))
}

/// 逐个读取地址列表
pub async fn read_many(
    client: &QfpromClient,
    stream: &mut TcpStream,
    addresses: &[String],
    corrected: bool,
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(addresses.len());
    for input in addresses {
        let outcome = match parse_address(input) {
            Ok(address) => client
                .read_row(stream, address, corrected)
                .await
                .map_err(BatchError::from),
            Err(e) => Err(e),
        };
        items.push(BatchItem {
            input: input.clone(),
            outcome,
        });
    }
    items
}

/// 逐个直读地址列表
pub async fn read_many_direct(
    client: &QfpromClient,
    stream: &mut TcpStream,
    addresses: &[String],
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(addresses.len());
    for input in addresses {
        let outcome = match parse_address(input) {
            Ok(address) => client
                .read_row_direct(stream, address)
                .await
                .map_err(BatchError::from),
            Err(e) => Err(e),
        };
        items.push(BatchItem {
            input: input.clone(),
            outcome,
        });
    }
    items
}

/// 单行结果报告，域错误与数据行各一种固定格式
pub fn row_report_line(result: &RowResult) -> String {
    if result.is_error() {
        format!("Error reading 0x{:08X} - {}", result.address, result.error)
    } else {
        format!(
            "Row data for 0x{:08X} - LSB: 0x{:08X} MSB: 0x{:08X}",
            result.address, result.lsb, result.msb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0xFC4B80A0").unwrap(), 0xFC4B80A0);
        assert_eq!(parse_address("FC4B80A0").unwrap(), 0xFC4B80A0);
        assert_eq!(parse_address("0XFC4B80A0").unwrap(), 0xFC4B80A0);
        assert_eq!(parse_address(" 0x10 ").unwrap(), 0x10);
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(matches!(
            parse_address("zzz"),
            Err(BatchError::InvalidAddress(_))
        ));
        assert!(matches!(parse_address(""), Err(BatchError::InvalidAddress(_))));
        // 超出 32 位
        assert!(matches!(
            parse_address("0x1FFFFFFFF"),
            Err(BatchError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_report_lines() {
        let ok = RowResult {
            address: 0xFC4B80A0,
            lsb: 0x11111111,
            msb: 0x22222222,
            error: 0,
        };
        assert_eq!(
            row_report_line(&ok),
            "Row data for 0xFC4B80A0 - LSB: 0x11111111 MSB: 0x22222222"
        );

        let err = RowResult {
            address: 0xFC4B81E0,
            lsb: 0,
            msb: 0,
            error: 5,
        };
        assert_eq!(row_report_line(&err), "Error reading 0xFC4B81E0 - 5");
    }
}
