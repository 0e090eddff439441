//! QFPROM 熔丝行访问客户端库
//!
//! 连接 qfprom 内核模块的 TCP 服务端（`start_tcp=PORT` 启动），
//! 读写一次性可编程熔丝行。每行分 LSB/MSB 两个 32 位半字。
//!
//! # 示例
//!
//! ```rust,no_run
//! use qfprom_client::{ClientConfig, QfpromClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig {
//!         host: "192.168.1.100".to_string(),
//!         port: 5000,
//!         timeout_secs: 5,
//!     };
//!
//!     let client = QfpromClient::new(config);
//!     let mut stream = client.connect().await.unwrap();
//!
//!     // 读 raw 行；error 非 0 是域错误，不是传输失败
//!     let row = client.read_row(&mut stream, 0xFC4B80A0, false).await.unwrap();
//!     if row.is_error() {
//!         println!("Error reading 0x{:08X} - {}", row.address, row.error);
//!     } else {
//!         println!("LSB: 0x{:08X} MSB: 0x{:08X}", row.lsb, row.msb);
//!     }
//!
//!     client.disconnect(&mut stream).await.unwrap();
//! }
//! ```

pub mod batch;
pub mod client;
pub mod protocol;

pub use batch::{read_many, read_many_direct, row_report_line, BatchError, BatchItem};
pub use client::{ClientConfig, ClientError, QfpromClient};
pub use protocol::{
    ProtocolError, RowResponse, RowResult, CMD_DISCONNECT, CMD_READ, CMD_READ_DIRECT,
    DEFAULT_BUS_CLK_KHZ, READ_REQUEST_SIZE, RESPONSE_SIZE, WRITE_REQUEST_SIZE,
};
