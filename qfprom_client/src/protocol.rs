//! QFPROM 寄存器访问协议 (qfprom wire protocol)
//!
//! 协议结构（所有多字节整数均为小端无符号）：
//! ```text
//! 读请求 (9 字节):
//!     cmd: u8,          // 0x01
//!     address: u32,     // 行地址
//!     corrected: u32,   // 0 = raw, 1 = corrected
//!
//! 直读请求 (9 字节):
//!     cmd: u8,          // 0x03
//!     address: u32,
//!     reserved: u32,    // 恒为 0
//!
//! 写请求 (17 字节):
//!     cmd: u8,          // 0x01，与读请求共用命令码，服务端按帧长区分
//!     address: u32,
//!     bus_clk_khz: u32, // 总线时钟
//!     lsb: u32,
//!     msb: u32,
//!
//! 断开 (1 字节):
//!     cmd: u8,          // 0x00
//!
//! 响应 (21 字节，所有请求同一形状):
//!     cmd: u8,
//!     address: u32,
//!     read_type: u32,
//!     lsb: u32,
//!     msb: u32,
//!     error: u32,       // 0 = 成功，非 0 = 服务端域错误码
//! ```

use bytes::{Buf, BytesMut};
use std::io;
use thiserror::Error;

/// 断开连接命令
pub const CMD_DISCONNECT: u8 = 0x00;

/// 读命令。写请求复用此命令码，仅靠命令码无法区分帧类型，
/// 必须结合帧长（9 对 17 字节）判断。
pub const CMD_READ: u8 = 0x01;

/// 直读命令（绕过 raw/corrected 路径）
pub const CMD_READ_DIRECT: u8 = 0x03;

/// 读/直读请求帧长
pub const READ_REQUEST_SIZE: usize = 9;

/// 写请求帧长
pub const WRITE_REQUEST_SIZE: usize = 17;

/// 响应帧长
pub const RESPONSE_SIZE: usize = 21;

/// 写操作默认总线时钟 (kHz)，即 MSM8974 的 XO 频率
pub const DEFAULT_BUS_CLK_KHZ: u32 = 19_200;

/// 协议错误
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed response: need {need} bytes, got {got}")]
    MalformedResponse { need: usize, got: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// 编码读请求
pub fn encode_read(address: u32, corrected: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(READ_REQUEST_SIZE);
    buf.push(CMD_READ);
    buf.extend_from_slice(&address.to_le_bytes());
    buf.extend_from_slice(&(corrected as u32).to_le_bytes());
    buf
}

/// 编码直读请求
pub fn encode_read_direct(address: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(READ_REQUEST_SIZE);
    buf.push(CMD_READ_DIRECT);
    buf.extend_from_slice(&address.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf
}

/// 编码写请求
pub fn encode_write(address: u32, bus_clk_khz: u32, lsb: u32, msb: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WRITE_REQUEST_SIZE);
    buf.push(CMD_READ);
    buf.extend_from_slice(&address.to_le_bytes());
    buf.extend_from_slice(&bus_clk_khz.to_le_bytes());
    buf.extend_from_slice(&lsb.to_le_bytes());
    buf.extend_from_slice(&msb.to_le_bytes());
    buf
}

/// 编码断开帧
pub fn encode_disconnect() -> Vec<u8> {
    vec![CMD_DISCONNECT]
}

/// 服务端响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowResponse {
    pub command: u8,
    pub address: u32,
    pub read_type: u32,
    pub lsb: u32,
    pub msb: u32,
    pub error: u32,
}

impl RowResponse {
    /// 从定长字节解码响应，少于 21 字节报 `MalformedResponse`
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < RESPONSE_SIZE {
            return Err(ProtocolError::MalformedResponse {
                need: RESPONSE_SIZE,
                got: data.len(),
            });
        }

        Ok(Self {
            command: data[0],
            address: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            read_type: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            lsb: u32::from_le_bytes([data[9], data[10], data[11], data[12]]),
            msb: u32::from_le_bytes([data[13], data[14], data[15], data[16]]),
            error: u32::from_le_bytes([data[17], data[18], data[19], data[20]]),
        })
    }

    /// 从接收缓冲区解码响应
    ///
    /// 缓冲区不足一帧时返回 `Ok(None)`，解码成功消费整帧 21 字节。
    pub fn decode(buf: &mut BytesMut) -> Result<Option<RowResponse>, ProtocolError> {
        if buf.len() < RESPONSE_SIZE {
            return Ok(None);
        }

        let resp = Self::from_bytes(&buf[..RESPONSE_SIZE])?;
        buf.advance(RESPONSE_SIZE);

        Ok(Some(resp))
    }
}

/// 单次行操作的结果
///
/// `error` 非 0 是服务端的域错误（如熔丝未烧写、访问被拒），
/// 属于正常返回值而不是传输失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowResult {
    pub address: u32,
    pub lsb: u32,
    pub msb: u32,
    pub error: u32,
}

impl RowResult {
    pub fn is_error(&self) -> bool {
        self.error != 0
    }
}

impl From<RowResponse> for RowResult {
    fn from(resp: RowResponse) -> Self {
        Self {
            address: resp.address,
            lsb: resp.lsb,
            msb: resp.msb,
            error: resp.error,
        }
    }
}
