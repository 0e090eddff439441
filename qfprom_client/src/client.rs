//! QFPROM 寄存器访问服务客户端
//!
//! 单连接、同步请求/响应：协议没有请求标识，请求与响应只靠
//! 时序对应，同一连接上任一时刻最多一个未决请求。

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::protocol::{self, ProtocolError, RowResponse, RowResult};

/// 客户端错误
///
/// 注意响应中 `error` 字段非 0 不在此列，那是域错误，
/// 作为 [`RowResult`] 的一部分正常返回。
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timeout")]
    Timeout,
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// 接收超时（秒），0 表示不限时
    pub timeout_secs: u64,
}

/// QFPROM 行访问客户端
pub struct QfpromClient {
    config: ClientConfig,
}

impl QfpromClient {
    /// 创建新客户端
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// 连接到服务端
    pub async fn connect(&self) -> Result<TcpStream, ClientError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to {}", addr);
        let stream = TcpStream::connect(&addr).await?;
        info!("Connected to {}", addr);
        Ok(stream)
    }

    /// 发送整帧
    async fn send_request(stream: &mut TcpStream, data: &[u8]) -> Result<(), ClientError> {
        debug!("Sending {} bytes: {:02x?}", data.len(), data);
        stream.write_all(data).await?;
        Ok(())
    }

    /// 接收整帧响应，按帧长循环读满 21 字节
    async fn recv_response(
        stream: &mut TcpStream,
        timeout_secs: u64,
    ) -> Result<RowResponse, ClientError> {
        if timeout_secs == 0 {
            return Self::recv_response_inner(stream).await;
        }

        match timeout(
            Duration::from_secs(timeout_secs),
            Self::recv_response_inner(stream),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout),
        }
    }

    async fn recv_response_inner(stream: &mut TcpStream) -> Result<RowResponse, ClientError> {
        let mut buf = BytesMut::with_capacity(protocol::RESPONSE_SIZE * 2);
        let mut read_buf = [0u8; 64];

        loop {
            let n = stream.read(&mut read_buf).await?;
            if n == 0 {
                if buf.is_empty() {
                    return Err(ClientError::ConnectionClosed);
                }
                // 对端在整帧读满前关闭
                return Err(ClientError::Protocol(ProtocolError::MalformedResponse {
                    need: protocol::RESPONSE_SIZE,
                    got: buf.len(),
                }));
            }

            buf.extend_from_slice(&read_buf[..n]);
            debug!("Received {} bytes, buffer size: {}", n, buf.len());

            if let Some(resp) = RowResponse::decode(&mut buf)? {
                return Ok(resp);
            }
        }
    }

    /// 一次请求/响应往返
    async fn transact(
        &self,
        stream: &mut TcpStream,
        frame: &[u8],
    ) -> Result<RowResponse, ClientError> {
        Self::send_request(stream, frame).await?;
        Self::recv_response(stream, self.config.timeout_secs).await
    }

    /// 读一行（raw 或 corrected）
    pub async fn read_row(
        &self,
        stream: &mut TcpStream,
        address: u32,
        corrected: bool,
    ) -> Result<RowResult, ClientError> {
        let resp = self
            .transact(stream, &protocol::encode_read(address, corrected))
            .await?;
        Ok(RowResult::from(resp))
    }

    /// 直读一行
    pub async fn read_row_direct(
        &self,
        stream: &mut TcpStream,
        address: u32,
    ) -> Result<RowResult, ClientError> {
        let resp = self
            .transact(stream, &protocol::encode_read_direct(address))
            .await?;
        Ok(RowResult::from(resp))
    }

    /// 写一行
    pub async fn write_row(
        &self,
        stream: &mut TcpStream,
        address: u32,
        lsb: u32,
        msb: u32,
        bus_clk_khz: u32,
    ) -> Result<RowResult, ClientError> {
        let resp = self
            .transact(stream, &protocol::encode_write(address, bus_clk_khz, lsb, msb))
            .await?;
        Ok(RowResult::from(resp))
    }

    /// 发送断开帧。尽力而为，失败由调用方上报。
    pub async fn disconnect(&self, stream: &mut TcpStream) -> Result<(), ClientError> {
        Self::send_request(stream, &protocol::encode_disconnect()).await
    }
}
