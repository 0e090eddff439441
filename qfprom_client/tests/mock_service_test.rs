//! 基于本地 mock 服务端的端到端测试
//!
//! mock 服务端监听 127.0.0.1 随机端口，按帧长解析请求并根据
//! 预设的行表返回 21 字节响应，同时记录收到的每个请求以便
//! 断言命令码与标志位。

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use qfprom_client::protocol::{CMD_DISCONNECT, CMD_READ, CMD_READ_DIRECT, RESPONSE_SIZE};
use qfprom_client::{batch, BatchError, ClientConfig, ClientError, QfpromClient};

#[derive(Debug, Clone, Copy)]
struct MockRow {
    lsb: u32,
    msb: u32,
    error: u32,
}

/// 收到的请求: (命令码, 地址, 辅助字段)
type RequestLog = Vec<(u8, u32, u32)>;

fn response_frame(cmd: u8, address: u32, row: MockRow) -> Vec<u8> {
    let mut resp = Vec::with_capacity(RESPONSE_SIZE);
    resp.push(cmd);
    resp.extend_from_slice(&address.to_le_bytes());
    resp.extend_from_slice(&0u32.to_le_bytes()); // read_type
    resp.extend_from_slice(&row.lsb.to_le_bytes());
    resp.extend_from_slice(&row.msb.to_le_bytes());
    resp.extend_from_slice(&row.error.to_le_bytes());
    resp
}

/// 启动只处理 9 字节读请求的 mock 服务端，断开帧或连接关闭时
/// 结束并返回请求日志
async fn spawn_mock_service(
    rows: HashMap<u32, MockRow>,
    direct_rows: HashMap<u32, MockRow>,
) -> (SocketAddr, JoinHandle<RequestLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut log = RequestLog::new();
        let mut cmd = [0u8; 1];

        loop {
            if socket.read_exact(&mut cmd).await.is_err() {
                break;
            }
            match cmd[0] {
                CMD_DISCONNECT => break,
                c @ (CMD_READ | CMD_READ_DIRECT) => {
                    let mut rest = [0u8; 8];
                    socket.read_exact(&mut rest).await.unwrap();
                    let address = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
                    let aux = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
                    log.push((c, address, aux));

                    let table = if c == CMD_READ { &rows } else { &direct_rows };
                    let row = table.get(&address).copied().unwrap_or(MockRow {
                        lsb: 0,
                        msb: 0,
                        error: 0xDEAD,
                    });
                    socket.write_all(&response_frame(c, address, row)).await.unwrap();
                }
                _ => break,
            }
        }
        log
    });

    (addr, handle)
}

fn client_for(addr: SocketAddr) -> QfpromClient {
    QfpromClient::new(ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs: 5,
    })
}

#[tokio::test]
async fn test_batch_read_success() {
    let mut rows = HashMap::new();
    rows.insert(
        0xFC4B80A0,
        MockRow {
            lsb: 0x11111111,
            msb: 0x22222222,
            error: 0,
        },
    );
    let (addr, handle) = spawn_mock_service(rows, HashMap::new()).await;

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let items = batch::read_many(&client, &mut stream, &["0xFC4B80A0".to_string()], false).await;
    assert_eq!(items.len(), 1);
    let result = items[0].outcome.as_ref().unwrap();
    assert!(!result.is_error());
    assert_eq!(
        batch::row_report_line(result),
        "Row data for 0xFC4B80A0 - LSB: 0x11111111 MSB: 0x22222222"
    );

    client.disconnect(&mut stream).await.unwrap();
    let log = handle.await.unwrap();
    assert_eq!(log, vec![(CMD_READ, 0xFC4B80A0, 0)]);
}

#[tokio::test]
async fn test_batch_read_domain_error() {
    let mut rows = HashMap::new();
    rows.insert(
        0xFC4B81E0,
        MockRow {
            lsb: 0,
            msb: 0,
            error: 5,
        },
    );
    let (addr, handle) = spawn_mock_service(rows, HashMap::new()).await;

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let items = batch::read_many(&client, &mut stream, &["0xFC4B81E0".to_string()], false).await;
    // 域错误是正常返回，不是 Err
    let result = items[0].outcome.as_ref().unwrap();
    assert!(result.is_error());
    assert_eq!(batch::row_report_line(result), "Error reading 0xFC4B81E0 - 5");

    client.disconnect(&mut stream).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_batch_corrected_flag_on_wire() {
    let mut rows = HashMap::new();
    rows.insert(
        0xFC4BC0A0,
        MockRow {
            lsb: 1,
            msb: 2,
            error: 0,
        },
    );
    let (addr, handle) = spawn_mock_service(rows, HashMap::new()).await;

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let items = batch::read_many(&client, &mut stream, &["0xFC4BC0A0".to_string()], true).await;
    assert!(items[0].outcome.is_ok());

    client.disconnect(&mut stream).await.unwrap();
    let log = handle.await.unwrap();
    assert_eq!(log, vec![(CMD_READ, 0xFC4BC0A0, 1)]);
}

#[tokio::test]
async fn test_batch_read_direct() {
    let mut direct_rows = HashMap::new();
    direct_rows.insert(
        0xFC4B80A8,
        MockRow {
            lsb: 0xAAAAAAAA,
            msb: 0xBBBBBBBB,
            error: 0,
        },
    );
    let (addr, handle) = spawn_mock_service(HashMap::new(), direct_rows).await;

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let items =
        batch::read_many_direct(&client, &mut stream, &["0xFC4B80A8".to_string()]).await;
    let result = items[0].outcome.as_ref().unwrap();
    assert_eq!(result.lsb, 0xAAAAAAAA);
    assert_eq!(result.msb, 0xBBBBBBBB);

    client.disconnect(&mut stream).await.unwrap();
    let log = handle.await.unwrap();
    assert_eq!(log, vec![(CMD_READ_DIRECT, 0xFC4B80A8, 0)]);
}

#[tokio::test]
async fn test_batch_invalid_address_continues() {
    let mut rows = HashMap::new();
    rows.insert(
        0xFC4B80A0,
        MockRow {
            lsb: 0x11111111,
            msb: 0x22222222,
            error: 0,
        },
    );
    let (addr, handle) = spawn_mock_service(rows, HashMap::new()).await;

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let inputs = vec!["zzz".to_string(), "0xFC4B80A0".to_string()];
    let items = batch::read_many(&client, &mut stream, &inputs, false).await;

    // 第一项解析失败被上报，第二项仍然执行
    assert_eq!(items.len(), 2);
    assert!(matches!(
        items[0].outcome,
        Err(BatchError::InvalidAddress(_))
    ));
    assert!(items[1].outcome.is_ok());

    client.disconnect(&mut stream).await.unwrap();
    let log = handle.await.unwrap();
    assert_eq!(log, vec![(CMD_READ, 0xFC4B80A0, 0)]);
}

#[tokio::test]
async fn test_write_row_frame() {
    // 写请求与读请求命令码相同，服务端只能按帧长区分，
    // 这里的 mock 专门按 17 字节解析
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle: JoinHandle<(u32, u32, u32, u32)> = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut frame = [0u8; 17];
        socket.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame[0], CMD_READ);

        let address = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let bus_clk = u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
        let lsb = u32::from_le_bytes([frame[9], frame[10], frame[11], frame[12]]);
        let msb = u32::from_le_bytes([frame[13], frame[14], frame[15], frame[16]]);

        let row = MockRow { lsb, msb, error: 0 };
        socket
            .write_all(&response_frame(CMD_READ, address, row))
            .await
            .unwrap();
        (address, bus_clk, lsb, msb)
    });

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let result = client
        .write_row(&mut stream, 0xFC4B8440, 0x12345678, 0x9ABCDEF0, 19_200)
        .await
        .unwrap();
    assert!(!result.is_error());
    assert_eq!(result.lsb, 0x12345678);

    let (address, bus_clk, lsb, msb) = handle.await.unwrap();
    assert_eq!(address, 0xFC4B8440);
    assert_eq!(bus_clk, 19_200);
    assert_eq!(lsb, 0x12345678);
    assert_eq!(msb, 0x9ABCDEF0);
}

#[tokio::test]
async fn test_recv_timeout() {
    // 服务端收下请求但从不响应
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 9];
        let _ = socket.read_exact(&mut buf).await;
        // 挂住连接直到测试结束
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    });

    let client = QfpromClient::new(ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs: 1,
    });
    let mut stream = client.connect().await.unwrap();

    let err = client.read_row(&mut stream, 0xFC4B80A0, false).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
}

#[tokio::test]
async fn test_partial_response_is_malformed() {
    // 服务端只回 10 字节就关闭连接
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 9];
        socket.read_exact(&mut buf).await.unwrap();
        socket.write_all(&[0u8; 10]).await.unwrap();
    });

    let client = client_for(addr);
    let mut stream = client.connect().await.unwrap();

    let err = client.read_row(&mut stream, 0xFC4B80A0, false).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(qfprom_client::ProtocolError::MalformedResponse { need: 21, got: 10 })
    ));
}
