//! 读取单个熔丝行的简单示例
//!
//! 运行: cargo run --example read_row -- -H 192.168.1.100

use qfprom_client::{ClientConfig, QfpromClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 配置客户端
    let config = ClientConfig {
        host: std::env::args()
            .skip_while(|a| a != "-H")
            .nth(1)
            .unwrap_or_else(|| "192.168.1.100".to_string()),
        port: 5000,
        timeout_secs: 5,
    };

    println!("Connecting to {}:{}", config.host, config.port);

    let client = QfpromClient::new(config);
    let mut stream = client.connect().await?;

    // 读 JTAG ID 行（raw）
    let row = client.read_row(&mut stream, 0xFC4B80A0, false).await?;
    if row.is_error() {
        println!("Error reading 0x{:08X} - {}", row.address, row.error);
    } else {
        println!(
            "Row data for 0x{:08X} - LSB: 0x{:08X} MSB: 0x{:08X}",
            row.address, row.lsb, row.msb
        );
    }

    // 同一行再直读一次做对比
    let direct = client.read_row_direct(&mut stream, 0xFC4B80A0).await?;
    println!(
        "Direct Read Row data for 0x{:08X} - LSB: 0x{:08X} MSB: 0x{:08X}",
        direct.address, direct.lsb, direct.msb
    );

    println!("Disconnecting");
    client.disconnect(&mut stream).await?;

    Ok(())
}
