//! MSM8974 QFPROM 行地址表
//!
//! 原始表取自芯片 HWIO 头文件，按书写顺序保存为 JSON 并在编译期
//! 嵌入；也可通过 `--catalog` 从外部 JSON 加载。地址一律当作不透明
//! 的 32 位键，除查表与十六进制格式化外不做任何运算。
//!
//! 已知的数据质量问题按原表保留：
//! - raw 表 `CUST_KEY_ROWn_LSB_ADDR(2)` 与 `SERIAL_NUM_LSB_ADDR`
//!   共用地址 0xFC4B81F0（corrected 表同样在 0xFC4BC1F0），加载时
//!   只告警不去重；
//! - corrected 表 SPARE_REG29/30/31 各有三条同名条目，按键覆盖语义
//!   保留最后定义的地址。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// 三个 customer-key 行的 LSB 地址。主读报错时服务端没有对应的
/// 直读路径，扫描对这几行不做直读回退。
pub const CUST_KEY_SKIP_ADDRS: [u32; 3] = [0xFC4B81E0, 0xFC4B81E8, 0xFC4B81F0];

/// 地址是否属于 customer-key 行
pub fn is_cust_key_row(address: u32) -> bool {
    CUST_KEY_SKIP_ADDRS.contains(&address)
}

/// 行类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Raw,
    Corrected,
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Raw => write!(f, "RAW"),
            RowKind::Corrected => write!(f, "CORRECTED"),
        }
    }
}

/// 单条行表条目（JSON 格式，地址支持十六进制字符串如 "0xFC4B8000"）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowEntry {
    pub name: String,
    #[serde(deserialize_with = "deserialize_hex_or_int")]
    pub address: u32,
}

/// 自定义反序列化：支持整数或十六进制字符串
fn deserialize_hex_or_int<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(v) => Ok(v),
        HexOrInt::Str(s) => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("0X") {
                u32::from_str_radix(&s[2..], 16).map_err(D::Error::custom)
            } else {
                s.parse::<u32>().map_err(D::Error::custom)
            }
        }
    }
}

/// 行地址表，raw 与 corrected 两类分开存放，保持书写顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCatalog {
    /// 表名称
    #[serde(default)]
    pub name: String,

    /// raw 行
    pub raw: Vec<RowEntry>,

    /// corrected 行
    pub corrected: Vec<RowEntry>,
}

/// 编译时嵌入的默认行表
const DEFAULT_CATALOG_JSON: &str = include_str!("../rows_msm8974.json");

impl Default for RowCatalog {
    fn default() -> Self {
        // 编译时嵌入的 JSON（解析失败会 panic）
        serde_json::from_str::<RowCatalog>(DEFAULT_CATALOG_JSON)
            .expect("Failed to parse embedded rows_msm8974.json")
            .normalized()
    }
}

impl RowCatalog {
    /// 从 JSON 文件加载行表
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let catalog: RowCatalog = serde_json::from_str(&content)?;

        if catalog.raw.is_empty() && catalog.corrected.is_empty() {
            anyhow::bail!("catalog has no entries");
        }

        Ok(catalog.normalized())
    }

    /// 取某一类别的条目
    pub fn entries(&self, kind: RowKind) -> &[RowEntry] {
        match kind {
            RowKind::Raw => &self.raw,
            RowKind::Corrected => &self.corrected,
        }
    }

    /// 同名条目按键覆盖语义收敛（保留最后定义的地址），
    /// 重复地址只告警、不去重
    fn normalized(mut self) -> Self {
        self.raw = dedup_by_name(self.raw, "raw");
        self.corrected = dedup_by_name(self.corrected, "corrected");
        warn_duplicate_addresses(&self.raw, "raw");
        warn_duplicate_addresses(&self.corrected, "corrected");
        self
    }
}

fn dedup_by_name(entries: Vec<RowEntry>, table: &str) -> Vec<RowEntry> {
    let mut out: Vec<RowEntry> = Vec::with_capacity(entries.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        match index.get(&entry.name).copied() {
            Some(i) => {
                warn!(
                    "{} table: duplicate entry '{}', keeping last address 0x{:08X} (was 0x{:08X})",
                    table, entry.name, entry.address, out[i].address
                );
                out[i].address = entry.address;
            }
            None => {
                index.insert(entry.name.clone(), out.len());
                out.push(entry);
            }
        }
    }

    out
}

fn warn_duplicate_addresses(entries: &[RowEntry], table: &str) {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for entry in entries {
        if let Some(prev) = seen.insert(entry.address, entry.name.as_str()) {
            warn!(
                "{} table: address 0x{:08X} shared by '{}' and '{}'",
                table, entry.address, prev, entry.name
            );
        }
    }
}
