//! 原始位元組側錄
//!
//! 協定除錯用：把 socket 讀寫的原始位元組以十六進位傾印到檔案。
//! 未呼叫 `init` 時所有記錄都是 no-op。

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

lazy_static::lazy_static! {
    static ref WIRE_TAP: Mutex<Option<File>> = Mutex::new(None);
}

pub struct WireTap;

impl WireTap {
    /// 開啟側錄檔
    pub fn init(path: PathBuf) {
        if let Ok(file) = File::create(path) {
            *WIRE_TAP.lock().unwrap() = Some(file);
        }
    }

    /// 記錄一段原始位元組；direction 慣例為 "RX"/"TX"
    pub fn record(direction: &str, bytes: &[u8]) {
        let mut guard = WIRE_TAP.lock().unwrap();
        if let Some(file) = guard.as_mut() {
            let hex = bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                file,
                "[{}] {} ({} bytes): [{}]",
                unix_now(),
                direction,
                bytes.len(),
                hex
            );
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
