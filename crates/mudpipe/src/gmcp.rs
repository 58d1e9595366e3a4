//! GMCP (Generic MUD Communication Protocol) 編解碼與訊息分發
//!
//! GMCP 內容由 Telnet 子協商攜帶：`IAC SB <選項> <套件名稱> <JSON> IAC SE`。
//! 這裡負責 payload 與 `GmcpMessage` 之間的轉換、出站框架的組裝，
//! 以及訂閱者的註冊與分發。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::encoding::decode_permissive;
use crate::telnet::protocol::{TelnetCommand, IAC};

/// 能力宣告使用的套件名稱
pub const SUPPORTS_PACKAGE: &str = "Client.Core.Supports";

/// 一則已解碼的 GMCP 訊息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmcpMessage {
    /// 套件名稱（以點分隔，如 `Char.Vitals`）
    pub package: String,
    /// JSON 內容；內文缺漏或解析失敗時為空物件
    pub value: Value,
}

/// 解碼 GMCP payload（子協商選項碼之後的部分）
///
/// 第一個空白之前是套件名稱，其餘內容視為 JSON。解析失敗不中斷管線：
/// 記錄原文後以空物件代替，訂閱者照常收到訊息。
pub fn decode(payload: &[u8]) -> GmcpMessage {
    let text = decode_permissive(payload);
    let text = text.trim();

    let (package, body) = match text.find(' ') {
        Some(pos) => (&text[..pos], text[pos + 1..].trim()),
        None => (text, ""),
    };

    let value = if body.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("GMCP JSON 解析失敗 ({}): {} — 原文: {}", package, e, body);
                Value::Object(Map::new())
            }
        }
    };

    GmcpMessage {
        package: package.to_owned(),
        value,
    }
}

/// 編碼 GMCP payload：`<套件名稱> <緊湊 JSON>`
pub fn encode(package: &str, value: &Value) -> Vec<u8> {
    format!("{} {}", package, value).into_bytes()
}

/// 以子協商框架包裝 payload，結果可直接寫入 socket
pub fn frame(option: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&[IAC, TelnetCommand::Sb as u8, option]);
    out.extend_from_slice(payload);
    out.extend_from_slice(&[IAC, TelnetCommand::Se as u8]);
    out
}

/// 組出能力宣告的內容：模組名稱 -> 支援的版本字串列表
pub fn supports_value(packages: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (name, version) in packages {
        map.insert(
            name.clone(),
            Value::Array(vec![Value::String(version.clone())]),
        );
    }
    Value::Object(map)
}

/// 訂閱識別碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type GmcpListener = Arc<dyn Fn(&GmcpMessage) + Send + Sync>;

/// GMCP 訊息分發器
///
/// 由連線的管理方持有。分發時疊代訂閱清單的快照，
/// 因此訂閱者可以在 callback 內安全地再訂閱或退訂。
pub struct GmcpRegistry {
    listeners: Mutex<Vec<(u64, GmcpListener)>>,
    next_id: AtomicU64,
}

impl GmcpRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 註冊訂閱者，所有訊息（不分套件）都會送達
    pub fn subscribe(
        &self,
        listener: impl Fn(&GmcpMessage) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, Arc::new(listener)));
        ListenerId(id)
    }

    /// 退訂；識別碼不存在時返回 false
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id.0);
        listeners.len() != before
    }

    /// 目前的訂閱者數量
    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把訊息送達所有訂閱者
    ///
    /// 每次呼叫彼此隔離：單一訂閱者 panic 只記錄錯誤，
    /// 不影響其餘訂閱者收到訊息
    pub fn dispatch(&self, message: &GmcpMessage) {
        let snapshot: Vec<(u64, GmcpListener)> = self.listeners.lock().unwrap().clone();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                error!("GMCP 訂閱者 #{} 處理 {} 時 panic，已略過", id, message.package);
            }
        }
    }
}

impl Default for GmcpRegistry {
    fn default() -> Self {
        Self::new()
    }
}
