//! 命令別名模組
//!
//! 把使用者輸入展開為完整命令。比對採兩段式：整句完全相符優先，
//! 其次取第一個空白之前的命令詞比對，其餘參數原樣接回。
//! 展開結果不再回頭查表（不做遞迴展開）。

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

/// 別名持久化錯誤
#[derive(Debug, Error)]
pub enum AliasStoreError {
    #[error("IO 錯誤: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 格式錯誤: {0}")]
    Json(#[from] serde_json::Error),
}

/// 別名表的持久化介面
pub trait AliasStore: Send {
    /// 載入整份別名表
    fn load(&self) -> Result<HashMap<String, String>, AliasStoreError>;

    /// 覆寫整份別名表
    fn save(&self, aliases: &HashMap<String, String>) -> Result<(), AliasStoreError>;
}

/// 以 JSON 檔案儲存別名表（命令 -> 展開內容的扁平物件）
pub struct JsonAliasStore {
    path: PathBuf,
}

impl JsonAliasStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AliasStore for JsonAliasStore {
    fn load(&self) -> Result<HashMap<String, String>, AliasStoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, aliases: &HashMap<String, String>) -> Result<(), AliasStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(aliases)?)?;
        Ok(())
    }
}

/// 別名表
///
/// 鍵為大小寫敏感的命令字串。每次新增/移除都立即寫回持久化後端；
/// 寫入失敗只記錄，記憶體中的內容仍是本次連線期間的權威版本。
#[derive(Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    store: Option<Box<dyn AliasStore>>,
}

impl AliasTable {
    /// 創建不帶持久化的別名表
    pub fn new() -> Self {
        Self::default()
    }

    /// 附加持久化後端並載入既有內容；載入失敗時以空表開始
    pub fn with_store(store: impl AliasStore + 'static) -> Self {
        let aliases = match store.load() {
            Ok(aliases) => {
                info!("已載入 {} 筆別名", aliases.len());
                aliases
            }
            Err(e) => {
                warn!("別名載入失敗，以空表開始: {}", e);
                HashMap::new()
            }
        };
        Self {
            aliases,
            store: Some(Box::new(store)),
        }
    }

    /// 新增或更新別名；命令與內容皆不可為空
    pub fn add(&mut self, command: impl Into<String>, replacement: impl Into<String>) -> bool {
        let command = command.into();
        let replacement = replacement.into();
        if command.is_empty() || replacement.is_empty() {
            warn!("別名的命令與展開內容皆不可為空");
            return false;
        }
        self.aliases.insert(command, replacement);
        self.persist();
        true
    }

    /// 移除別名；不存在時返回 false
    pub fn remove(&mut self, command: &str) -> bool {
        if self.aliases.remove(command).is_some() {
            self.persist();
            true
        } else {
            false
        }
    }

    /// 查詢單一別名
    pub fn get(&self, command: &str) -> Option<&str> {
        self.aliases.get(command).map(String::as_str)
    }

    /// 目前所有別名
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// 展開輸入
    ///
    /// 1. 空輸入維持空
    /// 2. 整句完全相符，直接取代
    /// 3. 第一個空白前的命令詞相符，其餘參數接在展開內容之後
    /// 4. 都不相符則原樣返回
    pub fn expand(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        if let Some(replacement) = self.aliases.get(input) {
            return replacement.clone();
        }

        let (command, args) = match input.split_once(' ') {
            Some((command, args)) => (command, args),
            None => (input, ""),
        };

        match self.aliases.get(command) {
            Some(replacement) if !args.is_empty() => format!("{} {}", replacement, args),
            Some(replacement) => replacement.clone(),
            None => input.to_owned(),
        }
    }

    /// 立即寫回持久化後端；失敗只記錄，不影響記憶體中的別名表
    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.aliases) {
                warn!("別名儲存失敗: {}", e);
            }
        }
    }
}
