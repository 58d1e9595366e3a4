//! MUD 客戶端協定核心
//!
//! 把任意切分的原始位元組流轉換成三類輸出：
//! - 帶樣式的顯示文字（`telnet::decoder` -> `line` -> `ansi`）
//! - 結構化的 GMCP 帶外訊息（`gmcp`）
//! - 回寫給伺服器的協商回覆
//!
//! 出站方向由 `alias` 把使用者命令展開後經寫入鎖送出。
//!
//! 模組一覽：
//! - `telnet`: Telnet 協定解碼、協商與連線會話
//! - `gmcp`: GMCP 編解碼與訊息分發
//! - `line`: 文字片段的行組裝與提示字元送出
//! - `ansi`: ANSI/SGR 樣式解析
//! - `alias`: 命令別名展開與持久化
//! - `encoding`: 寬容文字解碼
//! - `debug_log`: 原始位元組側錄

pub mod alias;
pub mod ansi;
pub mod debug_log;
pub mod encoding;
pub mod gmcp;
pub mod line;
pub mod telnet;

pub use alias::{AliasStore, AliasTable, JsonAliasStore};
pub use ansi::{AnsiColor, AnsiInterpreter, StyledSpan, TextStyle};
pub use gmcp::{GmcpMessage, GmcpRegistry, ListenerId};
pub use line::{AssembledLine, LineAssembler};
pub use telnet::{
    ConnectionState, SessionEvent, SessionWriter, TelnetConfig, TelnetError, TelnetSession,
};
