//! Telnet 協定層
//!
//! - `protocol`: 命令/選項常數與固定的協商策略
//! - `decoder`: 位元組流狀態機
//! - `client`: 非同步連線會話與讀取迴圈

pub mod client;
pub mod decoder;
pub mod protocol;

pub use client::{
    ConnectionState, SessionEvent, SessionWriter, TelnetConfig, TelnetError, TelnetSession,
};
pub use decoder::{DecodedEvent, TelnetDecoder};
