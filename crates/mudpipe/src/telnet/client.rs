//! Telnet 連線會話
//!
//! 每條連線由一個專屬的讀取任務負責：帶逾時的 read 迴圈把位元組餵進
//! 解碼器，文字經行組裝與 ANSI 解析後以事件送往呈現端的 channel，
//! 協商回覆與 GMCP 宣告經單一寫入鎖回寫 socket。關閉連線會讓
//! 讀取立即返回錯誤，任務隨之結束並丟棄所有解析狀態。

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::decoder::{DecodedEvent, TelnetDecoder};
use super::protocol::{negotiation_reply, TelnetCommand, TelnetOption};
use crate::alias::AliasTable;
use crate::ansi::{AnsiInterpreter, StyledSpan};
use crate::debug_log::WireTap;
use crate::gmcp::{self, GmcpMessage};
use crate::line::{AssembledLine, LineAssembler};

/// Telnet 會話錯誤
#[derive(Debug, Error)]
pub enum TelnetError {
    #[error("連線失敗: {0}")]
    ConnectionFailed(#[from] io::Error),

    #[error("連線逾時")]
    Timeout,

    #[error("未連線")]
    NotConnected,

    #[error("DNS 解析失敗: {0}")]
    DnsResolutionFailed(String),
}

/// 連線狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Telnet 會話配置
#[derive(Debug, Clone)]
pub struct TelnetConfig {
    /// 連線逾時
    pub connect_timeout: Duration,
    /// 讀取緩衝區大小
    pub read_buffer_size: usize,
    /// 讀取輪詢間隔；超過此時間沒有新資料時，未完成的行以提示字元送出
    pub poll_interval: Duration,
    /// 視為 GMCP 通道的 Telnet 選項碼
    pub gmcp_options: Vec<u8>,
    /// GMCP 能力宣告的（模組, 版本）列表
    pub supported_packages: Vec<(String, String)>,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_buffer_size: 8192,
            poll_interval: Duration::from_millis(200),
            gmcp_options: vec![TelnetOption::Gmcp.as_byte()],
            supported_packages: vec![("Char.Vitals".to_string(), "1".to_string())],
        }
    }
}

/// 讀取任務送往呈現端的事件
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// 一行已組裝並解析樣式的文字；`prompt` 表示是被提前送出的提示字元
    Line { spans: Vec<StyledSpan>, prompt: bool },
    /// 已解碼的 GMCP 訊息；由消費端交給 `GmcpRegistry` 分發
    Gmcp(GmcpMessage),
    /// 連線已結束
    Disconnected(String),
}

/// 會話的寫入把手
///
/// 所有 socket 寫入（使用者命令、協商回覆、GMCP 發送）都經過
/// 同一把鎖，確保不同來源的框架不會在線路上交錯。
#[derive(Clone)]
pub struct SessionWriter {
    inner: Arc<Mutex<OwnedWriteHalf>>,
}

impl SessionWriter {
    /// 寫入原始位元組
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<(), TelnetError> {
        let mut writer = self.inner.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        WireTap::record("TX", bytes);
        Ok(())
    }

    /// 送出一行文字（UTF-8 編碼並補上 CRLF）
    pub async fn send_line(&self, text: &str) -> Result<(), TelnetError> {
        let mut data = text.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        self.send_raw(&data).await?;
        debug!("已發送: {}", text);
        Ok(())
    }

    /// 先經別名表展開再送出使用者命令
    pub async fn send_command(
        &self,
        input: &str,
        aliases: &AliasTable,
    ) -> Result<(), TelnetError> {
        self.send_line(&aliases.expand(input)).await
    }

    /// 送出一則 GMCP 訊息
    pub async fn send_gmcp(
        &self,
        option: u8,
        package: &str,
        value: &serde_json::Value,
    ) -> Result<(), TelnetError> {
        let payload = gmcp::encode(package, value);
        self.send_raw(&gmcp::frame(option, &payload)).await
    }
}

/// Telnet 會話
///
/// 擁有解碼管線的全部狀態。`connect` 之後把會話交給
/// `start_read_loop` 消耗；關閉用 shutdown channel 通知。
pub struct TelnetSession {
    config: TelnetConfig,
    state: ConnectionState,
    reader: Option<OwnedReadHalf>,
    writer: Option<SessionWriter>,
    decoder: TelnetDecoder,
    assembler: LineAssembler,
    interpreter: AnsiInterpreter,
    gmcp_announced: bool,
}

impl TelnetSession {
    /// 創建新的會話
    pub fn new(config: TelnetConfig) -> Self {
        let decoder = TelnetDecoder::new(config.gmcp_options.clone());
        Self {
            config,
            state: ConnectionState::Disconnected,
            reader: None,
            writer: None,
            decoder,
            assembler: LineAssembler::new(),
            interpreter: AnsiInterpreter::new(),
            gmcp_announced: false,
        }
    }

    /// 獲取連線狀態
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// 寫入把手；可在會話交給讀取迴圈之前 clone 出去給輸入端使用
    pub fn writer(&self) -> Option<SessionWriter> {
        self.writer.clone()
    }

    /// 連線到 MUD 伺服器
    ///
    /// 連線成功時清空解碼器、行緩衝與樣式暫存器，
    /// 前一條連線的殘留狀態不會滲進新連線。
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), TelnetError> {
        self.state = ConnectionState::Connecting;
        info!("正在連線到 {}:{}", host, port);

        let addr = format!("{}:{}", host, port);
        let socket_addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| TelnetError::DnsResolutionFailed(e.to_string()))?
            .collect();

        if socket_addrs.is_empty() {
            self.state = ConnectionState::Disconnected;
            return Err(TelnetError::DnsResolutionFailed(format!(
                "無法解析主機: {}",
                host
            )));
        }

        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(&socket_addrs[0]),
        )
        .await
        .map_err(|_| TelnetError::Timeout)?
        .map_err(TelnetError::ConnectionFailed)?;

        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        self.reader = Some(read_half);
        self.writer = Some(SessionWriter {
            inner: Arc::new(Mutex::new(write_half)),
        });

        self.decoder.reset();
        self.assembler.reset();
        self.interpreter.reset();
        self.gmcp_announced = false;
        self.state = ConnectionState::Connected;

        info!("已連線到 {}:{}", host, port);
        Ok(())
    }

    /// 斷開連線並丟棄解析狀態
    pub async fn disconnect(&mut self) {
        self.reader = None;
        self.writer = None;
        self.state = ConnectionState::Disconnected;
        info!("已斷開連線");
    }

    /// 啟動讀取迴圈，事件送往 `tx`，直到連線結束或收到關閉信號
    pub async fn start_read_loop(
        mut self,
        tx: mpsc::Sender<SessionEvent>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        let mut reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                error!("讀取迴圈啟動失敗：尚未連線");
                let _ = tx.send(SessionEvent::Disconnected("尚未連線".to_string())).await;
                return;
            }
        };

        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut reason: Option<String> = None;

        loop {
            tokio::select! {
                result = timeout(self.config.poll_interval, reader.read(&mut buf)) => {
                    match result {
                        // 閒置逾時：殘留的部分行視為提示字元送出
                        Err(_) => {
                            if let Some(line) = self.assembler.take_partial() {
                                if self.emit_line(&tx, line).await.is_err() {
                                    warn!("接收端已關閉");
                                    break;
                                }
                            }
                        }
                        Ok(Ok(0)) => {
                            info!("伺服器關閉連線");
                            reason = Some("伺服器關閉連線".to_string());
                            break;
                        }
                        Ok(Ok(n)) => {
                            if self.process_input(&buf[..n], &tx).await.is_err() {
                                warn!("接收端已關閉");
                                break;
                            }
                        }
                        Ok(Err(e)) => {
                            error!("讀取錯誤: {}", e);
                            reason = Some(format!("讀取錯誤: {}", e));
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("收到關閉信號");
                    break;
                }
            }
        }

        // 連線結束：緩衝中的部分行作為最後一個顯示單位送出
        if let Some(line) = self.assembler.take_partial() {
            let _ = self.emit_line(&tx, line).await;
        }
        if let Some(reason) = reason {
            let _ = tx.send(SessionEvent::Disconnected(reason)).await;
        }

        self.disconnect().await;
    }

    /// 把一次 read 的位元組餵進解碼器並處理所有事件
    async fn process_input(
        &mut self,
        bytes: &[u8],
        tx: &mpsc::Sender<SessionEvent>,
    ) -> Result<(), SendError<SessionEvent>> {
        WireTap::record("RX", bytes);

        let events = self.decoder.feed(bytes);
        for event in events {
            match event {
                DecodedEvent::Negotiation(cmd, option) => {
                    self.handle_negotiation(cmd, option).await;
                }
                DecodedEvent::Subnegotiation(payload) => {
                    // 首位元組是通道選項碼，之後才是 GMCP 內文
                    if let Some((option, body)) = payload.split_first() {
                        let message = gmcp::decode(body);
                        debug!("GMCP({}) <- {}", option, message.package);
                        tx.send(SessionEvent::Gmcp(message)).await?;
                    }
                }
                DecodedEvent::Text { bytes, prompt } => {
                    for line in self.assembler.push(&bytes, prompt) {
                        self.emit_line(tx, line).await?;
                    }
                }
            }
        }

        // 解碼器已無滯留位元組時，殘留的部分行立即視為提示字元。
        // 線路協定沒有可靠的提示字元信號，封包背靠背抵達時
        // 這個近似可能提前切行。
        if self.decoder.is_idle() {
            if let Some(line) = self.assembler.take_partial() {
                self.emit_line(tx, line).await?;
            }
        }

        Ok(())
    }

    /// 解析樣式並送出一個顯示單位
    async fn emit_line(
        &mut self,
        tx: &mpsc::Sender<SessionEvent>,
        line: AssembledLine,
    ) -> Result<(), SendError<SessionEvent>> {
        let spans = self.interpreter.interpret(&line.text);
        tx.send(SessionEvent::Line {
            spans,
            prompt: line.prompt,
        })
        .await
    }

    /// 處理選項協商：依固定策略回覆，必要時送出 GMCP 能力宣告
    async fn handle_negotiation(&mut self, cmd: TelnetCommand, option: TelnetOption) {
        let writer = match &self.writer {
            Some(writer) => writer.clone(),
            None => return,
        };

        match negotiation_reply(cmd, option, &self.config.gmcp_options) {
            Some(reply) => {
                debug!("協商 {:?} {:?}，回覆 {:02X?}", cmd, option, reply);
                if let Err(e) = writer.send_raw(&reply).await {
                    warn!("協商回覆寫入失敗: {}", e);
                    return;
                }

                // 伺服器宣告 GMCP 後，宣告客戶端支援的模組（僅一次）
                if cmd == TelnetCommand::Will
                    && self.config.gmcp_options.contains(&option.as_byte())
                    && !self.gmcp_announced
                {
                    self.gmcp_announced = true;
                    self.announce_supports(&writer, option.as_byte()).await;
                }
            }
            None => {
                debug!("不回應的選項協商: {:?} {:?}", cmd, option);
            }
        }
    }

    /// 送出 GMCP 能力宣告
    async fn announce_supports(&self, writer: &SessionWriter, option: u8) {
        if self.config.supported_packages.is_empty() {
            return;
        }
        let value = gmcp::supports_value(&self.config.supported_packages);
        if let Err(e) = writer
            .send_gmcp(option, gmcp::SUPPORTS_PACKAGE, &value)
            .await
        {
            warn!("GMCP 能力宣告發送失敗: {}", e);
        }
    }
}
