//! Telnet 資料流解碼器
//!
//! 位元組驅動的狀態機：以任意大小的分塊餵入原始資料，輸出文字片段、
//! 選項協商命令與子協商內容。狀態跨 `feed` 呼叫保留，被切斷在分塊
//! 邊界的序列會在後續輸入到齊時繼續解析，不會遺失或重複任何位元組。

use tracing::{debug, warn};

use super::protocol::{TelnetCommand, TelnetOption, IAC};

/// 解碼器輸出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// 純文字片段
    ///
    /// `prompt` 為真表示伺服器以 Go-Ahead 示意此片段是提示字元，
    /// 上層應立即送出而不等換行
    Text { bytes: Vec<u8>, prompt: bool },
    /// 選項協商命令（WILL/WONT/DO/DONT + 選項）
    Negotiation(TelnetCommand, TelnetOption),
    /// 完整的子協商內容；首位元組為通道選項碼，其後為原始 payload
    Subnegotiation(Vec<u8>),
}

/// 解碼器狀態，各狀態攜帶自己的累積緩衝
#[derive(Debug, Clone, PartialEq)]
enum DecoderState {
    /// 一般文字
    Normal,
    /// 已讀入 IAC，等待命令位元組
    Iac,
    /// 已讀入 IAC WILL/WONT/DO/DONT，等待選項位元組
    Negotiating(TelnetCommand),
    /// 已讀入 IAC SB，等待子協商的選項位元組
    SubnegOption,
    /// GMCP 子協商中；payload 以選項碼開頭，`iac` 表示前一位元組為 IAC
    GmcpSubneg { payload: Vec<u8>, iac: bool },
    /// 未知選項的子協商，內容全數丟棄直到 IAC SE
    UnknownSubneg { iac: bool },
}

/// Telnet 資料流解碼器
pub struct TelnetDecoder {
    state: DecoderState,
    /// 累積中的純文字位元組
    text: Vec<u8>,
    /// 視為 GMCP 通道的選項碼（部分伺服器以非標準選項碼傳送同樣內容）
    gmcp_options: Vec<u8>,
}

impl TelnetDecoder {
    /// 創建解碼器，指定視為 GMCP 通道的選項碼
    pub fn new(gmcp_options: Vec<u8>) -> Self {
        Self {
            state: DecoderState::Normal,
            text: Vec::new(),
            gmcp_options,
        }
    }

    /// 清除所有解析狀態（重新連線時使用）
    pub fn reset(&mut self) {
        self.state = DecoderState::Normal;
        self.text.clear();
    }

    /// 是否沒有滯留中的協定序列
    ///
    /// 為真表示上一次 `feed` 的所有位元組都已解析完畢，
    /// 沒有被分塊邊界切斷、等待後續輸入的命令或子協商
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DecoderState::Normal)
    }

    /// 餵入一段原始位元組，返回解析出的事件序列
    ///
    /// 呼叫結束時累積中的文字會以片段送出；行的組裝交由上層處理，
    /// 因此片段的切分方式不影響串接後的內容
    pub fn feed(&mut self, input: &[u8]) -> Vec<DecodedEvent> {
        let mut events = Vec::new();
        for &byte in input {
            self.step(byte, &mut events);
        }
        self.flush_text(&mut events);
        events
    }

    /// 處理單一位元組的狀態轉移
    fn step(&mut self, byte: u8, events: &mut Vec<DecodedEvent>) {
        match &mut self.state {
            DecoderState::Normal => {
                if byte == IAC {
                    self.state = DecoderState::Iac;
                } else {
                    self.text.push(byte);
                }
            }
            DecoderState::Iac => self.step_command(byte, events),
            DecoderState::Negotiating(cmd) => {
                let cmd = *cmd;
                let option = TelnetOption::from_byte(byte);
                self.flush_text(events);
                events.push(DecodedEvent::Negotiation(cmd, option));
                self.state = DecoderState::Normal;
            }
            DecoderState::SubnegOption => {
                if self.gmcp_options.contains(&byte) {
                    // 選項碼一併保留在 payload 開頭，讓上層知道內容來自哪個通道
                    self.state = DecoderState::GmcpSubneg {
                        payload: vec![byte],
                        iac: false,
                    };
                } else {
                    debug!("忽略未支援的子協商選項 {}，內容將被丟棄", byte);
                    self.state = DecoderState::UnknownSubneg { iac: false };
                }
            }
            DecoderState::GmcpSubneg { payload, iac } => {
                if *iac {
                    if byte == TelnetCommand::Se as u8 {
                        let payload = std::mem::take(payload);
                        self.flush_text(events);
                        events.push(DecodedEvent::Subnegotiation(payload));
                        self.state = DecoderState::Normal;
                    } else {
                        // IAC 後面不是 SE：IAC 本身是字面位元組，
                        // 後面這個位元組獨立重新判斷
                        payload.push(IAC);
                        if byte == IAC {
                            *iac = true;
                        } else {
                            payload.push(byte);
                            *iac = false;
                        }
                    }
                } else if byte == IAC {
                    *iac = true;
                } else {
                    payload.push(byte);
                }
            }
            DecoderState::UnknownSubneg { iac } => {
                if *iac {
                    if byte == TelnetCommand::Se as u8 {
                        self.state = DecoderState::Normal;
                    } else {
                        *iac = byte == IAC;
                    }
                } else if byte == IAC {
                    *iac = true;
                }
            }
        }
    }

    /// 處理 IAC 之後的命令位元組
    fn step_command(&mut self, byte: u8, events: &mut Vec<DecodedEvent>) {
        if byte == IAC {
            // IAC IAC = 轉義的字面 0xFF
            self.text.push(IAC);
            self.state = DecoderState::Normal;
            return;
        }

        match TelnetCommand::from_byte(byte) {
            Some(cmd) if cmd.is_negotiation() => {
                self.state = DecoderState::Negotiating(cmd);
            }
            Some(TelnetCommand::Sb) => {
                self.state = DecoderState::SubnegOption;
            }
            Some(TelnetCommand::Se) => {
                warn!("收到不在子協商中的 IAC SE，忽略");
                self.state = DecoderState::Normal;
            }
            Some(TelnetCommand::GoAhead) => {
                self.flush_prompt(events);
                self.state = DecoderState::Normal;
            }
            Some(TelnetCommand::Nop) => {
                self.flush_text(events);
                self.state = DecoderState::Normal;
            }
            Some(cmd) => {
                debug!("忽略單位元組命令 {:?}", cmd);
                self.state = DecoderState::Normal;
            }
            None => {
                warn!("IAC 後接未定義的位元組 {}，回復一般狀態", byte);
                self.state = DecoderState::Normal;
            }
        }
    }

    /// 送出累積中的文字片段（若有）
    fn flush_text(&mut self, events: &mut Vec<DecodedEvent>) {
        if !self.text.is_empty() {
            let bytes = std::mem::take(&mut self.text);
            events.push(DecodedEvent::Text {
                bytes,
                prompt: false,
            });
        }
    }

    /// Go-Ahead 觸發的 flush
    ///
    /// 未以換行結尾的文字標記為提示字元；沒有累積文字時仍送出空事件，
    /// 作為上層立即清空部分行的信號
    fn flush_prompt(&mut self, events: &mut Vec<DecodedEvent>) {
        let bytes = std::mem::take(&mut self.text);
        let prompt = !bytes.ends_with(b"\n");
        events.push(DecodedEvent::Text { bytes, prompt });
    }
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self::new(vec![TelnetOption::Gmcp.as_byte()])
    }
}
