//! ANSI/SGR 文字樣式解析模組
//!
//! 解析 MUD 伺服器輸出中的 SGR 轉義序列（`ESC [ 參數 m`），
//! 維護一個跨行存續的樣式暫存器，把文字切成帶樣式快照的 span。
//! 這裡只做分類與切分，不負責任何實際繪製。

use tracing::debug;

/// 跨呼叫暫存的未完成轉義序列長度上限，超過即視為雜訊丟棄
const MAX_PENDING_ESCAPE: usize = 64;

/// 16 色 ANSI 色票
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl AnsiColor {
    /// 從 SGR 色碼的個位數（0-7）取得顏色
    fn from_index(index: u8, bright: bool) -> Option<Self> {
        let color = match (index, bright) {
            (0, false) => Self::Black,
            (1, false) => Self::Red,
            (2, false) => Self::Green,
            (3, false) => Self::Yellow,
            (4, false) => Self::Blue,
            (5, false) => Self::Magenta,
            (6, false) => Self::Cyan,
            (7, false) => Self::White,
            (0, true) => Self::BrightBlack,
            (1, true) => Self::BrightRed,
            (2, true) => Self::BrightGreen,
            (3, true) => Self::BrightYellow,
            (4, true) => Self::BrightBlue,
            (5, true) => Self::BrightMagenta,
            (6, true) => Self::BrightCyan,
            (7, true) => Self::BrightWhite,
            _ => return None,
        };
        Some(color)
    }
}

/// 目前的文字樣式；`None` 表示終端機預設色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub fg: Option<AnsiColor>,
    pub bg: Option<AnsiColor>,
    pub bold: bool,
    pub underline: bool,
}

impl TextStyle {
    /// 是否為預設樣式
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// 依序套用一串 SGR 參數碼
    fn apply_codes(&mut self, codes: &[u16]) {
        for &code in codes {
            match code {
                0 => *self = Self::default(),
                1 => self.bold = true,
                22 => self.bold = false,
                4 => self.underline = true,
                24 => self.underline = false,
                30..=37 => self.fg = AnsiColor::from_index((code - 30) as u8, false),
                90..=97 => self.fg = AnsiColor::from_index((code - 90) as u8, true),
                39 => self.fg = None,
                40..=47 => self.bg = AnsiColor::from_index((code - 40) as u8, false),
                100..=107 => self.bg = AnsiColor::from_index((code - 100) as u8, true),
                49 => self.bg = None,
                // 不支援的 SGR 碼（閃爍、反白、256 色等）靜默忽略
                _ => {}
            }
        }
    }
}

/// 帶樣式快照的文字片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: TextStyle,
}

/// 轉義序列掃描結果
enum Scan {
    /// SGR 序列，攜帶消耗的字元數與參數
    Sgr(usize, Vec<u16>),
    /// 其他序列，整段忽略
    Other(usize),
    /// 輸入在序列中途結束
    Incomplete,
}

/// ANSI 文字解析器
///
/// 樣式暫存器跨呼叫存續：前一行設定的顏色延續到後續各行，
/// 直到 SGR 0 重置或重新連線。
#[derive(Debug, Default)]
pub struct AnsiInterpreter {
    style: TextStyle,
    /// 被切斷在輸入尾端的未完成轉義序列
    pending: String,
}

impl AnsiInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重置樣式暫存器與暫存序列（重新連線時使用）
    pub fn reset(&mut self) {
        self.style = TextStyle::default();
        self.pending.clear();
    }

    /// 目前的樣式暫存器內容
    pub fn style(&self) -> TextStyle {
        self.style
    }

    /// 解析一段文字，返回帶樣式的 span 序列
    pub fn interpret(&mut self, input: &str) -> Vec<StyledSpan> {
        let source: String = if self.pending.is_empty() {
            input.to_owned()
        } else {
            let mut s = std::mem::take(&mut self.pending);
            s.push_str(input);
            s
        };
        let chars: Vec<char> = source.chars().collect();

        let mut spans = Vec::new();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c != '\x1b' {
                // 控制字元（跳脫序列以外）不進入顯示文字
                if c >= ' ' || c == '\t' {
                    current.push(c);
                }
                i += 1;
                continue;
            }

            match scan_escape(&chars[i..]) {
                Scan::Sgr(len, codes) => {
                    if !current.is_empty() {
                        spans.push(StyledSpan {
                            text: std::mem::take(&mut current),
                            style: self.style,
                        });
                    }
                    if codes.is_empty() {
                        // 無參數的 ESC[m 等同重置
                        self.style = TextStyle::default();
                    } else {
                        self.style.apply_codes(&codes);
                    }
                    i += len;
                }
                Scan::Other(len) => {
                    i += len;
                }
                Scan::Incomplete => {
                    let rest: String = chars[i..].iter().collect();
                    if rest.len() > MAX_PENDING_ESCAPE {
                        debug!("轉義序列過長（{} bytes），視為雜訊丟棄", rest.len());
                    } else {
                        self.pending = rest;
                    }
                    break;
                }
            }
        }

        if !current.is_empty() {
            spans.push(StyledSpan {
                text: current,
                style: self.style,
            });
        }

        spans
    }
}

/// 掃描自 ESC 起始的轉義序列，`seq[0]` 必為 ESC
fn scan_escape(seq: &[char]) -> Scan {
    match seq.get(1) {
        None => Scan::Incomplete,
        Some('[') => {
            let mut i = 2;
            while let Some(&c) = seq.get(i) {
                // CSI 序列以 0x40-0x7E 範圍的字元結束
                if ('\x40'..='\x7e').contains(&c) {
                    return if c == 'm' {
                        Scan::Sgr(i + 1, parse_params(&seq[2..i]))
                    } else {
                        Scan::Other(i + 1)
                    };
                }
                i += 1;
            }
            Scan::Incomplete
        }
        // 字集指定序列 ESC ( x / ESC ) x 連同識別字元一併略過
        Some('(') | Some(')') => {
            if seq.len() >= 3 {
                Scan::Other(3)
            } else {
                Scan::Incomplete
            }
        }
        // 其他 ESC 序列只略過 ESC 本身
        Some(_) => Scan::Other(1),
    }
}

/// 解析 CSI 參數區的十進位數字，無法解析的段落略過
fn parse_params(params: &[char]) -> Vec<u16> {
    let content: String = params.iter().collect();
    content
        .split(';')
        .filter_map(|part| {
            let digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_single_default_span() {
        let mut interp = AnsiInterpreter::new();
        let spans = interp.interpret("Hello World");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello World");
        assert!(spans[0].style.is_default());
    }

    #[test]
    fn test_colored_spans() {
        let mut interp = AnsiInterpreter::new();
        let spans = interp.interpret("Hello\x1b[31mRed\x1b[0m World");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].text, "Hello");
        assert!(spans[0].style.is_default());
        assert_eq!(spans[1].text, "Red");
        assert_eq!(spans[1].style.fg, Some(AnsiColor::Red));
        assert_eq!(spans[2].text, " World");
        assert!(spans[2].style.is_default());
    }

    #[test]
    fn test_reset_always_restores_default() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[1;4;33;44mstyled");
        assert_eq!(interp.style().fg, Some(AnsiColor::Yellow));
        assert_eq!(interp.style().bg, Some(AnsiColor::Blue));
        assert!(interp.style().bold);
        assert!(interp.style().underline);

        interp.interpret("\x1b[0m");
        assert!(interp.style().is_default());
    }

    #[test]
    fn test_bare_reset_sequence() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[35m");
        interp.interpret("\x1b[m");
        assert!(interp.style().is_default());
    }

    #[test]
    fn test_bold_and_underline_toggles() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[1m\x1b[4m");
        assert!(interp.style().bold);
        assert!(interp.style().underline);

        interp.interpret("\x1b[22m");
        assert!(!interp.style().bold);
        assert!(interp.style().underline);

        interp.interpret("\x1b[24m");
        assert!(!interp.style().underline);
    }

    #[test]
    fn test_bright_foreground_range() {
        let mut interp = AnsiInterpreter::new();
        let spans = interp.interpret("\x1b[91malert");
        assert_eq!(spans[0].style.fg, Some(AnsiColor::BrightRed));
    }

    #[test]
    fn test_background_set_and_clear() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[31;47mx");
        assert_eq!(interp.style().bg, Some(AnsiColor::White));

        interp.interpret("\x1b[49m");
        assert_eq!(interp.style().bg, None);
        assert_eq!(interp.style().fg, Some(AnsiColor::Red));
    }

    #[test]
    fn test_default_foreground_only() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[31;44m");
        interp.interpret("\x1b[39m");
        assert_eq!(interp.style().fg, None);
        assert_eq!(interp.style().bg, Some(AnsiColor::Blue));
    }

    #[test]
    fn test_unrecognized_codes_ignored() {
        let mut interp = AnsiInterpreter::new();
        let spans = interp.interpret("\x1b[5;31mBlink");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Blink");
        assert_eq!(spans[0].style.fg, Some(AnsiColor::Red));
    }

    #[test]
    fn test_cursor_sequences_ignored() {
        let mut interp = AnsiInterpreter::new();
        let spans = interp.interpret("Hello\x1b[2J\x1b[HWorld");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "HelloWorld");
    }

    #[test]
    fn test_style_carries_across_calls() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[32mfirst line");
        let spans = interp.interpret("second line");
        assert_eq!(spans[0].style.fg, Some(AnsiColor::Green));
    }

    #[test]
    fn test_escape_split_across_calls() {
        let mut interp = AnsiInterpreter::new();
        let first = interp.interpret("HP: \x1b[3");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "HP: ");

        let second = interp.interpret("1m100");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "100");
        assert_eq!(second[0].style.fg, Some(AnsiColor::Red));
    }

    #[test]
    fn test_reset_clears_pending_and_style() {
        let mut interp = AnsiInterpreter::new();
        interp.interpret("\x1b[36mx\x1b[");
        interp.reset();
        assert!(interp.style().is_default());
        let spans = interp.interpret("plain");
        assert_eq!(spans[0].text, "plain");
        assert!(spans[0].style.is_default());
    }
}
