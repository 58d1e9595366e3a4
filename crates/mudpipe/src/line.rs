//! 行組裝模組
//!
//! 解碼器輸出的是任意切分的文字片段；這裡把片段累積成以換行結尾的
//! 完整行，或在提示字元信號（Go-Ahead、解碼器清空、讀取閒置）出現時
//! 把未完成的部分行提前送出。

use crate::encoding::decode_text;

/// 一個可顯示的文字單位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    /// 行內容；不含換行符，CR 已剝除
    pub text: String,
    /// 是否為提示字元（未以換行結尾、被提前送出的部分行）
    pub prompt: bool,
}

/// 行組裝器
///
/// 緩衝尚未構成完整行的位元組。解碼延後到整行到齊才做，
/// 避免多位元組字元被片段邊界切壞。
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空緩衝（重新連線時使用）
    pub fn reset(&mut self) {
        self.partial.clear();
    }

    /// 緩衝中是否沒有未完成的部分行
    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }

    /// 追加一個文字片段，返回因此完成的顯示單位
    ///
    /// `prompt_signal` 為真時，切完整行之後剩餘的部分行
    /// 會立即以提示字元送出
    pub fn push(&mut self, fragment: &[u8], prompt_signal: bool) -> Vec<AssembledLine> {
        self.partial.extend_from_slice(fragment);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            line.retain(|&b| b != b'\r');
            lines.push(AssembledLine {
                text: decode_text(&line),
                prompt: false,
            });
        }

        if prompt_signal {
            if let Some(line) = self.take_partial() {
                lines.push(line);
            }
        }

        lines
    }

    /// 把未完成的部分行立即以提示字元送出
    ///
    /// 三種時機：解碼器已無滯留位元組、讀取閒置逾時、連線結束。
    /// 緩衝為空時返回 `None`，同一段部分行不會被送出兩次。
    pub fn take_partial(&mut self) -> Option<AssembledLine> {
        if self.partial.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.partial);
        rest.retain(|&b| b != b'\r');
        if rest.is_empty() {
            return None;
        }
        Some(AssembledLine {
            text: decode_text(&rest),
            prompt: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_line_emitted() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"Hello World\r\n", false);
        assert_eq!(
            lines,
            vec![AssembledLine {
                text: "Hello World".to_string(),
                prompt: false
            }]
        );
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_fragments_reassemble_into_one_line() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"Hel", false).is_empty());
        assert!(assembler.push(b"lo Wor", false).is_empty());
        let lines = assembler.push(b"ld\n", false);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello World");
    }

    #[test]
    fn test_multiple_lines_in_one_fragment() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"one\r\ntwo\r\nthr", false);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "one");
        assert_eq!(lines[1].text, "two");
        assert!(!assembler.is_empty());
    }

    #[test]
    fn test_prompt_signal_flushes_partial() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"ok\r\nEnter name: ", true);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "ok");
        assert!(!lines[0].prompt);
        assert_eq!(lines[1].text, "Enter name: ");
        assert!(lines[1].prompt);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_prompt_signal_with_empty_buffer_emits_nothing() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"done\n", true).iter().all(|l| !l.prompt));
        assert!(assembler.push(b"", true).is_empty());
    }

    #[test]
    fn test_take_partial_fires_once() {
        let mut assembler = LineAssembler::new();
        assembler.push(b"Prompt>", false);

        let flushed = assembler.take_partial();
        assert_eq!(
            flushed,
            Some(AssembledLine {
                text: "Prompt>".to_string(),
                prompt: true
            })
        );
        assert_eq!(assembler.take_partial(), None);
    }

    #[test]
    fn test_lone_carriage_return_is_dropped() {
        let mut assembler = LineAssembler::new();
        assembler.push(b"\r", false);
        assert_eq!(assembler.take_partial(), None);
    }

    #[test]
    fn test_multibyte_char_split_across_fragments() {
        let mut assembler = LineAssembler::new();
        let utf8 = "狀態\n".as_bytes();
        assert!(assembler.push(&utf8[..2], false).is_empty());
        let lines = assembler.push(&utf8[2..], false);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "狀態");
    }
}
