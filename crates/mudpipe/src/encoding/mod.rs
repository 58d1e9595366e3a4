//! 寬容文字解碼模組
//!
//! MUD 伺服器的輸出編碼沒有任何保證：現代伺服器多為 UTF-8，
//! 老伺服器常是 Latin-1 或任意 8-bit 字集。顯示文字先以 UTF-8
//! 解讀，失敗時退回單位元組解碼，確保解碼永不中斷管線。

use std::borrow::Cow;

/// 解碼顯示文字：UTF-8 優先，失敗時退回 Latin-1
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => encoding_rs::mem::decode_latin1(bytes).into_owned(),
    }
}

/// 寬容的單位元組解碼，永不失敗
///
/// 用於子協商 payload 這類必須完整保留、逐位元組對應的內容
pub fn decode_permissive(bytes: &[u8]) -> Cow<'_, str> {
    encoding_rs::mem::decode_latin1(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("Hello 世界".as_bytes()), "Hello 世界");
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        // 0xE9 在 UTF-8 下不合法，Latin-1 下是 é
        let bytes = [b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_text(&bytes), "café");
    }

    #[test]
    fn test_permissive_never_fails() {
        let bytes: Vec<u8> = (0..=255).collect();
        let decoded = decode_permissive(&bytes);
        assert_eq!(decoded.chars().count(), 256);
    }

    #[test]
    fn test_permissive_ascii_is_identity() {
        assert_eq!(decode_permissive(b"Char.Vitals {}"), "Char.Vitals {}");
    }
}
