//! Telnet 協定常數與協商策略
//!
//! RFC 854/855 的命令與選項定義，以及本客戶端固定的最小協商策略

/// Telnet IAC (Interpret As Command) - 0xFF
pub const IAC: u8 = 255;

/// Telnet 命令位元組
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Sub-negotiation End
    Se = 240,
    /// No Operation
    Nop = 241,
    /// Data Mark
    DataMark = 242,
    /// Break
    Break = 243,
    /// Interrupt Process
    InterruptProcess = 244,
    /// Abort Output
    AbortOutput = 245,
    /// Are You There
    AreYouThere = 246,
    /// Erase Character
    EraseCharacter = 247,
    /// Erase Line
    EraseLine = 248,
    /// Go Ahead
    GoAhead = 249,
    /// Sub-negotiation Begin
    Sb = 250,
    /// Will
    Will = 251,
    /// Won't
    Wont = 252,
    /// Do
    Do = 253,
    /// Don't
    Dont = 254,
}

impl TelnetCommand {
    /// 從位元組解析 Telnet 命令
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            240 => Some(Self::Se),
            241 => Some(Self::Nop),
            242 => Some(Self::DataMark),
            243 => Some(Self::Break),
            244 => Some(Self::InterruptProcess),
            245 => Some(Self::AbortOutput),
            246 => Some(Self::AreYouThere),
            247 => Some(Self::EraseCharacter),
            248 => Some(Self::EraseLine),
            249 => Some(Self::GoAhead),
            250 => Some(Self::Sb),
            251 => Some(Self::Will),
            252 => Some(Self::Wont),
            253 => Some(Self::Do),
            254 => Some(Self::Dont),
            _ => None,
        }
    }

    /// 是否為選項協商命令（後面必定跟著一個選項位元組）
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Self::Will | Self::Wont | Self::Do | Self::Dont)
    }
}

/// Telnet 選項
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetOption {
    /// Binary Transmission
    BinaryTransmission,
    /// Echo
    Echo,
    /// Suppress Go Ahead
    SuppressGoAhead,
    /// Terminal Type
    TerminalType,
    /// Window Size (NAWS)
    Naws,
    /// Linemode
    Linemode,
    /// Charset
    Charset,
    /// MCCP2 (MUD Client Compression Protocol)
    Mccp2,
    /// GMCP (Generic MUD Communication Protocol)
    Gmcp,
    /// 未定義的選項
    Unknown(u8),
}

impl TelnetOption {
    /// 從位元組解析 Telnet 選項
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::BinaryTransmission,
            1 => Self::Echo,
            3 => Self::SuppressGoAhead,
            24 => Self::TerminalType,
            31 => Self::Naws,
            34 => Self::Linemode,
            42 => Self::Charset,
            86 => Self::Mccp2,
            201 => Self::Gmcp,
            other => Self::Unknown(other),
        }
    }

    /// 獲取選項的位元組值
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::BinaryTransmission => 0,
            Self::Echo => 1,
            Self::SuppressGoAhead => 3,
            Self::TerminalType => 24,
            Self::Naws => 31,
            Self::Linemode => 34,
            Self::Charset => 42,
            Self::Mccp2 => 86,
            Self::Gmcp => 201,
            Self::Unknown(b) => *b,
        }
    }
}

/// 固定的最小協商策略
///
/// - 伺服器 WILL GMCP（或設定中視為 GMCP 通道的其他選項碼）：回覆 DO，啟用帶外通道
/// - 伺服器 DO Suppress-Go-Ahead：回覆 WILL
/// - 伺服器 DO Echo：回覆 WILL
/// - 其餘選項一律不回應（不參與就是拒絕）
pub fn negotiation_reply(
    cmd: TelnetCommand,
    option: TelnetOption,
    gmcp_options: &[u8],
) -> Option<[u8; 3]> {
    let reply = match (cmd, option) {
        (TelnetCommand::Will, opt) if gmcp_options.contains(&opt.as_byte()) => TelnetCommand::Do,
        (TelnetCommand::Do, TelnetOption::SuppressGoAhead) => TelnetCommand::Will,
        (TelnetCommand::Do, TelnetOption::Echo) => TelnetCommand::Will,
        _ => return None,
    };
    Some([IAC, reply as u8, option.as_byte()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_byte() {
        assert_eq!(TelnetCommand::from_byte(251), Some(TelnetCommand::Will));
        assert_eq!(TelnetCommand::from_byte(249), Some(TelnetCommand::GoAhead));
        assert_eq!(TelnetCommand::from_byte(100), None);
        assert_eq!(TelnetCommand::from_byte(255), None);
    }

    #[test]
    fn test_negotiation_commands() {
        assert!(TelnetCommand::Will.is_negotiation());
        assert!(TelnetCommand::Dont.is_negotiation());
        assert!(!TelnetCommand::Sb.is_negotiation());
        assert!(!TelnetCommand::GoAhead.is_negotiation());
    }

    #[test]
    fn test_option_roundtrip() {
        for byte in 0..=255u8 {
            let option = TelnetOption::from_byte(byte);
            assert_eq!(option.as_byte(), byte);
        }
    }

    #[test]
    fn test_reply_do_for_gmcp_will() {
        let gmcp = [TelnetOption::Gmcp.as_byte()];
        let reply = negotiation_reply(TelnetCommand::Will, TelnetOption::Gmcp, &gmcp);
        assert_eq!(reply, Some([IAC, TelnetCommand::Do as u8, 201]));
    }

    #[test]
    fn test_reply_for_aliased_gmcp_option() {
        // 部分伺服器以非標準選項碼傳送 GMCP 資料
        let gmcp = [TelnetOption::Gmcp.as_byte(), 102];
        let reply = negotiation_reply(TelnetCommand::Will, TelnetOption::from_byte(102), &gmcp);
        assert_eq!(reply, Some([IAC, TelnetCommand::Do as u8, 102]));
    }

    #[test]
    fn test_reply_will_for_sga_and_echo() {
        let gmcp = [TelnetOption::Gmcp.as_byte()];
        assert_eq!(
            negotiation_reply(TelnetCommand::Do, TelnetOption::SuppressGoAhead, &gmcp),
            Some([IAC, TelnetCommand::Will as u8, 3])
        );
        assert_eq!(
            negotiation_reply(TelnetCommand::Do, TelnetOption::Echo, &gmcp),
            Some([IAC, TelnetCommand::Will as u8, 1])
        );
    }

    #[test]
    fn test_unsupported_options_get_no_reply() {
        let gmcp = [TelnetOption::Gmcp.as_byte()];
        assert_eq!(
            negotiation_reply(TelnetCommand::Will, TelnetOption::Mccp2, &gmcp),
            None
        );
        assert_eq!(
            negotiation_reply(TelnetCommand::Do, TelnetOption::Naws, &gmcp),
            None
        );
        assert_eq!(
            negotiation_reply(TelnetCommand::Wont, TelnetOption::Echo, &gmcp),
            None
        );
        assert_eq!(
            negotiation_reply(TelnetCommand::Dont, TelnetOption::SuppressGoAhead, &gmcp),
            None
        );
    }
}
