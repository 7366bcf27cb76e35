// SKSTACK/IPの応答
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::net::Ipv6Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub code: u8,
    pub sender: Option<Ipv6Addr>,
    pub param: Option<u8>,
}

impl Event {
    /// EVENT 21 = UDP送信処理の完了
    pub const UDP_SENT: u8 = 0x21;
    /// EVENT 22 = アクティブスキャン終了
    pub const ACTIVE_SCAN_DONE: u8 = 0x22;
    /// EVENT 24 = PANA接続失敗
    pub const PANA_FAILED: u8 = 0x24;
    /// EVENT 25 = PANA接続完了
    pub const PANA_CONNECTED: u8 = 0x25;

    /// UDPを送信できずに終わった(送信失敗、または代わりにアドレス要請を行った)
    pub fn is_neighbor_unreachable(&self) -> bool {
        self.code == Self::UDP_SENT && self.param != Some(0)
    }
}

/// EPANDESCに続く "  Key:Value" 行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanDescField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erxudp {
    pub sender: Ipv6Addr,      // 送信元IPv6アドレス
    pub destination: Ipv6Addr, // 送信先IPv6アドレス
    pub sender_port: u16,      // 送信元UDPポート番号
    pub destination_port: u16, // 送信先UDPポート番号
    pub senderlla: u64,        // 送信元のMAC層アドレス
    pub secured: u8,           // 1:暗号化あり, 0:暗号化なし
    pub datalen: u16,          // 受信データ長
    pub data: Vec<u8>,         // 受信データ
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkRxD {
    Event(Event),               // イベント受信
    PanDescField(PanDescField), // EPANDESCの各行
    Erxudp(Erxudp),             // ERXUDP受信
    Fail(u8),                   // 失敗
    Ok,                         // 成功
    Void,                       // 空行
    Text(String),               // その他(エコーバックなど)
}
