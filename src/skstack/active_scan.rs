// アクティブスキャンでスマートメーターを探す
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::error::{Error, Result};
use crate::skstack::{CommandSession, Event, PanDescField, Port, SkRxD, parser};
use std::ops::RangeInclusive;

/// スキャン時間の初回値から上限まで
pub const SCAN_DURATIONS: RangeInclusive<u8> = 5..=7;

/// スキャンで見つけたPANの情報(モジュールが表示したまま)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub channel: String,
    pub channel_page: String,
    pub pan_id: String,
    pub addr: String,
    pub lqi: String,
    pub pair_id: String,
}

impl NetworkInfo {
    pub fn is_valid(&self) -> bool {
        [
            &self.channel,
            &self.channel_page,
            &self.pan_id,
            &self.addr,
            &self.lqi,
            &self.pair_id,
        ]
        .iter()
        .all(|s| !s.is_empty())
    }

    fn update(&mut self, field: PanDescField) {
        let slot = match field.key.as_str() {
            "Channel" => &mut self.channel,
            "Channel Page" => &mut self.channel_page,
            "Pan ID" => &mut self.pan_id,
            "Addr" => &mut self.addr,
            "LQI" => &mut self.lqi,
            "PairID" => &mut self.pair_id,
            _ => return,
        };
        *slot = field.value;
    }
}

// 1回分のスキャン
fn scan_once<P: Port>(session: &mut CommandSession<P>, duration: u8) -> Result<NetworkInfo> {
    let transport = session.transport_mut();
    transport.write_line(format!("SKSCAN 2 FFFFFFFF {}", duration).as_bytes())?;

    let mut candidate = NetworkInfo::default();
    loop {
        let line = transport.read_line_string()?;
        match parser::parse_rxd(&line) {
            SkRxD::Event(event) if event.code == Event::ACTIVE_SCAN_DONE => break,
            SkRxD::PanDescField(field) => {
                tracing::debug!("{}", line);
                candidate.update(field);
            }
            SkRxD::Fail(code) => return Err(Error::CommandFail(code)),
            rxd => tracing::trace!("{:?}", rxd),
        }
    }
    Ok(candidate)
}

/// アクティブスキャンを実行する
///
/// 見つからなければスキャン時間を延ばして再試行する。
/// 見つけたPANの情報と、そのときのスキャン時間を返す。
pub fn active_scan<P: Port>(session: &mut CommandSession<P>) -> Result<(NetworkInfo, u8)> {
    for duration in SCAN_DURATIONS {
        let candidate = scan_once(session, duration)?;
        if candidate.is_valid() {
            tracing::info!("PAN found. (scan duration {})", duration);
            return Ok((candidate, duration));
        }
        tracing::debug!("PAN not found. (scan duration {})", duration);
    }
    Err(Error::ScanExhausted)
}

#[cfg(test)]
pub(crate) const EPANDESC: [&str; 7] = [
    "EPANDESC",
    "  Channel:21",
    "  Channel Page:09",
    "  Pan ID:8888",
    "  Addr:001D129012345678",
    "  LQI:E1",
    "  PairID:00ABCDEF",
];
