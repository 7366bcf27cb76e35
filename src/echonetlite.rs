// Echonetlite
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod edata;
pub mod frame;
pub mod smart_electric_energy_meter;

pub use edata::*;
pub use frame::*;

use crate::error::{Error, Result};

/// 0x1081 = echonet lite
pub const EHD: u16 = 0x1081;
/// home controller
pub const CONTROLLER: [u8; 3] = [0x05, 0xff, 0x01];
/// smartmeter
pub const SMART_METER: [u8; 3] = [0x02, 0x88, 0x01];
/// get要求
pub const ESV_GET: u8 = 0x62;
/// get応答
pub const ESV_GET_RES: u8 = 0x72;
/// UDPポート番号 0E1A = 3610 は Echonetliteメッセージ
pub const UDP_PORT: u16 = 0x0e1a;

pub(crate) fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// スマートメーターからのGET応答であることを確かめる
///
/// 送信元、ESV、EPCの並びがすべて一致しなければならない。
pub fn validate_get_response(frame: &EchonetliteFrame, expected_epcs: &[u8]) -> Result<()> {
    let epcs = frame.edata.iter().map(|v| v.epc).collect::<Vec<u8>>();
    if frame.seoj == SMART_METER && frame.esv == ESV_GET_RES && epcs == expected_epcs {
        Ok(())
    } else {
        let hex = |xs: &[u8]| xs.iter().map(|n| format!("{:02X}", n)).collect::<String>();
        Err(Error::Parse(format!(
            "SEOJ:{} ESV:{:02X} EPC:[{}], expected SEOJ:{} ESV:{:02X} EPC:[{}]",
            hex(&frame.seoj),
            frame.esv,
            hex(&epcs),
            hex(&SMART_METER),
            ESV_GET_RES,
            hex(expected_epcs),
        )))
    }
}

/// 受信データからGET応答を取り出す
pub fn decode_get_response<'a>(
    data: &'a [u8],
    expected_epcs: &[u8],
) -> Result<EchonetliteFrame<'a>> {
    let frame = EchonetliteFrame::decode(data).map_err(|e| Error::Parse(e.to_string()))?;
    tracing::debug!(
        "{} {}",
        frame.show(),
        frame
            .edata
            .iter()
            .map(|v| v.show(None))
            .collect::<Vec<String>>()
            .join(" ")
    );
    validate_get_response(&frame, expected_epcs)?;
    Ok(frame)
}

/// 期待したEPCのプロパティ値を取り出す
pub fn property<'a, 'b, T>(frame: &'b EchonetliteFrame<'a>, epc: u8) -> Result<T>
where
    T: TryFrom<&'b EchonetliteEdata<'a>, Error = String>,
{
    let edata = frame
        .edata
        .iter()
        .find(|v| v.epc == epc)
        .ok_or_else(|| Error::Parse(format!("EPC:0x{:02X} not found", epc)))?;
    T::try_from(edata).map_err(Error::Parse)
}

#[cfg(test)]
pub(crate) fn from_hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::smart_electric_energy_meter as SM;
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn instantaneous_power() {
        let data = from_hex("1081000102880105FF017201E7040000019B");
        let frame = decode_get_response(&data, &[0xe7]).unwrap();
        let power: SM::InstantaneousPower = property(&frame, 0xe7).unwrap();
        assert_eq!(power.watt(), 411);
    }

    #[test]
    fn negative_instantaneous_power() {
        let data = from_hex("1081000102880105FF017201E704FFFFFFF0");
        let frame = decode_get_response(&data, &[0xe7]).unwrap();
        let power: SM::InstantaneousPower = property(&frame, 0xe7).unwrap();
        assert_eq!(power.watt(), -16);
    }

    #[test]
    fn unit_and_cumulative_amounts() {
        let data = from_hex("1081000102880105FF017202E10100EA0B07E70A14000000000003E8");
        let frame = decode_get_response(&data, &[0xe1, 0xea]).unwrap();
        let unit: SM::UnitForCumulativeAmountsPower = property(&frame, 0xe1).unwrap();
        let energy: SM::CumulativeAmountsOfPowerAtFixedTime = property(&frame, 0xea).unwrap();
        assert_eq!(unit.0, Decimal::ONE);
        assert_eq!(energy.cumulative_amounts_power, 1000);
        assert_eq!(
            energy.time_point,
            NaiveDate::from_ymd_opt(2023, 10, 20)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap()
        );
    }

    #[test]
    fn bad_unit_is_parse_error() {
        let data = from_hex("1081000102880105FF017201E1010E");
        let frame = decode_get_response(&data, &[0xe1]).unwrap();
        let unit: Result<SM::UnitForCumulativeAmountsPower> = property(&frame, 0xe1);
        assert!(matches!(unit, Err(Error::Parse(_))));
    }

    #[test]
    fn every_field_must_match() {
        // 送信元がスマートメーターでない
        let data = from_hex("1081000105FF0105FF017201E7040000019B");
        assert!(matches!(
            decode_get_response(&data, &[0xe7]),
            Err(Error::Parse(_))
        ));
        // Get_SNA
        let data = from_hex("1081000102880105FF015201E700");
        assert!(matches!(
            decode_get_response(&data, &[0xe7]),
            Err(Error::Parse(_))
        ));
        // EPCが違う
        let data = from_hex("1081000102880105FF017201E8040000019B");
        assert!(matches!(
            decode_get_response(&data, &[0xe7]),
            Err(Error::Parse(_))
        ));
        // 2つめのEPCが違う
        let data = from_hex("1081000102880105FF017202E10100E00400000001");
        assert!(matches!(
            decode_get_response(&data, &[0xe1, 0xea]),
            Err(Error::Parse(_))
        ));
        // 足りない
        let data = from_hex("1081000102880105FF017202E10100");
        assert!(matches!(
            decode_get_response(&data, &[0xe1, 0xea]),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn truncated_payload_is_parse_error() {
        let data = from_hex("1081000102880105FF0172");
        assert!(matches!(
            decode_get_response(&data, &[0xe7]),
            Err(Error::Parse(_))
        ));
    }
}
