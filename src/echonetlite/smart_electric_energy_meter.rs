// Echonetlite 低圧スマートメータークラス
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::echonetlite::EchonetliteEdata;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Properties {
    UnitForCumulativeAmountsPower(UnitForCumulativeAmountsPower),
    InstantaneousPower(InstantaneousPower),
    CumulativeAmountsOfPowerAtFixedTime(CumulativeAmountsOfPowerAtFixedTime),
}

impl Properties {
    pub fn show(&self, opt_unit: Option<&UnitForCumulativeAmountsPower>) -> String {
        match self {
            Self::UnitForCumulativeAmountsPower(a) => format!("{}", a),
            Self::InstantaneousPower(a) => format!("{}", a),
            Self::CumulativeAmountsOfPowerAtFixedTime(a) => a.show(opt_unit),
        }
    }
}

impl<'a> TryFrom<&EchonetliteEdata<'a>> for Properties {
    type Error = String;

    fn try_from(edata: &EchonetliteEdata) -> Result<Self, Self::Error> {
        match edata.epc {
            UnitForCumulativeAmountsPower::EPC => {
                UnitForCumulativeAmountsPower::try_from(edata).map(Self::UnitForCumulativeAmountsPower)
            }
            InstantaneousPower::EPC => {
                InstantaneousPower::try_from(edata).map(Self::InstantaneousPower)
            }
            CumulativeAmountsOfPowerAtFixedTime::EPC => {
                CumulativeAmountsOfPowerAtFixedTime::try_from(edata)
                    .map(Self::CumulativeAmountsOfPowerAtFixedTime)
            }
            _ => Err(format!("UNKNOWN EPC:0x{:X} EDT:{:?}", edata.epc, edata.edt)),
        }
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.show(None))
    }
}

/// 0xe1 積算電力量単位(正方向、逆方向計測値)
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct UnitForCumulativeAmountsPower(pub Decimal);

impl UnitForCumulativeAmountsPower {
    pub const EPC: u8 = 0xe1; // 0xe1 積算電力量単位(正方向、逆方向計測値)
}

impl<'a> TryFrom<&EchonetliteEdata<'a>> for UnitForCumulativeAmountsPower {
    type Error = String;

    fn try_from(edata: &EchonetliteEdata) -> Result<Self, Self::Error> {
        match edata.edt {
            [0x00] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1, 0))), // 1.0 kwh
            [0x01] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1, 1))), // 0.1 kwh
            [0x02] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1, 2))), // 0.01 kwh
            [0x03] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1, 3))), // 0.001 kwh
            [0x04] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1, 4))), // 0.0001 kwh
            [0x0a] if edata.epc == Self::EPC => Ok(Self(Decimal::new(10, 0))), // 10 kwh
            [0x0b] if edata.epc == Self::EPC => Ok(Self(Decimal::new(100, 0))), // 100 kwh
            [0x0c] if edata.epc == Self::EPC => Ok(Self(Decimal::new(1000, 0))), // 1000 kwh
            [0x0d] if edata.epc == Self::EPC => Ok(Self(Decimal::new(10000, 0))), // 10000 kwh
            _ => Err(format!("BAD EPC:0x{:X} EDT:{:?}", edata.epc, edata.edt)),
        }
    }
}

impl fmt::Display for UnitForCumulativeAmountsPower {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "積算電力量単位(正方向、逆方向計測値)= {} kwh", self.0)
    }
}

/// 0xe7 瞬時電力計測値
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct InstantaneousPower(pub i32);

impl InstantaneousPower {
    pub const EPC: u8 = 0xe7; // 0xe7 瞬時電力計測値

    pub fn watt(&self) -> i32 {
        self.0
    }
}

impl<'a> TryFrom<&EchonetliteEdata<'a>> for InstantaneousPower {
    type Error = String;

    fn try_from(edata: &EchonetliteEdata) -> Result<Self, Self::Error> {
        match *edata.edt {
            // マイナスの値もある
            [a, b, c, d] if edata.epc == Self::EPC => Ok(Self(i32::from_be_bytes([a, b, c, d]))),
            _ => Err(format!("BAD EPC:0x{:X} EDT:{:?}", edata.epc, edata.edt)),
        }
    }
}

impl fmt::Display for InstantaneousPower {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "瞬時電力={:5} W", self.0)
    }
}

/// 0xea 定時積算電力量計測値(正方向計測値)
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CumulativeAmountsOfPowerAtFixedTime {
    pub time_point: NaiveDateTime,
    pub cumulative_amounts_power: u32,
}

impl CumulativeAmountsOfPowerAtFixedTime {
    pub const EPC: u8 = 0xea; // 0xea 定時積算電力量計測値(正方向計測値)

    pub fn kwh(&self, unit: &UnitForCumulativeAmountsPower) -> Decimal {
        Decimal::from(self.cumulative_amounts_power) * unit.0
    }

    pub fn show(&self, opt_unit: Option<&UnitForCumulativeAmountsPower>) -> String {
        match opt_unit {
            Some(unit) => format!(
                "定時積算電力量計測値(正方向計測値)={} ({:8} kwh)",
                self.time_point.format("%Y-%m-%d %H:%M:%S"),
                self.kwh(unit)
            ),
            None => format!(
                "定時積算電力量計測値(正方向計測値)={} ({:8})",
                self.time_point.format("%Y-%m-%d %H:%M:%S"),
                self.cumulative_amounts_power
            ),
        }
    }
}

impl<'a> TryFrom<&EchonetliteEdata<'a>> for CumulativeAmountsOfPowerAtFixedTime {
    type Error = String;

    fn try_from(edata: &EchonetliteEdata) -> Result<Self, Self::Error> {
        match *edata.edt {
            [
                year0,                // 年 2bytes
                year1,                //
                month,                // 月 1bytes
                day,                  // 日 1bytes
                hour,                 // 時 1bytes
                minute,               // 分 1bytes
                second,               // 秒 1bytes
                cumulative_watt_hour0, // 積算電力量 4bytes
                cumulative_watt_hour1, //
                cumulative_watt_hour2, //
                cumulative_watt_hour3, //
            ] if edata.epc == Self::EPC => {
                let year = u16::from_be_bytes([year0, year1]);
                let datetime = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                    .and_then(|a| a.and_hms_opt(hour as u32, minute as u32, second as u32))
                    .ok_or_else(|| {
                        format!(
                            "BAD DATETIME {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, minute, second
                        )
                    })?;
                let value = u32::from_be_bytes([
                    cumulative_watt_hour0,
                    cumulative_watt_hour1,
                    cumulative_watt_hour2,
                    cumulative_watt_hour3,
                ]);
                Ok(Self {
                    time_point: datetime,
                    cumulative_amounts_power: value,
                })
            }
            _ => Err(format!("BAD EPC:0x{:X} EDT:{:?}", edata.epc, edata.edt)),
        }
    }
}

impl fmt::Display for CumulativeAmountsOfPowerAtFixedTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.show(None))
    }
}

#[test]
fn test_instantaneous_power() {
    let edata = |edt: &'static [u8]| EchonetliteEdata {
        epc: InstantaneousPower::EPC,
        pdc: edt.len() as u8,
        edt,
    };
    assert_eq!(
        InstantaneousPower::try_from(&edata(&[0x00, 0x00, 0x01, 0x9b])),
        Ok(InstantaneousPower(411))
    );
    // 符号付き
    assert_eq!(
        InstantaneousPower::try_from(&edata(&[0xff, 0xff, 0xff, 0xf0])),
        Ok(InstantaneousPower(-16))
    );
    assert!(InstantaneousPower::try_from(&edata(&[0x01, 0x9b])).is_err());
    assert!(
        InstantaneousPower::try_from(&EchonetliteEdata {
            epc: 0xe8,
            pdc: 4,
            edt: &[0x00, 0x00, 0x01, 0x9b],
        })
        .is_err()
    );
}

#[test]
fn test_unit() {
    use rust_decimal::dec;

    let unit = |n: u8| {
        let edt = [n];
        UnitForCumulativeAmountsPower::try_from(&EchonetliteEdata {
            epc: UnitForCumulativeAmountsPower::EPC,
            pdc: 1,
            edt: &edt,
        })
    };
    let table = [
        (0x00, dec!(1)),
        (0x01, dec!(0.1)),
        (0x02, dec!(0.01)),
        (0x03, dec!(0.001)),
        (0x04, dec!(0.0001)),
        (0x0a, dec!(10)),
        (0x0b, dec!(100)),
        (0x0c, dec!(1000)),
        (0x0d, dec!(10000)),
    ];
    for (n, expected) in table {
        assert_eq!(unit(n), Ok(UnitForCumulativeAmountsPower(expected)));
    }
    for n in [0x05, 0x09, 0x0e, 0xff] {
        assert!(unit(n).is_err());
    }
}

#[test]
fn test_cumulative_amounts_at_fixed_time() {
    let edata = |edt: &'static [u8]| EchonetliteEdata {
        epc: CumulativeAmountsOfPowerAtFixedTime::EPC,
        pdc: edt.len() as u8,
        edt,
    };
    let a = CumulativeAmountsOfPowerAtFixedTime::try_from(&edata(&[
        0x07, 0xe7, 0x0a, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xe8,
    ]))
    .unwrap();
    assert_eq!(
        a.time_point,
        NaiveDate::from_ymd_opt(2023, 10, 20)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    );
    assert_eq!(a.cumulative_amounts_power, 1000);
    assert_eq!(
        a.kwh(&UnitForCumulativeAmountsPower(Decimal::new(1, 1))),
        Decimal::new(1000, 1)
    );

    // 13月
    assert!(
        CumulativeAmountsOfPowerAtFixedTime::try_from(&edata(&[
            0x07, 0xe7, 0x0d, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xe8,
        ]))
        .is_err()
    );
    // 長さが違う
    assert!(
        CumulativeAmountsOfPowerAtFixedTime::try_from(&edata(&[
            0x07, 0xe7, 0x0a, 0x14, 0x00, 0x00, 0x00, 0x00, 0x03, 0xe8,
        ]))
        .is_err()
    );
}
