// スマートメーターの計測値を読み出す
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::echonetlite::{
    self, EchonetliteFrame, smart_electric_energy_meter as SM,
};
use crate::error::Result;
use crate::skstack::{Port, Session, sendto};

impl<P: Port> Session<P> {
    // GET要求を送ってEDATAを取り出す
    fn get<T, F>(&mut self, epcs: &[u8], f: F) -> Result<T>
    where
        F: FnOnce(&EchonetliteFrame) -> Result<T>,
    {
        let request = EchonetliteFrame::get_request(echonetlite::SMART_METER, epcs);
        let address = self.address().to_string();
        let erxudp = sendto::exchange(self.command_mut().transport_mut(), &address, &request)?;
        let frame = echonetlite::decode_get_response(&erxudp.data, epcs)?;
        f(&frame)
    }

    /// 0xe7 瞬時電力計測値
    pub fn instantaneous_power(&mut self) -> Result<SM::InstantaneousPower> {
        self.get(&[SM::InstantaneousPower::EPC], |frame| {
            echonetlite::property(frame, SM::InstantaneousPower::EPC)
        })
    }

    /// 0xe1 積算電力量単位
    pub fn unit_for_cumulative_amounts_power(
        &mut self,
    ) -> Result<SM::UnitForCumulativeAmountsPower> {
        self.get(&[SM::UnitForCumulativeAmountsPower::EPC], |frame| {
            echonetlite::property(frame, SM::UnitForCumulativeAmountsPower::EPC)
        })
    }

    /// 0xea 定時積算電力量計測値
    pub fn cumulative_amounts_at_fixed_time(
        &mut self,
    ) -> Result<SM::CumulativeAmountsOfPowerAtFixedTime> {
        self.get(&[SM::CumulativeAmountsOfPowerAtFixedTime::EPC], |frame| {
            echonetlite::property(frame, SM::CumulativeAmountsOfPowerAtFixedTime::EPC)
        })
    }

    /// 0xe1と0xeaを1回の要求で読み出す
    pub fn unit_and_cumulative_amounts_at_fixed_time(
        &mut self,
    ) -> Result<(
        SM::UnitForCumulativeAmountsPower,
        SM::CumulativeAmountsOfPowerAtFixedTime,
    )> {
        self.get(
            &[
                SM::UnitForCumulativeAmountsPower::EPC,
                SM::CumulativeAmountsOfPowerAtFixedTime::EPC,
            ],
            |frame| {
                // 単位が先
                let unit = echonetlite::property(frame, SM::UnitForCumulativeAmountsPower::EPC)?;
                let energy =
                    echonetlite::property(frame, SM::CumulativeAmountsOfPowerAtFixedTime::EPC)?;
                Ok((unit, energy))
            },
        )
    }
}
