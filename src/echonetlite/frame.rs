// Echonetlite FRAME
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::echonetlite::{self, EchonetliteEdata};
use core::result;
use std::fmt;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EchonetliteFrame<'a> {
    pub ehd: u16,
    pub tid: u16,
    pub seoj: [u8; 3],
    pub deoj: [u8; 3],
    pub esv: u8,
    pub opc: u8,
    pub edata: Vec<EchonetliteEdata<'a>>,
}

impl EchonetliteFrame<'static> {
    /// コントローラーからのGET要求電文
    pub fn get_request(deoj: [u8; 3], epcs: &[u8]) -> Self {
        EchonetliteFrame {
            ehd: echonetlite::EHD,
            tid: 1,
            seoj: echonetlite::CONTROLLER,
            deoj,
            esv: echonetlite::ESV_GET,
            opc: epcs.len() as u8,
            edata: epcs
                .iter()
                .map(|epc| EchonetliteEdata {
                    epc: *epc,
                    ..Default::default()
                })
                .collect(),
        }
    }
}

impl<'a> EchonetliteFrame<'a> {
    pub fn encode(&self) -> result::Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(self, echonetlite::bincode_config())
    }

    /// 受信データから取り出す(余りのバイトがあれば失敗)
    pub fn decode(data: &'a [u8]) -> result::Result<Self, bincode::error::DecodeError> {
        let (frame, len): (EchonetliteFrame, usize) =
            bincode::borrow_decode_from_slice(data, echonetlite::bincode_config())?;
        if len == data.len() {
            Ok(frame)
        } else {
            Err(bincode::error::DecodeError::OtherString(format!(
                "{} trailing bytes",
                data.len() - len
            )))
        }
    }

    pub fn show(&self) -> String {
        match self.esv {
            // Get
            0x62 => format!("Getプロパティ値読み出し要求 N={}", self.opc),
            // Get_SNA
            0x52 => format!("Get_SNAプロパティ値読み出し不可応答 N={}", self.opc),
            // Get_res
            0x72 => format!("Get_resプロパティ値読み出し応答 N={}", self.opc),
            // INF
            0x73 => format!("INFプロパティ値通知 N={}", self.opc),
            _ => format!("よくわからないESV値 0x{:02X} N={}", self.esv, self.opc),
        }
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for EchonetliteFrame<'de> {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> core::result::Result<Self, bincode::error::DecodeError> {
        let ehd: u16 = bincode::BorrowDecode::borrow_decode(decoder)?;
        let tid: u16 = bincode::BorrowDecode::borrow_decode(decoder)?;
        let seoj: [u8; 3] = bincode::BorrowDecode::borrow_decode(decoder)?;
        let deoj: [u8; 3] = bincode::BorrowDecode::borrow_decode(decoder)?;
        let esv: u8 = bincode::BorrowDecode::borrow_decode(decoder)?;
        let opc: u8 = bincode::BorrowDecode::borrow_decode(decoder)?;
        let mut edata: Vec<EchonetliteEdata> = Vec::with_capacity(opc as usize);
        for _idx in 0..opc {
            edata.push(bincode::BorrowDecode::borrow_decode(decoder)?);
        }
        Ok(Self {
            ehd,
            tid,
            seoj,
            deoj,
            esv,
            opc,
            edata,
        })
    }
}

impl<'a> bincode::Encode for EchonetliteFrame<'a> {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> result::Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.ehd, encoder)?;
        bincode::Encode::encode(&self.tid, encoder)?;
        bincode::Encode::encode(&self.seoj, encoder)?;
        bincode::Encode::encode(&self.deoj, encoder)?;
        bincode::Encode::encode(&self.esv, encoder)?;
        bincode::Encode::encode(&self.opc, encoder)?;
        for v in &self.edata {
            bincode::Encode::encode(v, encoder)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Display for EchonetliteFrame<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.show())
    }
}

#[test]
fn test1() {
    let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);

    let binary: Vec<u8> = vec![
        0x10, 0x81, //
        0x00, 0x01, //
        0x05, 0xff, 0x01, //
        0x02, 0x88, 0x01, //
        0x62, //
        0x01, //
        0xe7, 0x00, //
    ];

    let encoded = frame.encode().unwrap();
    assert_eq!(encoded.len(), 14);
    assert_eq!(encoded, binary);

    let decoded = EchonetliteFrame::decode(&encoded).unwrap();
    assert_eq!(frame, decoded);
}

#[test]
fn test2() {
    let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe1, 0xea]);

    let binary: Vec<u8> = vec![
        0x10, 0x81, //
        0x00, 0x01, //
        0x05, 0xff, 0x01, //
        0x02, 0x88, 0x01, //
        0x62, //
        0x02, //
        0xe1, 0x00, //
        0xea, 0x00, //
    ];
    assert_eq!(frame.encode().unwrap(), binary);
}

#[test]
fn test3() {
    // PDCに対してEDTが足りない
    let short: Vec<u8> = vec![
        0x10, 0x81, 0x00, 0x01, 0x02, 0x88, 0x01, 0x05, 0xff, 0x01, 0x72, 0x01, 0xe7, 0x04, 0x00,
        0x00,
    ];
    assert!(EchonetliteFrame::decode(&short).is_err());

    // ヘッダーの途中で切れている
    assert!(EchonetliteFrame::decode(&short[..5]).is_err());

    // 余りがある
    let mut long = short.clone();
    long.extend([0x01, 0x9b, 0xff]);
    assert!(EchonetliteFrame::decode(&long).is_err());
}
