// SKSTACK/IPの応答パーサー
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::skstack::{self, SkRxD};
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1, take_while_m_n};
use nom::character::complete::{char, hex_digit1, space0, space1};
use nom::combinator::{eof, map, map_res, opt, rest};
use nom::multi::{many0, separated_list1};
use nom::sequence::preceded;
use std::net::Ipv6Addr;

// 8ビット16進数(任意桁)
fn u8_hex_digit(input: &str) -> nom::IResult<&str, u8> {
    map_res(hex_digit1, |hexd| u8::from_str_radix(hexd, 16)).parse(input)
}

// 8ビット16進数(2桁固定)
fn u8_hex_digit2(input: &str) -> nom::IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
        u8::from_str_radix(s, 16)
    })
    .parse(input)
}

// 16ビット16進数(任意桁)
fn u16_hex_digit(input: &str) -> nom::IResult<&str, u16> {
    map_res(hex_digit1, |hexd| u16::from_str_radix(hexd, 16)).parse(input)
}

// 64ビット16進数(任意桁)
fn u64_hex_digit(input: &str) -> nom::IResult<&str, u64> {
    map_res(hex_digit1, |hexd| u64::from_str_radix(hexd, 16)).parse(input)
}

// 行末
fn eol(input: &str) -> nom::IResult<&str, ()> {
    map((space0, eof), |_| ()).parse(input)
}

// FAIL ERxx
fn rx_fail(input: &str) -> nom::IResult<&str, SkRxD> {
    let parser = (tag("FAIL ER"), u8_hex_digit2, eol);
    map(parser, |(_tag, code, _eol)| SkRxD::Fail(code)).parse(input)
}

// OK
fn rx_ok(input: &str) -> nom::IResult<&str, SkRxD> {
    map((tag("OK"), eol), |_| SkRxD::Ok).parse(input)
}

// Ipv6アドレス(FE80:0000:0000:0000:0000:0000:0000:0000)
fn ipv6addr(s: &str) -> nom::IResult<&str, Ipv6Addr> {
    let parser = separated_list1(tag(":"), hex_digit1);
    map_res(parser, |xs: Vec<&str>| xs.join(":").parse::<Ipv6Addr>()).parse(s)
}

// EVENT xx [FE80:0000:0000:0000:0000:0000:0000:0000] [yy]
fn rx_event(s: &str) -> nom::IResult<&str, SkRxD> {
    let (s, _) = tag("EVENT").parse(s)?;
    let (s, _) = space1.parse(s)?;
    let (s, code) = u8_hex_digit.parse(s)?;
    let (s, sender) = opt(preceded(space1, ipv6addr)).parse(s)?;
    let (s, param) = opt(preceded(space1, u8_hex_digit)).parse(s)?;
    let (s, _) = eol.parse(s)?;
    Ok((
        s,
        SkRxD::Event(skstack::Event {
            code,
            sender,
            param,
        }),
    ))
}

// "  Channel:21" などEPANDESCの各行
fn rx_pandesc_field(s: &str) -> nom::IResult<&str, SkRxD> {
    let (s, _) = space1.parse(s)?;
    let (s, key) = take_till1(|c: char| c == ':').parse(s)?;
    let (s, _) = char(':').parse(s)?;
    let (s, value) = rest.parse(s)?;
    Ok((
        s,
        SkRxD::PanDescField(skstack::PanDescField {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        }),
    ))
}

// ERXUDP
fn rx_erxudp(s: &str) -> nom::IResult<&str, SkRxD> {
    //
    let (s, _) = tag("ERXUDP").parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 送信元アドレス
    let (s, sender) = ipv6addr.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 送信先アドレス
    let (s, destination) = ipv6addr.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 送信元ポート番号
    let (s, sender_port) = u16_hex_digit.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 送信先ポート番号
    let (s, destination_port) = u16_hex_digit.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 送信元のMAC層アドレス
    let (s, senderlla) = u64_hex_digit.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 暗号化あり/なし
    let (s, secured) = u8_hex_digit.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 受信したデータの長さ
    let (s, datalen) = u16_hex_digit.parse(s)?;
    let (s, _) = space1.parse(s)?;
    // 受信データ(テキスト)
    let (s, data) = many0(u8_hex_digit2).parse(s)?;
    //
    let (s, _) = eol.parse(s)?;

    Ok((
        s,
        SkRxD::Erxudp(skstack::Erxudp {
            sender,
            destination,
            sender_port,
            destination_port,
            senderlla,
            secured,
            datalen,
            data,
        }),
    ))
}

/// CRLFを取り除いた1行を解析する
pub fn parse_rxd(line: &str) -> SkRxD {
    let parsed = alt((
        // 以下のどれか
        map(eol, |_| SkRxD::Void), // 空行
        rx_ok,                     // OK
        rx_fail,                   // FAIL
        rx_event,                  // EVENT
        rx_erxudp,                 // ERXUDP
        rx_pandesc_field,          // EPANDESCの各行
    ))
    .parse(line);

    match parsed {
        Ok((_s, rxd)) => rxd,
        Err(e) => {
            tracing::trace!(target:"parser","{:?}", e);
            SkRxD::Text(line.to_string())
        }
    }
}

#[test]
fn test1() {
    assert_eq!(parse_rxd(""), SkRxD::Void);

    assert_eq!(parse_rxd(" "), SkRxD::Void);

    assert_eq!(parse_rxd("OK"), SkRxD::Ok);

    assert_eq!(parse_rxd("FAIL ER10"), SkRxD::Fail(16));

    assert_eq!(
        parse_rxd("EVER 1.2.10"),
        SkRxD::Text("EVER 1.2.10".to_string())
    );

    assert_eq!(u64_hex_digit("FF00").unwrap(), ("", 0xff00));
}

#[test]
fn test2() {
    let sender = "FE80:0000:0000:0000:0000:0000:0000:0000";

    assert_eq!(
        parse_rxd(&format!("EVENT 02 {}", sender)),
        SkRxD::Event(skstack::Event {
            code: 2,
            sender: Some(sender.parse().unwrap()),
            param: None,
        })
    );

    assert_eq!(
        parse_rxd(&format!("EVENT 21 {} 02", sender)),
        SkRxD::Event(skstack::Event {
            code: 33,
            sender: Some(sender.parse().unwrap()),
            param: Some(2),
        })
    );

    assert_eq!(
        parse_rxd("EVENT 21"),
        SkRxD::Event(skstack::Event {
            code: 0x21,
            sender: None,
            param: None,
        })
    );

    assert_eq!(
        parse_rxd("EVENT 21 01"),
        SkRxD::Event(skstack::Event {
            code: 0x21,
            sender: None,
            param: Some(1),
        })
    );
}

#[test]
fn test3() {
    let sender: Ipv6Addr = "FE80:0001:0002:0003:0004:0005:0006:0007".parse().unwrap();
    let destination: Ipv6Addr = "FE80:0008:0009:000a:000b:000c:000d:000e".parse().unwrap();
    let senderlla = 0x1234_5678_9abc_0000u64;
    let datalen = 16;
    let data = "000102030405060708090A0B0C0D0E0F";
    let erxudp = format!(
        "ERXUDP {} {} 0E1A 0E1A {:X} 1 {:04X} {}",
        sender.segments().map(|n| format!("{:04X}", n)).join(":"),
        destination
            .segments()
            .map(|n| format!("{:04X}", n))
            .join(":"),
        senderlla,
        datalen,
        data
    );

    assert_eq!(
        parse_rxd(&erxudp),
        SkRxD::Erxudp(skstack::Erxudp {
            sender,
            destination,
            sender_port: 0x0E1A,
            destination_port: 0x0E1A,
            senderlla,
            secured: 1,
            datalen,
            data: vec!(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15),
        })
    );

    // 受信データが奇数桁
    assert!(matches!(
        parse_rxd(&format!("{}0", erxudp)),
        SkRxD::Text(_)
    ));
}

#[test]
fn test4() {
    let epandesc = [
        ("  Channel:3B", "Channel", "3B"),
        ("  Channel Page:09", "Channel Page", "09"),
        ("  Pan ID:ABCD", "Pan ID", "ABCD"),
        ("  Addr:12345678ABCDABCD", "Addr", "12345678ABCDABCD"),
        ("  LQI:84", "LQI", "84"),
        ("  PairID:1234ABCD", "PairID", "1234ABCD"),
    ];

    for (line, key, value) in epandesc {
        assert_eq!(
            parse_rxd(line),
            SkRxD::PanDescField(skstack::PanDescField {
                key: key.to_string(),
                value: value.to_string(),
            })
        );
    }

    assert_eq!(parse_rxd("EPANDESC"), SkRxD::Text("EPANDESC".to_string()));
}
