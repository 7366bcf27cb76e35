// Echonetliteメッセージの送受信
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::echonetlite::{self, EchonetliteFrame};
use crate::error::{Error, Result};
use crate::skstack::{Erxudp, LineTransport, Port, SkRxD, command, parser};

/// SKSENDTOコマンドを作る(電文はそのまま後ろに付ける)
pub fn command_from_echonetliteframe(
    destination: &str,
    frame: &EchonetliteFrame,
) -> Result<Vec<u8>> {
    let payload = frame.encode()?;
    let sksendto = format!(
        "SKSENDTO 1 {} {:04X} 1 {:04X} ",
        destination,
        echonetlite::UDP_PORT,
        payload.len(),
    );
    Ok([sksendto.as_bytes(), payload.as_slice()].concat())
}

/// ERXUDP行を解析する
pub fn parse_datagram(line: &str) -> Result<Erxudp> {
    if !line.starts_with("ERXUDP") {
        return Err(Error::UnexpectedString(line.to_string()));
    }
    let erxudp = match parser::parse_rxd(line) {
        SkRxD::Erxudp(erxudp) => erxudp,
        _ => return Err(Error::Parse(line.to_string())),
    };
    if erxudp.datalen as usize != erxudp.data.len() {
        return Err(Error::Parse(format!(
            "datalen {} but {} bytes received",
            erxudp.datalen,
            erxudp.data.len()
        )));
    }
    if erxudp.destination_port != echonetlite::UDP_PORT {
        return Err(Error::UnexpectedString(line.to_string()));
    }
    Ok(erxudp)
}

/// 電文を送信して応答を受信する
///
/// エコーバック, EVENT 21, OK, ERXUDP の順に届く。
pub fn exchange<P: Port>(
    transport: &mut LineTransport<P>,
    destination: &str,
    frame: &EchonetliteFrame,
) -> Result<Erxudp> {
    let command = command_from_echonetliteframe(destination, frame)?;
    transport.write_bytes(&command)?;

    // エコーバック(前回の要求に遅れて届いた行は読み捨てる)
    loop {
        let echo = transport.read_line_string()?;
        if echo.starts_with("SKSENDTO ") {
            tracing::debug!("{}", echo.escape_debug());
            break;
        }
        tracing::warn!("stale line discarded: {}", echo.escape_debug());
    }

    // UDP送信結果
    let line = transport.read_line_string()?;
    tracing::debug!("{}", line);
    match parser::parse_rxd(&line) {
        SkRxD::Event(event) if event.is_neighbor_unreachable() => {
            tracing::warn!("neighbor unreachable: {:?}", event);
            return Err(Error::UnexpectedString(line));
        }
        SkRxD::Event(_) => {}
        _ => return Err(Error::UnexpectedString(line)),
    }

    command::expect_ok(&transport.read_line_string()?)?;

    let line = transport.read_line_string()?;
    tracing::debug!("{}", line);
    parse_datagram(&line)
}

#[cfg(test)]
pub(crate) fn erxudp_line(payload_hex: &str) -> String {
    format!(
        "ERXUDP {} FE80:0000:0000:0000:021D:1290:1111:2222 0E1A 0E1A 001D129012345678 1 {:04X} {}",
        crate::skstack::join::ADDRESS,
        payload_hex.len() / 2,
        payload_hex
    )
}

#[cfg(test)]
pub(crate) fn response_lines(payload_hex: &str) -> Vec<String> {
    vec![
        format!("SKSENDTO 1 {} 0E1A 1 000E ", crate::skstack::join::ADDRESS),
        format!("EVENT 21 {} 00", crate::skstack::join::ADDRESS),
        "OK".to_string(),
        erxudp_line(payload_hex),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echonetlite::from_hex;
    use crate::skstack::join::ADDRESS;
    use crate::skstack::mock::MockPort;

    fn transport(lines: &[String]) -> (MockPort, LineTransport<MockPort>) {
        let port = MockPort::new();
        port.push_lines(&lines.iter().map(|s| s.as_str()).collect::<Vec<&str>>());
        (port.clone(), LineTransport::new(port))
    }

    #[test]
    fn sksendto_command() {
        let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);
        let command = command_from_echonetliteframe(ADDRESS, &frame).unwrap();
        let expected = [
            format!("SKSENDTO 1 {} 0E1A 1 000E ", ADDRESS).as_bytes(),
            from_hex("1081000105FF010288016201E700").as_slice(),
        ]
        .concat();
        assert_eq!(command, expected);
        // CRLFは付かない
        assert!(!command.ends_with(b"\r\n"));
    }

    #[test]
    fn exchange_power() {
        let (port, mut transport) =
            transport(&response_lines("1081000102880105FF017201E7040000019B"));
        let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);
        let erxudp = exchange(&mut transport, ADDRESS, &frame).unwrap();
        assert_eq!(erxudp.data, from_hex("1081000102880105FF017201E7040000019B"));
        assert_eq!(port.written().len(), 1);
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn neighbor_unreachable() {
        let resolicited = format!("EVENT 21 {} 02", ADDRESS);
        for event in ["EVENT 21", resolicited.as_str()] {
            let (_port, mut transport) = transport(&[
                format!("SKSENDTO 1 {} 0E1A 1 000E ", ADDRESS),
                event.to_string(),
            ]);
            let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);
            assert!(matches!(
                exchange(&mut transport, ADDRESS, &frame),
                Err(Error::UnexpectedString(_))
            ));
        }
    }

    #[test]
    fn missing_datagram() {
        let mut lines = response_lines("1081000102880105FF017201E7040000019B");
        lines[3] = format!("EVENT 02 {}", ADDRESS);
        let (_port, mut transport) = transport(&lines);
        let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);
        assert!(matches!(
            exchange(&mut transport, ADDRESS, &frame),
            Err(Error::UnexpectedString(_))
        ));
    }

    #[test]
    fn late_lines_before_echo_are_discarded() {
        let mut lines = vec![
            "OK".to_string(),
            erxudp_line("1081000102880105FF017201E704000000FF"),
        ];
        lines.extend(response_lines("1081000102880105FF017201E7040000019B"));
        let (port, mut transport) = transport(&lines);
        let frame = EchonetliteFrame::get_request(echonetlite::SMART_METER, &[0xe7]);
        let erxudp = exchange(&mut transport, ADDRESS, &frame).unwrap();
        assert_eq!(erxudp.data, from_hex("1081000102880105FF017201E7040000019B"));
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn datagram_checks() {
        // 9番目の欄が無い
        assert!(matches!(
            parse_datagram(&format!(
                "ERXUDP {} {} 0E1A 0E1A 001D129012345678 1 0012",
                ADDRESS, ADDRESS
            )),
            Err(Error::Parse(_))
        ));
        // データ長が合わない
        assert!(matches!(
            parse_datagram(&format!(
                "ERXUDP {} {} 0E1A 0E1A 001D129012345678 1 0013 1081000102880105FF017201E7040000019B",
                ADDRESS, ADDRESS
            )),
            Err(Error::Parse(_))
        ));
        // PANAメッセージ
        assert!(matches!(
            parse_datagram(&format!(
                "ERXUDP {} {} 02CC 02CC 001D129012345678 1 0001 00",
                ADDRESS, ADDRESS
            )),
            Err(Error::UnexpectedString(_))
        ));
        assert!(parse_datagram(&erxudp_line("1081000102880105FF017201E7040000019B")).is_ok());
    }
}
