// SKSTACK/IPコマンド発行
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::error::{Error, Result};
use crate::skstack::{LineTransport, Port, SkRxD, authn, parser};

/// コマンドの応答形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// エコーバック, OK
    EchoOk,
    /// エコーバック, 値, OK
    EchoValueOk,
    /// エコーバック, 値
    EchoValue,
}

impl Shape {
    fn lines(self) -> usize {
        match self {
            Shape::EchoOk => 2,
            Shape::EchoValueOk => 3,
            Shape::EchoValue => 2,
        }
    }

    fn ends_with_status(self) -> bool {
        !matches!(self, Shape::EchoValue)
    }
}

/// OK行であることを確かめる
pub(crate) fn expect_ok(line: &str) -> Result<()> {
    match parser::parse_rxd(line) {
        SkRxD::Ok => Ok(()),
        SkRxD::Fail(code) => Err(Error::CommandFail(code)),
        _ => Err(Error::UnexpectedString(line.to_string())),
    }
}

pub struct CommandSession<P> {
    transport: LineTransport<P>,
}

impl<P: Port> CommandSession<P> {
    pub fn new(transport: LineTransport<P>) -> Self {
        Self { transport }
    }

    pub fn transport_mut(&mut self) -> &mut LineTransport<P> {
        &mut self.transport
    }

    /// コマンドを送信して応答形式の行数だけ受信する
    pub fn exchange(&mut self, command: &str, shape: Shape) -> Result<Vec<String>> {
        self.transport.write_line(command.as_bytes())?;
        let mut lines = Vec::with_capacity(shape.lines());
        for _ in 0..shape.lines() {
            let line = self.transport.read_line_string()?;
            tracing::debug!("{}", line);
            lines.push(line);
        }
        if shape.ends_with_status() {
            if let Some(status) = lines.last() {
                expect_ok(status)?;
            }
        }
        Ok(lines)
    }

    /// ファームウェアバージョン
    pub fn version(&mut self) -> Result<String> {
        let lines = self.exchange("SKVER", Shape::EchoValueOk)?;
        let ever = &lines[1];
        Ok(ever.strip_prefix("EVER ").unwrap_or(ever).trim().to_string())
    }

    /// IDを登録する
    pub fn set_route_b_id(&mut self, id: &authn::Id) -> Result<()> {
        self.exchange(&format!("SKSETRBID {}", id), Shape::EchoOk)
            .map(|_| ())
    }

    /// パスワードを登録する
    pub fn set_route_b_password(&mut self, password: &authn::Password) -> Result<()> {
        self.exchange(&format!("SKSETPWD C {}", password), Shape::EchoOk)
            .map(|_| ())
    }

    /// 仮想レジスタに書き込む
    pub fn set_register(&mut self, register: &str, value: &str) -> Result<()> {
        self.exchange(&format!("SKSREG {} {}", register, value), Shape::EchoOk)
            .map(|_| ())
    }

    /// MACアドレスからIPv6リンクローカルアドレスを得る
    pub fn link_local_address(&mut self, mac_address: &str) -> Result<String> {
        let lines = self.exchange(&format!("SKLL64 {}", mac_address), Shape::EchoValue)?;
        Ok(lines[1].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skstack::mock::MockPort;

    fn session(lines: &[&str]) -> (MockPort, CommandSession<MockPort>) {
        let port = MockPort::with_script(lines);
        let session = CommandSession::new(LineTransport::new(port.clone()));
        (port, session)
    }

    #[test]
    fn version() {
        let (port, mut session) = session(&["SKVER", "EVER 1.2.10", "OK"]);
        assert_eq!(session.version().unwrap(), "1.2.10");
        assert_eq!(port.written_lines(), vec!["SKVER"]);
    }

    #[test]
    fn credentials_are_two_exchanges() {
        let credentials = authn::test_credentials();
        let (port, mut session) = session(&[
            "SKSETRBID 0123456789ABCDEF0123456789ABCDEF",
            "OK",
            "SKSETPWD C PASSWORD1234",
            "OK",
        ]);
        session.set_route_b_id(&credentials.id).unwrap();
        session.set_route_b_password(&credentials.password).unwrap();
        assert_eq!(
            port.written_lines(),
            vec![
                "SKSETRBID 0123456789ABCDEF0123456789ABCDEF",
                "SKSETPWD C PASSWORD1234"
            ]
        );
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn fail_status() {
        let (_port, mut session) = session(&["SKSREG S2 21", "FAIL ER06"]);
        assert!(matches!(
            session.set_register("S2", "21"),
            Err(Error::CommandFail(6))
        ));
    }

    #[test]
    fn unexpected_status() {
        let (_port, mut session) = session(&["SKSREG S3 8888", "EVENT 02"]);
        assert!(matches!(
            session.set_register("S3", "8888"),
            Err(Error::UnexpectedString(_))
        ));
    }

    #[test]
    fn link_local_address() {
        let (_port, mut session) = session(&[
            "SKLL64 001D129012345678",
            "FE80:0000:0000:0000:021D:1290:1234:5678",
        ]);
        assert_eq!(
            session.link_local_address("001D129012345678").unwrap(),
            "FE80:0000:0000:0000:021D:1290:1234:5678"
        );
    }

    #[test]
    fn timeout_aborts_exchange() {
        let (_port, mut session) = session(&["SKVER"]);
        assert!(session.version().unwrap_err().is_read_timeout());
    }
}
