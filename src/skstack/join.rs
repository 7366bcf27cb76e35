// スマートメータールートB接続
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::error::{Error, Result};
use crate::skstack::{
    CommandSession, Event, NetworkInfo, Port, SkRxD, active_scan, authn, command, parser,
};
use std::fmt;
use std::time::Duration;

/// 接続手順の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Init,
    LoggedIn,
    Scanned,
    ChannelRegistered,
    PanRegistered,
    AddressResolved,
    Joined,
    Failed,
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 接続済みのセッション
///
/// 接続手順を完了しないと作れない。
pub struct Session<P> {
    command: CommandSession<P>,
    credentials: authn::Credentials,
    network: NetworkInfo,
    address: String,
}

impl<P: Port> Session<P> {
    pub(crate) fn new(
        command: CommandSession<P>,
        credentials: authn::Credentials,
        network: NetworkInfo,
        address: String,
    ) -> Self {
        Self {
            command,
            credentials,
            network,
            address,
        }
    }

    pub fn credentials(&self) -> &authn::Credentials {
        &self.credentials
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    /// スマートメーターのIPv6アドレス
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.command
            .transport_mut()
            .get_mut()
            .set_read_timeout(timeout)?;
        Ok(())
    }

    /// 受信途中の行を捨てる
    pub fn reset_buffers(&mut self) -> Result<()> {
        self.command.transport_mut().get_mut().reset_buffers()?;
        Ok(())
    }

    pub(crate) fn command_mut(&mut self) -> &mut CommandSession<P> {
        &mut self.command
    }
}

/// スマートメーターと接続する手順
pub struct NetworkJoin<P> {
    state: JoinState,
    command: CommandSession<P>,
    credentials: authn::Credentials,
    network: Option<NetworkInfo>,
    scan_duration: Option<u8>,
    address: Option<String>,
}

impl<P: Port> NetworkJoin<P> {
    pub fn new(command: CommandSession<P>, credentials: authn::Credentials) -> Self {
        Self {
            state: JoinState::Init,
            command,
            credentials,
            network: None,
            scan_duration: None,
            address: None,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn network(&self) -> Option<&NetworkInfo> {
        self.network.as_ref()
    }

    /// PANを見つけたときのスキャン時間
    pub fn scan_duration(&self) -> Option<u8> {
        self.scan_duration
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// 1段階進める
    ///
    /// 失敗すると Failed になり、以後は進めない。
    pub fn step(&mut self) -> Result<JoinState> {
        let result = match self.state {
            JoinState::Init => self.login().map(|_| JoinState::LoggedIn),
            JoinState::LoggedIn => self.scan().map(|_| JoinState::Scanned),
            JoinState::Scanned => self.register_channel().map(|_| JoinState::ChannelRegistered),
            JoinState::ChannelRegistered => self.register_pan_id().map(|_| JoinState::PanRegistered),
            JoinState::PanRegistered => self.resolve_address().map(|_| JoinState::AddressResolved),
            JoinState::AddressResolved => self.join().map(|_| JoinState::Joined),
            JoinState::Joined => return Ok(JoinState::Joined),
            JoinState::Failed => return Err(Error::JoinAborted),
        };
        match result {
            Ok(next) => {
                tracing::info!("{} -> {}", self.state, next);
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                tracing::error!("{} -> {}, reason: {}", self.state, JoinState::Failed, e);
                self.state = JoinState::Failed;
                Err(e)
            }
        }
    }

    /// 接続完了まで進める
    pub fn run(mut self) -> Result<Session<P>> {
        while self.step()? != JoinState::Joined {}
        match (self.network, self.address) {
            (Some(network), Some(address)) => Ok(Session::new(
                self.command,
                self.credentials,
                network,
                address,
            )),
            _ => Err(Error::JoinAborted),
        }
    }

    fn network_info(&self) -> Result<&NetworkInfo> {
        self.network.as_ref().ok_or(Error::JoinAborted)
    }

    // IDとパスワードを登録する
    fn login(&mut self) -> Result<()> {
        self.command.set_route_b_id(&self.credentials.id)?;
        self.command.set_route_b_password(&self.credentials.password)
    }

    fn scan(&mut self) -> Result<()> {
        let (network, duration) = active_scan::active_scan(&mut self.command)?;
        tracing::info!("{:?}", network);
        self.network = Some(network);
        self.scan_duration = Some(duration);
        Ok(())
    }

    // 自端末の論理チャンネル番号を設定する
    fn register_channel(&mut self) -> Result<()> {
        let channel = self.network_info()?.channel.clone();
        self.command.set_register("S2", &channel)
    }

    // 自端末のPAN IDを設定する
    fn register_pan_id(&mut self) -> Result<()> {
        let pan_id = self.network_info()?.pan_id.clone();
        self.command.set_register("S3", &pan_id)
    }

    fn resolve_address(&mut self) -> Result<()> {
        let addr = self.network_info()?.addr.clone();
        let address = self.command.link_local_address(&addr)?;
        tracing::info!("IPv6 address: {}", address);
        self.address = Some(address);
        Ok(())
    }

    // PANA認証
    fn join(&mut self) -> Result<()> {
        let address = self.address.clone().ok_or(Error::JoinAborted)?;
        let transport = self.command.transport_mut();
        transport.write_line(format!("SKJOIN {}", address).as_bytes())?;

        // エコーバック
        let echo = transport.read_line_string()?;
        tracing::debug!("{}", echo);
        command::expect_ok(&transport.read_line_string()?)?;

        // PANA認証開始後のイベントを処理する
        loop {
            let line = transport.read_line_string()?;
            match parser::parse_rxd(&line) {
                SkRxD::Event(event) if event.code == Event::PANA_FAILED => {
                    return Err(Error::JoinFailure);
                }
                SkRxD::Event(event) if event.code == Event::PANA_CONNECTED => break,
                rxd => tracing::trace!("{:?}", rxd),
            }
        }
        tracing::info!("successful PANA authentication");

        // インスタンスリスト通知
        let instance_list = transport.read_line_string()?;
        tracing::debug!("{}", instance_list);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) const ADDRESS: &str = "FE80:0000:0000:0000:021D:1290:1234:5678";

#[cfg(test)]
pub(crate) fn test_session(
    port: &crate::skstack::mock::MockPort,
) -> Session<crate::skstack::mock::MockPort> {
    use crate::skstack::LineTransport;
    Session::new(
        CommandSession::new(LineTransport::new(port.clone())),
        authn::test_credentials(),
        NetworkInfo {
            channel: "21".to_string(),
            channel_page: "09".to_string(),
            pan_id: "8888".to_string(),
            addr: "001D129012345678".to_string(),
            lqi: "E1".to_string(),
            pair_id: "00ABCDEF".to_string(),
        },
        ADDRESS.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skstack::LineTransport;
    use crate::skstack::active_scan::EPANDESC;
    use crate::skstack::mock::MockPort;

    fn script_until_join(port: &MockPort) {
        port.push_lines(&[
            "SKSETRBID 0123456789ABCDEF0123456789ABCDEF",
            "OK",
            "SKSETPWD C PASSWORD1234",
            "OK",
            "SKSCAN 2 FFFFFFFF 5",
            "OK",
            "EVENT 20 FE80:0000:0000:0000:021D:1290:1234:5678",
        ]);
        port.push_lines(&EPANDESC);
        port.push_lines(&[
            "EVENT 22 FE80:0000:0000:0000:021D:1290:1111:2222",
            "SKSREG S2 21",
            "OK",
            "SKSREG S3 8888",
            "OK",
            "SKLL64 001D129012345678",
            ADDRESS,
            "SKJOIN FE80:0000:0000:0000:021D:1290:1234:5678",
            "OK",
            "EVENT 21 FE80:0000:0000:0000:021D:1290:1234:5678 00",
            "ERXUDP FE80:0000:0000:0000:021D:1290:1234:5678 FE80:0000:0000:0000:021D:1290:1111:2222 02CC 02CC 001D129012345678 0 0001 00",
        ]);
    }

    fn joiner(port: &MockPort) -> NetworkJoin<MockPort> {
        NetworkJoin::new(
            CommandSession::new(LineTransport::new(port.clone())),
            authn::test_credentials(),
        )
    }

    #[test]
    fn join_sequence() {
        let port = MockPort::new();
        script_until_join(&port);
        port.push_lines(&[
            "EVENT 25 FE80:0000:0000:0000:021D:1290:1234:5678",
            "ERXUDP FE80:0000:0000:0000:021D:1290:1234:5678 FF02:0000:0000:0000:0000:0000:0000:0001 0E1A 0E1A 001D129012345678 1 0012 108100000EF0010EF0017301D50401028801",
        ]);

        let mut join = joiner(&port);
        let expected = [
            JoinState::LoggedIn,
            JoinState::Scanned,
            JoinState::ChannelRegistered,
            JoinState::PanRegistered,
            JoinState::AddressResolved,
            JoinState::Joined,
        ];
        for state in expected {
            assert_eq!(join.step().unwrap(), state);
            assert_eq!(join.state(), state);
        }
        assert_eq!(join.scan_duration(), Some(5));
        assert_eq!(join.address(), Some(ADDRESS));
        assert_eq!(port.pending(), 0);

        let session = join.run().unwrap();
        assert_eq!(session.address(), ADDRESS);
        assert_eq!(session.network().pan_id, "8888");
        assert_eq!(
            session.credentials().id.to_string(),
            "0123456789ABCDEF0123456789ABCDEF"
        );
        assert_eq!(
            port.written_lines(),
            vec![
                "SKSETRBID 0123456789ABCDEF0123456789ABCDEF",
                "SKSETPWD C PASSWORD1234",
                "SKSCAN 2 FFFFFFFF 5",
                "SKSREG S2 21",
                "SKSREG S3 8888",
                "SKLL64 001D129012345678",
                "SKJOIN FE80:0000:0000:0000:021D:1290:1234:5678",
            ]
        );
    }

    #[test]
    fn pana_failure_is_fatal() {
        let port = MockPort::new();
        script_until_join(&port);
        port.push_lines(&["EVENT 24 FE80:0000:0000:0000:021D:1290:1234:5678"]);

        let mut join = joiner(&port);
        let result = loop {
            match join.step() {
                Ok(JoinState::Joined) => panic!("must not join"),
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(result, Error::JoinFailure));
        assert_eq!(join.state(), JoinState::Failed);
        // Failed から先へは進めない
        assert!(matches!(join.step(), Err(Error::JoinAborted)));
    }

    #[test]
    fn io_error_aborts_sequence() {
        let port =
            MockPort::with_script(&["SKSETRBID 0123456789ABCDEF0123456789ABCDEF", "OK"]);
        let result = joiner(&port).run();
        assert!(matches!(result, Err(Error::ReadTimeout)));
        assert_eq!(port.written_lines().len(), 2);
    }
}
