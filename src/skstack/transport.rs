// シリアル通信 行単位の送受信
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::error::{Error, Result};
use std::io;
use std::time::Duration;

/// 1行の最大長(これを超えたら通信路の異常とみなす)
pub const MAX_LINE_LENGTH: usize = 4096;

/// バイトストリームの通信路
pub trait Port: Send {
    /// 読み込む。0バイトはタイムアウト
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// すべて書き込む
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
    /// 送受信バッファを空にする
    fn reset_buffers(&mut self) -> io::Result<()>;
    /// 読み込みタイムアウトを設定する
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Port for Box<dyn serialport::SerialPort> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)?;
        io::Write::flush(self)
    }

    fn reset_buffers(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

// ログに出せる文字だけにする
fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|n| *n as char)
        .filter(|n| n.is_ascii())
        .collect::<String>()
}

/// CRLF区切りの行で送受信する
pub struct LineTransport<P> {
    port: P,
}

impl<P: Port> LineTransport<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// CRLFを付けて1行送信する
    pub fn write_line(&mut self, bytes: &[u8]) -> Result<()> {
        let line = [bytes, b"\r\n"].concat();
        self.write_bytes(&line)
    }

    /// そのまま送信する
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        tracing::trace!(target:"Tx->","{}", printable(bytes).escape_debug());
        self.port.write(bytes)?;
        Ok(())
    }

    /// 1行受信する(CRLFは取り除く)
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::<u8>::new();
        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Err(Error::ReadTimeout),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(Error::ReadTimeout),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Transport(e)),
            }
            // 0x00 はタイムアウトで何も届かなかった印
            if buf[0] == 0x00 {
                return Err(Error::ReadTimeout);
            }
            data.push(buf[0]);
            if data.ends_with(b"\r\n") {
                data.truncate(data.len() - 2);
                tracing::trace!(target:"<-Rx","{}", printable(&data).escape_debug());
                return Ok(data);
            }
            // 行末のCRを受け取った直後はまだLFを待っている
            if data.len() > MAX_LINE_LENGTH + 1 {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {} bytes", MAX_LINE_LENGTH),
                )));
            }
        }
    }

    /// 1行受信して文字列にする
    pub fn read_line_string(&mut self) -> Result<String> {
        let line = self.read_line()?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skstack::mock::MockPort;

    #[test]
    fn read_line_strips_crlf() {
        for payload in ["OK", "", "EVER 1.2.10", "  Pan ID:8888", "a\rb\nc"] {
            let port = MockPort::new();
            port.push_bytes(format!("{}\r\n", payload).as_bytes());
            let mut transport = LineTransport::new(port);
            assert_eq!(transport.read_line().unwrap(), payload.as_bytes());
        }
    }

    #[test]
    fn read_lines_in_order() {
        let port = MockPort::with_script(&["SKVER", "EVER 1.2.10", "OK"]);
        let mut transport = LineTransport::new(port);
        assert_eq!(transport.read_line_string().unwrap(), "SKVER");
        assert_eq!(transport.read_line_string().unwrap(), "EVER 1.2.10");
        assert_eq!(transport.read_line_string().unwrap(), "OK");
        assert!(transport.read_line().unwrap_err().is_read_timeout());
    }

    #[test]
    fn nul_byte_is_read_timeout() {
        let port = MockPort::new();
        port.push_bytes(b"\x00OK\r\n");
        let mut transport = LineTransport::new(port.clone());
        assert!(matches!(transport.read_line(), Err(Error::ReadTimeout)));
        // 続きのバイトは読んでいない
        assert_eq!(port.pending(), 4);
    }

    #[test]
    fn nul_byte_in_the_middle_is_read_timeout() {
        let port = MockPort::new();
        port.push_bytes(b"OK\x00\r\n");
        let mut transport = LineTransport::new(port);
        assert!(matches!(transport.read_line(), Err(Error::ReadTimeout)));
    }

    #[test]
    fn overlong_line_is_transport_error() {
        let port = MockPort::new();
        port.push_bytes(&vec![b'A'; MAX_LINE_LENGTH + 10]);
        let mut transport = LineTransport::new(port);
        match transport.read_line() {
            Err(Error::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn longest_line_is_accepted() {
        let port = MockPort::new();
        port.push_bytes(&[vec![b'A'; MAX_LINE_LENGTH], b"\r\n".to_vec()].concat());
        let mut transport = LineTransport::new(port);
        assert_eq!(transport.read_line().unwrap().len(), MAX_LINE_LENGTH);

        let port = MockPort::new();
        port.push_bytes(&[vec![b'A'; MAX_LINE_LENGTH + 1], b"\r\n".to_vec()].concat());
        let mut transport = LineTransport::new(port);
        assert!(matches!(transport.read_line(), Err(Error::Transport(_))));
    }

    #[test]
    fn write_line_appends_crlf() {
        let port = MockPort::new();
        let mut transport = LineTransport::new(port.clone());
        transport.write_line(b"SKVER").unwrap();
        transport.write_bytes(b"SKSENDTO ").unwrap();
        assert_eq!(port.written(), vec![b"SKVER\r\n".to_vec(), b"SKSENDTO ".to_vec()]);
    }

    #[test]
    fn reset_discards_pending_input() {
        let port = MockPort::with_script(&["EVENT 21 FE80:0000:0000:0000:021D:1290:1234:5678 00"]);
        let mut transport = LineTransport::new(port.clone());
        transport.get_mut().reset_buffers().unwrap();
        assert_eq!(port.resets(), 1);
        assert!(transport.read_line().unwrap_err().is_read_timeout());
    }
}
