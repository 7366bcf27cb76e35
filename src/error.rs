// エラー種別
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("read timeout")]
    ReadTimeout,

    #[error(r#"unexpected string "{0}""#)]
    UnexpectedString(String),

    #[error(r#"parse error "{0}""#)]
    Parse(String),

    #[error(r#"i/o "{0}""#)]
    Transport(#[from] io::Error),

    #[error("fail. code: {0:X}(hex)")]
    CommandFail(u8),

    #[error("PANA authentication failed")]
    JoinFailure,

    #[error("scan retry over error")]
    ScanExhausted,

    #[error("join sequence has already failed")]
    JoinAborted,

    #[error(r#"binary encode "{0}""#)]
    BinaryEncode(#[from] bincode::error::EncodeError),

    #[error("measurement worker stopped")]
    WorkerStopped,

    #[error(r#"task "{0}""#)]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// 読み込みタイムアウトか
    pub fn is_read_timeout(&self) -> bool {
        matches!(self, Error::ReadTimeout)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
