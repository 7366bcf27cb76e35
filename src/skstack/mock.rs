// テスト用の通信路
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::skstack::Port;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct State {
    rx: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    responder: Option<Responder>,
    // 応答を読み終わっていない
    outstanding: bool,
    interleaved_writes: usize,
    read_timeout: Option<Duration>,
    resets: usize,
}

/// 台本どおりに応答する通信路
#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<State>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各行にCRLFを付けて受信待ちに積む
    pub fn with_script(lines: &[&str]) -> Self {
        let port = Self::new();
        port.push_lines(lines);
        port
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes);
    }

    pub fn push_lines(&self, lines: &[&str]) {
        let mut state = self.lock();
        for line in lines {
            state.rx.extend(line.as_bytes());
            state.rx.extend(b"\r\n");
        }
    }

    /// 書き込みに応じて応答を返す
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
    }

    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.written()
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end().to_string())
            .collect()
    }

    /// 前の応答を読み終わる前に書き込まれた回数
    pub fn interleaved_writes(&self) -> usize {
        self.lock().interleaved_writes
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.lock().read_timeout
    }

    pub fn resets(&self) -> usize {
        self.lock().resets
    }
}

impl Port for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        match state.rx.pop_front() {
            Some(b) => {
                buf[0] = b;
                if state.rx.is_empty() {
                    state.outstanding = false;
                }
                Ok(1)
            }
            None => {
                state.outstanding = false;
                Ok(0)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.outstanding {
            state.interleaved_writes += 1;
        }
        state.written.push(buf.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            if let Some(response) = responder(buf) {
                state.rx.extend(response);
            }
        }
        state.outstanding = !state.rx.is_empty();
        Ok(())
    }

    fn reset_buffers(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.rx.clear();
        state.outstanding = false;
        state.resets += 1;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.lock().read_timeout = Some(timeout);
        Ok(())
    }
}
