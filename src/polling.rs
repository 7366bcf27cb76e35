// 定期的に計測値を読み出す
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::echonetlite::smart_electric_energy_meter as SM;
use crate::error::{Error, Result};
use crate::skstack::{Port, Session};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 計測結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    InstantaneousPower {
        recorded_at: DateTime<Utc>,
        power: SM::InstantaneousPower,
    },
    CumulativeEnergy {
        unit: SM::UnitForCumulativeAmountsPower,
        reading: SM::CumulativeAmountsOfPowerAtFixedTime,
        kwh: Decimal,
    },
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InstantaneousPower { power, .. } => write!(f, "{}", power),
            Self::CumulativeEnergy { unit, reading, .. } => write!(f, "{}", reading.show(Some(unit))),
        }
    }
}

/// 計測結果の送り先
pub trait MeasurementSink: Send + Sync {
    fn emit(&self, measurement: Measurement);
}

impl MeasurementSink for mpsc::UnboundedSender<Measurement> {
    fn emit(&self, measurement: Measurement) {
        if let Err(e) = self.send(measurement) {
            tracing::warn!("measurement dropped: {}", e.0);
        }
    }
}

/// 読み出し間隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub instantaneous_power_period: Duration,
    pub cumulative_energy_period: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            instantaneous_power_period: Duration::from_secs(1),
            cumulative_energy_period: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    InstantaneousPower,
    CumulativeEnergy,
}

struct Job {
    request: Request,
    reply: oneshot::Sender<Result<Measurement>>,
}

fn measure<P: Port>(session: &mut Session<P>, request: Request) -> Result<Measurement> {
    match request {
        Request::InstantaneousPower => {
            let power = session.instantaneous_power()?;
            Ok(Measurement::InstantaneousPower {
                recorded_at: Utc::now(),
                power,
            })
        }
        Request::CumulativeEnergy => {
            let (unit, reading) = session.unit_and_cumulative_amounts_at_fixed_time()?;
            let kwh = reading.kwh(&unit);
            Ok(Measurement::CumulativeEnergy { unit, reading, kwh })
        }
    }
}

// セッションを占有して要求を1つずつ処理する
fn serve<P: Port>(mut session: Session<P>, mut jobs: mpsc::Receiver<Job>) {
    while let Some(job) = jobs.blocking_recv() {
        let result = measure(&mut session, job.request);
        if result.as_ref().is_err_and(|e| e.is_read_timeout()) {
            // 遅れて届く応答を次の要求に持ち越さない
            if let Err(e) = session.reset_buffers() {
                tracing::warn!("reset buffers failed, reason: {}", e);
            }
        }
        if job.reply.send(result).is_err() {
            tracing::debug!("{:?} requester has gone", job.request);
        }
    }
    tracing::debug!("measurement worker finished");
}

// 一定間隔で要求を出す
async fn periodic<S: MeasurementSink>(
    period: Duration,
    request: Request,
    jobs: mpsc::Sender<Job>,
    sink: Arc<S>,
) -> Result<()> {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        interval.tick().await;
        let (reply, response) = oneshot::channel();
        jobs.send(Job { request, reply })
            .await
            .map_err(|_| Error::WorkerStopped)?;
        match response.await.map_err(|_| Error::WorkerStopped)? {
            Ok(measurement) => {
                tracing::info!("{}", measurement);
                sink.emit(measurement);
            }
            Err(e) if e.is_read_timeout() => {
                tracing::warn!("{:?} skipped, reason: {}", request, e);
            }
            Err(e) => {
                tracing::error!("{:?} failed, reason: {}", request, e);
                return Err(e);
            }
        }
    }
}

/// 接続済みのセッションで計測値を定期的に読み出す
pub struct PollingScheduler<P> {
    session: Session<P>,
    config: PollingConfig,
}

impl<P: Port + 'static> PollingScheduler<P> {
    pub fn new(session: Session<P>, config: PollingConfig) -> Self {
        Self { session, config }
    }

    /// 致命的なエラーか取り消しまで動き続ける
    pub async fn run<S>(self, sink: Arc<S>, cancel: CancellationToken) -> Result<()>
    where
        S: MeasurementSink + 'static,
    {
        let PollingScheduler { session, config } = self;
        let (jobs, queue) = mpsc::channel::<Job>(2);
        let worker = tokio::task::spawn_blocking(move || serve(session, queue));

        let mut tasks = JoinSet::new();
        tasks.spawn(periodic(
            config.instantaneous_power_period,
            Request::InstantaneousPower,
            jobs.clone(),
            Arc::clone(&sink),
        ));
        tasks.spawn(periodic(
            config.cumulative_energy_period,
            Request::CumulativeEnergy,
            jobs,
            sink,
        ));

        let result = tokio::select! {
            Some(r) = tasks.join_next() => r.map_err(Error::from).and_then(|r| r),
            _ = cancel.cancelled() => {
                tracing::info!("polling cancelled");
                Ok(())
            }
        };

        // 要求の送り手がいなくなるとworkerは終わる
        tasks.shutdown().await;
        worker.await?;
        result
    }
}
