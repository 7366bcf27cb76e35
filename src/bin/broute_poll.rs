// スマートメーターに接続して瞬時電力と定時積算電力量を定期的に表示する。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use anyhow::{Context, anyhow};
use broute_monitor::polling::{Measurement, MeasurementSink, PollingConfig, PollingScheduler};
use broute_monitor::settings::Settings;
use broute_monitor::skstack::{self, CommandSession, LineTransport, NetworkJoin, Session, authn};
use chrono_tz::Asia;
use clap::Parser;
use serialport::{DataBits, SerialPort, StopBits};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// スマートメーターBルートから瞬時電力と定時積算電力量を読み出す。
#[derive(Parser, Debug)]
#[command(name = "broute_poll")]
#[command(version, about, long_about = None)]
struct Cli {
    /// シリアルデバイス名
    #[arg(short = 'p', long, env = "SERIAL_DEVICE")]
    port: String,

    /// ルートBID(32文字)
    #[arg(short = 'i', long, env = "ROUTE_B_ID", hide_env_values = true)]
    id: String,

    /// ルートBパスワード(12文字)
    #[arg(short = 'P', long, env = "ROUTE_B_PASSWORD", hide_env_values = true)]
    password: String,

    /// 送受信をすべてログに出す
    #[arg(short = 'd', long)]
    debug: bool,

    /// 設定ファイル名
    #[arg(short = 'S', long, default_value = "broute.toml")]
    config_file: String,
}

/// 標準出力に表示する
struct ConsoleSink;

impl MeasurementSink for ConsoleSink {
    fn emit(&self, measurement: Measurement) {
        match measurement {
            Measurement::InstantaneousPower { recorded_at, power } => {
                let jst = recorded_at.with_timezone(&Asia::Tokyo);
                println!("{} {:>6} W", jst.format("%Y-%m-%d %H:%M:%S"), power.watt());
            }
            Measurement::CumulativeEnergy { reading, kwh, .. } => {
                println!(
                    "{} {:>10} kWh",
                    reading.time_point.format("%Y-%m-%d %H:%M:%S"),
                    kwh
                );
            }
        }
    }
}

/// シリアルポートを開く
fn open_port(port_name: &str, timeout: Duration) -> anyhow::Result<Box<dyn SerialPort>> {
    let builder = serialport::new(port_name, 115200)
        .stop_bits(StopBits::One)
        .data_bits(DataBits::Eight)
        .timeout(timeout);

    builder
        .open()
        .with_context(move || format!("Failed to open \"{}\".", port_name))
}

/// スマートメーターと接続する
fn connect(
    port: Box<dyn SerialPort>,
    credentials: authn::Credentials,
) -> anyhow::Result<Session<Box<dyn SerialPort>>> {
    let mut command = CommandSession::new(LineTransport::new(port));
    let version = command.version().context("SKVER")?;
    tracing::info!("SKSTACK/IP version {}", version);
    let session = NetworkJoin::new(command, credentials).run()?;
    tracing::info!(
        "joined. {:?} channel:{} pan id:{} address:{}",
        session.credentials(),
        session.network().channel,
        session.network().pan_id,
        session.address()
    );
    Ok(session)
}

async fn exec_polling(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::from_file(&cli.config_file)?;
    let credentials = authn::Credentials {
        id: authn::Id::from_str(&cli.id).map_err(|s| anyhow!(s))?,
        password: authn::Password::from_str(&cli.password).map_err(|s| anyhow!(s))?,
    };

    // シリアルポートを開いて送受信バッファを空にする
    let mut port = open_port(&cli.port, settings.polling.setup_read_timeout())?;
    skstack::Port::reset_buffers(&mut port).context("Failed to clear buffers")?;

    // 接続手順はブロッキングで進める
    let mut session = tokio::task::spawn_blocking(move || connect(port, credentials)).await??;
    session.set_read_timeout(settings.polling.read_timeout())?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                cancel.cancel();
            }
        })
    };

    let scheduler = PollingScheduler::new(session, PollingConfig::from(&settings.polling));
    let result = scheduler.run(Arc::new(ConsoleSink), cancel).await;
    interrupt.abort();
    Ok(result?)
}

// SKSETPWD C 以降のパスワードを伏せる
fn mask_route_b_password(buf: &mut String) {
    const PATTERN: &str = "SKSETPWD C ";
    let mut from = 0;
    while let Some(pos) = buf[from..].find(PATTERN) {
        let start = from + pos + PATTERN.len();
        let end = buf[start..]
            .char_indices()
            .take_while(|(_, c)| !c.is_whitespace() && *c != '\\')
            .take(12)
            .last()
            .map_or(start, |(n, c)| start + n + c.len_utf8());
        buf.replace_range(start..end, &"#".repeat(buf[start..end].chars().count()));
        from = end;
    }
}

/// SKSETPWD C 以降のパスワードをマスクするフォーマッタ
struct MaskingRouteBPasswordFormatter<F> {
    inner: F,
}

impl<S, N, F> FormatEvent<S, N> for MaskingRouteBPasswordFormatter<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        // まず内側のフォーマットでバッファに書き出す
        let mut buf = String::new();
        self.inner
            .format_event(ctx, fmt::format::Writer::new(&mut buf), event)?;
        mask_route_b_password(&mut buf);
        writer.write_str(&buf)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // プログラムの情報
    let git_head_ref = built_info::GIT_HEAD_REF.unwrap_or_default();
    let app_info = format!(
        "{} / {}{}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT
            .map(|s| format!(" ({s} - {git_head_ref})"))
            .unwrap_or_default()
    );

    let _ = dotenv::dotenv();

    // コマンドライン引数
    let cli = Cli::parse();

    // デバッグレベルは RUST_LOG 環境変数で設定できる
    let default_level = if cli.debug { "trace" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // tracingの設定
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(MaskingRouteBPasswordFormatter {
                    inner: fmt::format()
                        .with_timer(fmt::time::LocalTime::rfc_3339())
                        .with_file(false)
                        .with_line_number(false)
                        .with_thread_names(false)
                        .with_thread_ids(false)
                        .with_ansi(false),
                }),
        )
        .init();

    tracing::info!("{app_info} started.");
    match exec_polling(cli).await {
        Ok(()) => {
            tracing::info!("{app_info} finished.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{app_info} aborted, reason: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[test]
fn test_mask_route_b_password() {
    let mut buf = "Tx-> SKSETPWD C PASSWORD1234\\r\\n".to_string();
    mask_route_b_password(&mut buf);
    assert_eq!(buf, "Tx-> SKSETPWD C ############\\r\\n");

    let mut buf = "SKSETPWD C PASSWORD1234 OK\nSKSETPWD C abc".to_string();
    mask_route_b_password(&mut buf);
    assert_eq!(buf, "SKSETPWD C ############ OK\nSKSETPWD C ###");

    let mut buf = "SKSETRBID 0123456789ABCDEF0123456789ABCDEF".to_string();
    mask_route_b_password(&mut buf);
    assert_eq!(buf, "SKSETRBID 0123456789ABCDEF0123456789ABCDEF");
}
