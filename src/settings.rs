// 設定ファイル
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::polling::PollingConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub polling: PollingSettings,
}

/// [polling] 秒単位
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PollingSettings {
    /// 瞬時電力の読み出し間隔
    pub instantaneous_power_secs: u64,
    /// 定時積算電力量の読み出し間隔
    pub cumulative_energy_secs: u64,
    /// 接続後の読み込みタイムアウト
    pub read_timeout_secs: u64,
    /// 接続手順中の読み込みタイムアウト
    pub setup_read_timeout_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            instantaneous_power_secs: 1,
            cumulative_energy_secs: 10,
            read_timeout_secs: 10,
            setup_read_timeout_secs: 60,
        }
    }
}

impl PollingSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn setup_read_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_read_timeout_secs)
    }
}

impl From<&PollingSettings> for PollingConfig {
    fn from(settings: &PollingSettings) -> Self {
        PollingConfig {
            instantaneous_power_period: Duration::from_secs(settings.instantaneous_power_secs),
            cumulative_energy_period: Duration::from_secs(settings.cumulative_energy_secs),
        }
    }
}

impl Settings {
    /// 設定ファイルを読む(ファイルが無ければ既定値)
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(file) => Self::from_toml(&file)
                .with_context(|| format!("\"{}\" parse error.", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("\"{}\" not found, using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("\"{}\" read error.", path.display()))
            }
        }
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let settings = toml::from_str::<Settings>(s)?;
        for (key, secs) in [
            ("instantaneous_power_secs", settings.polling.instantaneous_power_secs),
            ("cumulative_energy_secs", settings.polling.cumulative_energy_secs),
        ] {
            // tokio::time::interval は0を受け付けない
            anyhow::ensure!(secs > 0, "{} must be greater than 0", key);
        }
        Ok(settings)
    }
}

#[test]
fn test1() {
    let settings = Settings::from_toml("").unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(
        PollingConfig::from(&settings.polling),
        PollingConfig::default()
    );
    assert_eq!(settings.polling.read_timeout(), Duration::from_secs(10));
    assert_eq!(settings.polling.setup_read_timeout(), Duration::from_secs(60));
}

#[test]
fn test2() {
    let settings = Settings::from_toml(
        r#"
# broute設定ファイル
[polling]
instantaneous_power_secs = 5
read_timeout_secs = 3
"#,
    )
    .unwrap();
    assert_eq!(settings.polling.instantaneous_power_secs, 5);
    assert_eq!(settings.polling.cumulative_energy_secs, 10);
    assert_eq!(settings.polling.read_timeout(), Duration::from_secs(3));

    let round_trip = Settings::from_toml(&toml::to_string_pretty(&settings).unwrap()).unwrap();
    assert_eq!(round_trip, settings);
}

#[test]
fn test3() {
    assert!(Settings::from_toml("[polling]\ninstantaneous_power_secs = 0").is_err());
    assert!(Settings::from_toml("[polling]\nread_timeout_secs = \"ten\"").is_err());
    assert_eq!(
        Settings::from_file("no/such/broute.toml").unwrap(),
        Settings::default()
    );
}
