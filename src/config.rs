use epc901::{CaptureConfig, PollLimit};

/// 1回の露光時間の上限 (10秒)
pub const MAX_EXPOSURE_US: u32 = 10_000_000;

/// アプリケーション設定
///
/// この構造体はビルド時に`cfg.toml`ファイルから読み込まれた設定を保持します。
#[toml_cfg::toml_config]
pub struct Config {
    #[default(0x15)]
    sensor_address: u8,

    #[default(1000)]
    exposure_us: u32,

    #[default(115200)]
    serial_baudrate: u32,

    #[default(100)]
    command_poll_ms: u32,

    #[default(100)]
    control_timeout_ms: u32,

    #[default(100000)] // 100ms
    data_ready_timeout_us: u32,

    #[default(10000)]
    rx_ready_spins: u32,

    #[default(false)]
    clear_before_exposure: bool,

    #[default(100)]
    i2c_baudrate_khz: u32,
}

/// 設定エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("無効なセンサーI2Cアドレス (0x01-0x7F): 0x{0:02X}")]
    InvalidSensorAddress(u8),
    #[error("露光時間が長すぎます (最大10秒): {0}µs")]
    InvalidExposure(u32),
    #[error("{0} に0は設定できません")]
    ZeroValue(&'static str),
}

/// 検証済みのアプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// センサーの7ビットI2Cアドレス
    pub sensor_address: u8,

    /// 露光時間（µs）
    pub exposure_us: u32,

    /// コマンド用シリアルのボーレート
    pub serial_baudrate: u32,

    /// コマンド受信を1回待つ時間（ミリ秒）
    pub command_poll_ms: u32,

    /// I2Cクロック（kHz）
    pub i2c_baudrate_khz: u32,

    /// キャプチャエンジンの設定
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// 設定ファイルから設定をロードします
    pub fn load() -> Result<Self, ConfigError> {
        // toml_cfg によって生成された定数
        Self::from_config(&CONFIG)
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let sensor_address = parse_sensor_address(config.sensor_address)?;
        let exposure_us = parse_exposure_us(config.exposure_us)?;

        let capture = CaptureConfig::new()
            .with_control_timeout(non_zero("control_timeout_ms", config.control_timeout_ms)?)
            .with_data_ready_limit(PollLimit::Micros(non_zero(
                "data_ready_timeout_us",
                config.data_ready_timeout_us,
            )?))
            .with_rx_ready_limit(PollLimit::Spins(non_zero(
                "rx_ready_spins",
                config.rx_ready_spins,
            )?))
            .with_clear_before_exposure(config.clear_before_exposure);

        Ok(AppConfig {
            sensor_address,
            exposure_us,
            serial_baudrate: non_zero("serial_baudrate", config.serial_baudrate)?,
            command_poll_ms: non_zero("command_poll_ms", config.command_poll_ms)?,
            i2c_baudrate_khz: non_zero("i2c_baudrate_khz", config.i2c_baudrate_khz)?,
            capture,
        })
    }
}

/// 7ビットアドレスとして有効か確認する (0は一般呼び出し用)
pub fn parse_sensor_address(value: u8) -> Result<u8, ConfigError> {
    if value == 0 || value > 0x7F {
        return Err(ConfigError::InvalidSensorAddress(value));
    }
    Ok(value)
}

pub fn parse_exposure_us(value: u32) -> Result<u32, ConfigError> {
    if value > MAX_EXPOSURE_US {
        return Err(ConfigError::InvalidExposure(value));
    }
    Ok(value)
}

fn non_zero(name: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroValue(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            sensor_address: 0x15,
            exposure_us: 1000,
            serial_baudrate: 115_200,
            command_poll_ms: 100,
            control_timeout_ms: 100,
            data_ready_timeout_us: 100_000,
            rx_ready_spins: 10_000,
            clear_before_exposure: false,
            i2c_baudrate_khz: 100,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::from_config(&base()).unwrap();
        assert_eq!(config.sensor_address, 0x15);
        assert_eq!(config.exposure_us, 1000);
        assert_eq!(config.serial_baudrate, 115_200);
        assert_eq!(config.command_poll_ms, 100);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_sensor_address_range() {
        assert_eq!(parse_sensor_address(0x15), Ok(0x15));
        assert_eq!(parse_sensor_address(0x7F), Ok(0x7F));
        assert_eq!(parse_sensor_address(0x00), Err(ConfigError::InvalidSensorAddress(0x00)));
        assert_eq!(parse_sensor_address(0x80), Err(ConfigError::InvalidSensorAddress(0x80)));
    }

    #[test]
    fn test_exposure_limit() {
        assert_eq!(parse_exposure_us(0), Ok(0));
        assert_eq!(parse_exposure_us(MAX_EXPOSURE_US), Ok(MAX_EXPOSURE_US));
        assert!(parse_exposure_us(MAX_EXPOSURE_US + 1).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = base();
        config.data_ready_timeout_us = 0;
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::ZeroValue("data_ready_timeout_us"))
        );
    }

    #[test]
    fn test_zero_command_poll_is_rejected() {
        let mut config = base();
        config.command_poll_ms = 0;
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::ZeroValue("command_poll_ms"))
        );

        let mut config = base();
        config.serial_baudrate = 0;
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::ZeroValue("serial_baudrate"))
        );
    }

    #[test]
    fn test_clear_flag_is_forwarded() {
        let mut config = base();
        config.clear_before_exposure = true;
        config.rx_ready_spins = 42;
        let app = AppConfig::from_config(&config).unwrap();
        assert!(app.capture.clear_before_exposure);
        assert_eq!(app.capture.rx_ready_limit, PollLimit::Spins(42));
    }
}
