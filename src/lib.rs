/*!
 * # EPC901 Breakout Camera Firmware
 *
 * ホストからのシリアルコマンドでEPC901ラインセンサーを撮影し、
 * 画素データを返すファームウェア
 *
 * ## モジュール構成
 * - `config`: ビルド時設定 (`cfg.toml`) と検証
 * - `command`: シリアルコマンドの解析
 * - `console`: コマンドの実行と応答
 * - `serial`: コマンド用シリアルポート (UART / Mock)
 * - `summary`: 撮影したラインの簡易統計
 * - `hardware`: ESP32のピン割り当てと制御バス実装 (ESP-IDFビルドのみ)
 */

pub mod command;
pub mod config;
pub mod console;
#[cfg(target_os = "espidf")]
pub mod hardware;
pub mod serial;
pub mod summary;

pub use config::{AppConfig, ConfigError};
pub use console::{Console, LineCamera};
pub use summary::LineSummary;

/// ファームウェアのバージョン情報
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
