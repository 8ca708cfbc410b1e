/*!
 * # EPC901 ラインセンサー ドライバー
 *
 * 1024画素のEPC901ラインセンサーを、外付けADC + 同期シリアルバス経由で
 * 読み出すためのドライバー。
 *
 * ## モジュール構成
 * - `bus`: 制御バス (I2C) とピクセルバスのインターフェース
 * - `lines`: センサー制御用のデジタル信号線
 * - `sensor`: 電源シーケンス・露光・画素読み出しを行うキャプチャエンジン
 * - `soft_spi`: GPIOによるソフトウェアSPIのピクセルバス実装
 * - `sim`: ハードウェアなしで動作する模擬センサー (feature `sim`)
 */

pub mod bus;
pub mod config;
pub mod error;
pub mod lines;
pub mod pixel;
pub mod poll;
pub mod sensor;
pub mod soft_spi;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use bus::{BusLock, ControlBus, ControlBusError, HalControlBus, PixelBus};
pub use config::CaptureConfig;
pub use error::{Error, Result};
pub use lines::{Line, SensorLines};
pub use pixel::{combine_sample, PIPELINE_DISCARD, PIXEL_COUNT};
pub use poll::{PollLimit, WaitTarget};
pub use sensor::{Epc901, DEFAULT_ADDRESS};
pub use soft_spi::{SoftSpiError, SoftSpiPixelBus};
