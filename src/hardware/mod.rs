pub mod control_bus;
pub mod pins;

pub use control_bus::EspControlBus;
pub use pins::{BoardPins, ConsolePins, SensorPins};

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyOutputPin, Gpio34, Gpio35, Input, Output, PinDriver};
use esp_idf_hal::i2c::{I2c, I2cConfig, I2cDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::units::FromValueType;
use log::info;

use epc901::{Epc901, SensorLines, SoftSpiPixelBus};

use crate::config::AppConfig;

/// ソフトウェアSPIのクロック半周期。GPIO操作自体が十分遅いので待ちは入れない
const SOFT_SPI_HALF_PERIOD_NS: u32 = 0;

pub type OutputLine = PinDriver<'static, AnyOutputPin, Output>;
pub type DataReadyInput = PinDriver<'static, Gpio34, Input>;
pub type EspPixelBus = SoftSpiPixelBus<OutputLine, PinDriver<'static, Gpio35, Input>, OutputLine, Ets>;
pub type EspEpc901 = Epc901<EspControlBus<'static>, EspPixelBus, OutputLine, DataReadyInput, Ets>;

/// ピンとI2CペリフェラルからEPC901ドライバを組み立てる
///
/// センサーはまだ初期化されていないので、呼び出し側で`init`すること。
pub fn build_sensor<I2C: I2c>(
    i2c: impl Peripheral<P = I2C> + 'static,
    pins: SensorPins,
    config: &AppConfig,
) -> anyhow::Result<EspEpc901> {
    info!(
        "I2Cを初期化しています ({}kHz, アドレス 0x{:02X})",
        config.i2c_baudrate_khz, config.sensor_address
    );
    let i2c_config = I2cConfig::new().baudrate(config.i2c_baudrate_khz.kHz().into());
    let i2c = I2cDriver::new(i2c, pins.sda, pins.scl, &i2c_config)?;

    let lines = SensorLines::new(
        output(pins.power_down.into())?,
        output(pins.clear_data.into())?,
        output(pins.clear_pixel.into())?,
        output(pins.shutter.into())?,
        output(pins.read.into())?,
        PinDriver::input(pins.data_ready)?,
    );

    let pixel_bus = SoftSpiPixelBus::new(
        output(pins.sck.into())?,
        PinDriver::input(pins.miso)?,
        output(pins.adc_cs.into())?,
        Ets,
        SOFT_SPI_HALF_PERIOD_NS,
    )
    .map_err(|e| anyhow::anyhow!("ピクセルバスの初期化に失敗しました: {:?}", e))?;

    Ok(Epc901::new(
        EspControlBus::new(i2c),
        config.sensor_address,
        pixel_bus,
        lines,
        Ets,
        config.capture.clone(),
    ))
}

fn output(pin: AnyOutputPin) -> anyhow::Result<OutputLine> {
    Ok(PinDriver::output(pin)?)
}
