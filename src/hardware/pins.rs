use esp_idf_hal::gpio::*;

/// EPC901ブレイクアウトボードのピン設定 (ESP32-WROOM-32)
///
/// DATA_RDYとADCのデータ線は入力専用ピンに割り当てている。
pub struct SensorPins {
    pub power_down: Gpio4,
    pub clear_data: Gpio16,
    pub clear_pixel: Gpio17,
    pub shutter: Gpio18,
    pub read: Gpio19,
    pub data_ready: Gpio34,
    pub adc_cs: Gpio27,
    pub sck: Gpio14,
    pub miso: Gpio35,
    pub sda: Gpio21,
    pub scl: Gpio22,
}

/// コマンド用UARTのピン
pub struct ConsolePins {
    pub tx: Gpio25,
    pub rx: Gpio26,
}

/// ボード全体のピン設定
pub struct BoardPins {
    pub sensor: SensorPins,
    pub console: ConsolePins,
}

impl BoardPins {
    /// ボードのピン一式から作成
    pub fn from_pins(pins: Pins) -> Self {
        Self {
            sensor: SensorPins {
                power_down: pins.gpio4,
                clear_data: pins.gpio16,
                clear_pixel: pins.gpio17,
                shutter: pins.gpio18,
                read: pins.gpio19,
                data_ready: pins.gpio34,
                adc_cs: pins.gpio27,
                sck: pins.gpio14,
                miso: pins.gpio35,
                sda: pins.gpio21,
                scl: pins.gpio22,
            },
            console: ConsolePins {
                tx: pins.gpio25,
                rx: pins.gpio26,
            },
        }
    }
}
