use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config::Config, Uart, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_sys::{EspError, ESP_ERR_TIMEOUT};
use log::debug;

use super::{SerialError, SerialPort, SerialResult};

impl From<EspError> for SerialError {
    fn from(error: EspError) -> Self {
        if error.code() == ESP_ERR_TIMEOUT as i32 {
            SerialError::Timeout
        } else {
            SerialError::Read(format!("ESP-IDF error: {}", error))
        }
    }
}

/// コマンド用のUARTポート
///
/// UART0はESP-IDFのログ出力に使われるので、別のUARTを割り当てる。
pub struct UartPort<'d> {
    driver: UartDriver<'d>,
}

impl<'d> UartPort<'d> {
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        baudrate: u32,
    ) -> SerialResult<Self> {
        let config = Config::new().baudrate(Hertz(baudrate));
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )
        .map_err(|e| SerialError::Write(format!("UART initialization failed: {}", e)))?;

        debug!("コマンド用UARTを初期化しました ({}bps)", baudrate);
        Ok(Self { driver })
    }
}

impl SerialPort for UartPort<'_> {
    fn write(&mut self, data: &[u8]) -> SerialResult<usize> {
        self.driver
            .write(data)
            .map_err(|e| SerialError::Write(format!("ESP-IDF error: {}", e)))
    }

    fn read(&mut self, buffer: &mut [u8], timeout_ms: u32) -> SerialResult<usize> {
        let ticks = TickType::new_millis(u64::from(timeout_ms)).ticks();
        match self.driver.read(buffer, ticks) {
            Ok(read) => Ok(read),
            Err(e) => match SerialError::from(e) {
                SerialError::Timeout => Ok(0),
                other => Err(other),
            },
        }
    }
}
