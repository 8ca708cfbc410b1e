use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use esp_idf_hal::delay::TickType;
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::{EspError, ESP_ERR_TIMEOUT, ESP_FAIL};

use epc901::{ControlBus, ControlBusError};

/// ESP-IDFのI2Cドライバを使った制御バス
///
/// アドレスは8ビット形式で受け取り、ドライバには7ビットで渡す。
/// タイムアウトはFreeRTOSのティックに変換してドライバに渡す。
pub struct EspControlBus<'d> {
    driver: I2cDriver<'d>,
}

impl<'d> EspControlBus<'d> {
    pub fn new(driver: I2cDriver<'d>) -> Self {
        Self { driver }
    }

    pub fn release(self) -> I2cDriver<'d> {
        self.driver
    }
}

fn ticks(timeout_ms: u32) -> u32 {
    TickType::new_millis(u64::from(timeout_ms)).ticks()
}

fn map_error(error: EspError) -> ControlBusError {
    let code = error.code();
    if code == ESP_ERR_TIMEOUT as i32 {
        ControlBusError::Timeout
    } else if code == ESP_FAIL as i32 {
        // ESP-IDFはNACKをESP_FAILで返す
        ControlBusError::Bus(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown))
    } else {
        ControlBusError::Bus(ErrorKind::Other)
    }
}

impl ControlBus for EspControlBus<'_> {
    fn read_register(&mut self, address: u8, register: u8, timeout_ms: u32) -> Result<u8, ControlBusError> {
        let mut value = [0u8];
        self.driver
            .write_read(address >> 1, &[register], &mut value, ticks(timeout_ms))
            .map_err(map_error)?;
        Ok(value[0])
    }

    fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
        timeout_ms: u32,
    ) -> Result<(), ControlBusError> {
        self.transmit(address, &[register, value], timeout_ms)
    }

    fn transmit(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<(), ControlBusError> {
        self.driver
            .write(address >> 1, data, ticks(timeout_ms))
            .map_err(map_error)
    }
}
