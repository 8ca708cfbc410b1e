//! GPIOで同期シリアルバスを駆動するピクセルバス実装
//!
//! - CPOL=0, CPHA=0 (立ち上がりでサンプル)
//! - MSBファースト
//! - `read_byte` のたびに8クロック出す。送信データ線は持たない
//!   (ADCへの送信内容は使われないため)。

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::ErrorKind;

use crate::bus::PixelBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftSpiError {
    /// GPIO操作に失敗した
    Pin,
    /// 転送を開始せずに読み出した
    NoTransfer,
}

impl embedded_hal::spi::Error for SoftSpiError {
    fn kind(&self) -> ErrorKind {
        match self {
            SoftSpiError::Pin => ErrorKind::Other,
            SoftSpiError::NoTransfer => ErrorKind::Overrun,
        }
    }
}

pub struct SoftSpiPixelBus<SCK, MISO, CS, D> {
    sck: SCK,
    miso: MISO,
    cs: CS,
    delay: D,
    half_period_ns: u32,
    pending: u8,
    locked: bool,
}

impl<SCK, MISO, CS, D> SoftSpiPixelBus<SCK, MISO, CS, D>
where
    SCK: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
    D: DelayNs,
{
    /// クロックLow、CS Highの状態で作成する
    ///
    /// `half_period_ns` はクロックの半周期。0なら待ちを入れない。
    pub fn new(
        mut sck: SCK,
        miso: MISO,
        mut cs: CS,
        delay: D,
        half_period_ns: u32,
    ) -> Result<Self, SoftSpiError> {
        sck.set_low().map_err(|_| SoftSpiError::Pin)?;
        cs.set_high().map_err(|_| SoftSpiError::Pin)?;
        Ok(Self {
            sck,
            miso,
            cs,
            delay,
            half_period_ns,
            pending: 0,
            locked: false,
        })
    }

    pub fn release(self) -> (SCK, MISO, CS, D) {
        (self.sck, self.miso, self.cs, self.delay)
    }

    fn half_period(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }

    fn clock_in_byte(&mut self) -> Result<u8, SoftSpiError> {
        let mut rx = 0u8;
        for bit in (0..8).rev() {
            self.half_period();
            self.sck.set_high().map_err(|_| SoftSpiError::Pin)?;
            if self.miso.is_high().map_err(|_| SoftSpiError::Pin)? {
                rx |= 1 << bit;
            }
            self.half_period();
            self.sck.set_low().map_err(|_| SoftSpiError::Pin)?;
        }
        Ok(rx)
    }
}

impl<SCK, MISO, CS, D> PixelBus for SoftSpiPixelBus<SCK, MISO, CS, D>
where
    SCK: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
    D: DelayNs,
{
    type Error = SoftSpiError;

    // クロックは1バイト読み出しごとに出す
    fn configure(&mut self) -> Result<(), SoftSpiError> {
        self.pending = 0;
        self.sck.set_low().map_err(|_| SoftSpiError::Pin)
    }

    fn try_lock(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn select(&mut self) -> Result<(), SoftSpiError> {
        self.cs.set_low().map_err(|_| SoftSpiError::Pin)
    }

    fn deselect(&mut self) -> Result<(), SoftSpiError> {
        self.cs.set_high().map_err(|_| SoftSpiError::Pin)
    }

    fn start_transfer(&mut self, _word: u16) -> Result<(), SoftSpiError> {
        self.pending = 2;
        Ok(())
    }

    fn rx_ready(&mut self) -> Result<bool, SoftSpiError> {
        Ok(self.pending > 0)
    }

    fn read_byte(&mut self) -> Result<u8, SoftSpiError> {
        if self.pending == 0 {
            return Err(SoftSpiError::NoTransfer);
        }
        let byte = self.clock_in_byte()?;
        self.pending -= 1;
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::rc::Rc;

    use embedded_hal::digital::ErrorType;

    type Log = Rc<RefCell<Vec<(&'static str, bool)>>>;

    struct LoggedPin {
        name: &'static str,
        log: Log,
    }

    impl ErrorType for LoggedPin {
        type Error = Infallible;
    }

    impl OutputPin for LoggedPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push((self.name, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push((self.name, true));
            Ok(())
        }
    }

    struct ScriptedInput {
        bits: VecDeque<bool>,
    }

    impl ScriptedInput {
        fn from_bytes(bytes: &[u8]) -> Self {
            let bits = bytes
                .iter()
                .flat_map(|byte| (0..8).rev().map(move |bit| byte & (1 << bit) != 0))
                .collect();
            Self { bits }
        }
    }

    impl ErrorType for ScriptedInput {
        type Error = Infallible;
    }

    impl InputPin for ScriptedInput {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.bits.pop_front().unwrap_or(false))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn bus(bytes: &[u8], log: &Log) -> SoftSpiPixelBus<LoggedPin, ScriptedInput, LoggedPin, NoDelay> {
        SoftSpiPixelBus::new(
            LoggedPin {
                name: "sck",
                log: Rc::clone(log),
            },
            ScriptedInput::from_bytes(bytes),
            LoggedPin {
                name: "cs",
                log: Rc::clone(log),
            },
            NoDelay,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_new_idles_clock_low_and_cs_high() {
        let log = Log::default();
        let _bus = bus(&[], &log);
        assert_eq!(*log.borrow(), vec![("sck", false), ("cs", true)]);
    }

    #[test]
    fn test_reads_msb_first() {
        let log = Log::default();
        let mut bus = bus(&[0x40, 0x02], &log);

        bus.start_transfer(0).unwrap();
        assert!(bus.rx_ready().unwrap());
        assert_eq!(bus.read_byte().unwrap(), 0x40);
        assert!(bus.rx_ready().unwrap());
        assert_eq!(bus.read_byte().unwrap(), 0x02);
        assert!(!bus.rx_ready().unwrap());
    }

    #[test]
    fn test_eight_clocks_per_byte() {
        let log = Log::default();
        let mut bus = bus(&[0xFF], &log);
        log.borrow_mut().clear();

        bus.start_transfer(0).unwrap();
        bus.read_byte().unwrap();
        let rising = log
            .borrow()
            .iter()
            .filter(|entry| **entry == ("sck", true))
            .count();
        assert_eq!(rising, 8);
        assert_eq!(log.borrow().last(), Some(&("sck", false)));
    }

    #[test]
    fn test_read_without_transfer_fails() {
        let log = Log::default();
        let mut bus = bus(&[], &log);
        assert_eq!(bus.read_byte(), Err(SoftSpiError::NoTransfer));
    }

    #[test]
    fn test_chip_select_levels() {
        let log = Log::default();
        let mut bus = bus(&[], &log);
        log.borrow_mut().clear();

        bus.select().unwrap();
        bus.deselect().unwrap();
        assert_eq!(*log.borrow(), vec![("cs", false), ("cs", true)]);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let log = Log::default();
        let mut bus = bus(&[], &log);
        assert!(bus.try_lock());
        assert!(!bus.try_lock());
        bus.unlock();
        assert!(bus.try_lock());
    }
}
