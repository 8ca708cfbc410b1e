use core::ops::{Deref, DerefMut};

use embedded_hal::i2c::{self, I2c};

use crate::error::{Error, Result};

/// 制御バス (I2C) 通信のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlBusError {
    #[error("応答がタイムアウトしました")]
    Timeout,
    #[error("{0:?}")]
    Bus(i2c::ErrorKind),
}

/// 制御バスのインターフェース
///
/// `address` は7ビットアドレスを1ビット左シフトした8ビット表現。
/// 一般呼び出し (ブロードキャスト) は `0`。
pub trait ControlBus {
    /// 1バイトのレジスタを読み出す
    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        timeout_ms: u32,
    ) -> core::result::Result<u8, ControlBusError>;

    /// 1バイトのレジスタに書き込む
    fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
        timeout_ms: u32,
    ) -> core::result::Result<(), ControlBusError>;

    /// レジスタアドレスなしでバイト列を送信する
    fn transmit(
        &mut self,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> core::result::Result<(), ControlBusError>;
}

/// 任意の `embedded_hal::i2c::I2c` を制御バスとして使うアダプター
///
/// タイムアウトはI2Cドライバー側の設定に従う。
#[derive(Debug)]
pub struct HalControlBus<I> {
    i2c: I,
}

impl<I: I2c> HalControlBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

fn hal_error<E: i2c::Error>(e: E) -> ControlBusError {
    ControlBusError::Bus(e.kind())
}

impl<I: I2c> ControlBus for HalControlBus<I> {
    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        _timeout_ms: u32,
    ) -> core::result::Result<u8, ControlBusError> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(address >> 1, &[register], &mut value)
            .map_err(hal_error)?;
        Ok(value[0])
    }

    fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
        _timeout_ms: u32,
    ) -> core::result::Result<(), ControlBusError> {
        self.i2c
            .write(address >> 1, &[register, value])
            .map_err(hal_error)
    }

    fn transmit(
        &mut self,
        address: u8,
        data: &[u8],
        _timeout_ms: u32,
    ) -> core::result::Result<(), ControlBusError> {
        self.i2c.write(address >> 1, data).map_err(hal_error)
    }
}

/// ADCから画素データを受け取る同期シリアルバス
///
/// ADCのチップセレクトもこのバスが管理する。
pub trait PixelBus {
    type Error: embedded_hal::spi::Error;

    /// 1バイト受信ごとに受信完了となるよう設定し、バスを有効化する
    fn configure(&mut self) -> core::result::Result<(), Self::Error>;

    /// バスの排他使用を試みる。既に使用中なら `false`。
    fn try_lock(&mut self) -> bool;

    fn unlock(&mut self);

    /// ADCのチップセレクトをアサートする (Low)
    fn select(&mut self) -> core::result::Result<(), Self::Error>;

    /// ADCのチップセレクトを解除する (High)
    fn deselect(&mut self) -> core::result::Result<(), Self::Error>;

    /// 2バイト転送を開始する。`word` の内容はADC側では使われない。
    fn start_transfer(&mut self, word: u16) -> core::result::Result<(), Self::Error>;

    /// 受信済みバイトがあるか
    fn rx_ready(&mut self) -> core::result::Result<bool, Self::Error>;

    /// 受信済みバイトを1つ取り出す
    fn read_byte(&mut self) -> core::result::Result<u8, Self::Error>;
}

/// ピクセルバスの排他ロック。スコープを抜けると必ず解放される。
pub struct BusLock<'a, P: PixelBus> {
    bus: &'a mut P,
}

impl<'a, P: PixelBus> BusLock<'a, P> {
    pub fn acquire(bus: &'a mut P) -> Result<Self> {
        if bus.try_lock() {
            Ok(Self { bus })
        } else {
            Err(Error::PixelBusBusy)
        }
    }
}

impl<P: PixelBus> Deref for BusLock<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.bus
    }
}

impl<P: PixelBus> DerefMut for BusLock<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.bus
    }
}

impl<P: PixelBus> Drop for BusLock<'_, P> {
    fn drop(&mut self) {
        self.bus.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct LockOnlyBus {
        locked: bool,
        unlocks: usize,
    }

    impl PixelBus for LockOnlyBus {
        type Error = Infallible;

        fn configure(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
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
            self.unlocks += 1;
        }

        fn select(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }

        fn deselect(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }

        fn start_transfer(&mut self, _word: u16) -> core::result::Result<(), Infallible> {
            Ok(())
        }

        fn rx_ready(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(true)
        }

        fn read_byte(&mut self) -> core::result::Result<u8, Infallible> {
            Ok(0)
        }
    }

    /// 発行されたI2C操作を記録するバス
    #[derive(Default)]
    struct RecordingI2c {
        ops: Vec<(u8, Vec<u8>, usize)>,
        reply: u8,
        nack: bool,
    }

    impl i2c::ErrorType for RecordingI2c {
        type Error = i2c::ErrorKind;
    }

    impl I2c for RecordingI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [i2c::Operation<'_>],
        ) -> core::result::Result<(), i2c::ErrorKind> {
            if self.nack {
                return Err(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
            }
            let mut written = Vec::new();
            let mut read_len = 0;
            for operation in operations.iter_mut() {
                match operation {
                    i2c::Operation::Write(bytes) => written.extend_from_slice(bytes),
                    i2c::Operation::Read(buffer) => {
                        buffer.fill(self.reply);
                        read_len += buffer.len();
                    }
                }
            }
            self.ops.push((address, written, read_len));
            Ok(())
        }
    }

    #[test]
    fn test_hal_register_read_uses_7bit_address() {
        let mut bus = HalControlBus::new(RecordingI2c {
            reply: 0x03,
            ..Default::default()
        });
        assert_eq!(bus.read_register(0x2A, 0xFF, 100), Ok(0x03));
        assert_eq!(bus.release().ops, vec![(0x15, vec![0xFF], 1)]);
    }

    #[test]
    fn test_hal_register_write_and_general_call() {
        let mut bus = HalControlBus::new(RecordingI2c::default());
        bus.write_register(0x2A, 0x0B, 0x77, 100).unwrap();
        bus.transmit(0x00, &[6], 100).unwrap();
        assert_eq!(
            bus.release().ops,
            vec![(0x15, vec![0x0B, 0x77], 0), (0x00, vec![6], 0)]
        );
    }

    #[test]
    fn test_hal_error_kind_is_kept() {
        let mut bus = HalControlBus::new(RecordingI2c {
            nack: true,
            ..Default::default()
        });
        assert_eq!(
            bus.read_register(0x2A, 0xFF, 100),
            Err(ControlBusError::Bus(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address
            )))
        );
    }

    #[test]
    fn test_lock_released_on_drop() {
        let mut bus = LockOnlyBus::default();
        {
            let guard = BusLock::acquire(&mut bus).unwrap();
            assert!(guard.locked);
        }
        assert!(!bus.locked);
        assert_eq!(bus.unlocks, 1);
    }

    #[test]
    fn test_lock_fails_when_busy() {
        let mut bus = LockOnlyBus {
            locked: true,
            unlocks: 0,
        };
        assert!(matches!(BusLock::acquire(&mut bus), Err(Error::PixelBusBusy)));
        // 取得できなかったロックは解放しない
        assert_eq!(bus.unlocks, 0);
        assert!(bus.locked);
    }
}
