use crate::bus::ControlBusError;
use crate::lines::Line;
use crate::poll::WaitTarget;

/// ドライバー操作の結果型
pub type Result<T> = core::result::Result<T, Error>;

/// キャプチャ・レジスタ操作で発生するエラー
///
/// どのエラーで戻った場合でも、センサーはパワーダウン状態に戻されています。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("GPIO操作に失敗しました ({line:?}): {kind:?}")]
    Gpio {
        line: Line,
        kind: embedded_hal::digital::ErrorKind,
    },

    #[error("制御バス通信に失敗しました: {0}")]
    ControlBus(ControlBusError),

    #[error("ピクセルバス通信に失敗しました: {0:?}")]
    PixelBus(embedded_hal::spi::ErrorKind),

    #[error("ピクセルバスは他の処理が使用中です")]
    PixelBusBusy,

    #[error("{0}の待機がタイムアウトしました")]
    Timeout(WaitTarget),

    #[error("センサーが初期化されていません")]
    NotInitialized,

    #[error("キャプチャバッファが小さすぎます: {len} < {required}")]
    BufferTooSmall { len: usize, required: usize },
}

impl Error {
    /// 整数ステータス (0 = 成功, 非0 = 失敗) を必要とする呼び出し側向けの値
    pub fn status_code(&self) -> u8 {
        match self {
            Error::ControlBus(ControlBusError::Timeout) => 3,
            Error::ControlBus(_) => 1,
            Error::PixelBusBusy => 2,
            Error::Timeout(_) => 3,
            _ => 1,
        }
    }

    pub(crate) fn gpio<E: embedded_hal::digital::Error>(line: Line) -> impl FnOnce(E) -> Self {
        move |e| Error::Gpio {
            line,
            kind: e.kind(),
        }
    }

    pub(crate) fn pixel_bus<E: embedded_hal::spi::Error>(e: E) -> Self {
        Error::PixelBus(e.kind())
    }
}

impl From<ControlBusError> for Error {
    fn from(error: ControlBusError) -> Self {
        Error::ControlBus(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_non_zero() {
        let errors = [
            Error::ControlBus(ControlBusError::Timeout),
            Error::ControlBus(ControlBusError::Bus(embedded_hal::i2c::ErrorKind::Bus)),
            Error::PixelBusBusy,
            Error::Timeout(WaitTarget::DataReady),
            Error::NotInitialized,
            Error::BufferTooSmall {
                len: 10,
                required: 1024,
            },
        ];
        for error in errors {
            assert_ne!(error.status_code(), 0, "{error}");
        }
    }

    #[test]
    fn test_timeout_message_names_the_signal() {
        let message = Error::Timeout(WaitTarget::DataReady).to_string();
        assert!(message.contains("DATA_RDY"));
    }
}
