use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::error::{Error, Result};

/// ポーリング待機の上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLimit {
    /// 指定回数だけ連続で確認する (待機を挟まない)
    Spins(u32),
    /// 1µs間隔で確認し、指定時間で打ち切る
    Micros(u32),
}

/// ポーリング対象の信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// 露光後のセンサーDATA_RDY入力
    DataReady,
    /// ピクセルバスの受信完了フラグ
    PixelBusRx,
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTarget::DataReady => write!(f, "DATA_RDY"),
            WaitTarget::PixelBusRx => write!(f, "ピクセルバス受信"),
        }
    }
}

/// `ready` が真を返すまで待つ。上限に達した場合は `Error::Timeout` を返す。
pub(crate) fn wait_until<D, F>(
    delay: &mut D,
    limit: PollLimit,
    target: WaitTarget,
    mut ready: F,
) -> Result<()>
where
    D: DelayNs,
    F: FnMut() -> Result<bool>,
{
    match limit {
        PollLimit::Spins(spins) => {
            for _ in 0..spins {
                if ready()? {
                    return Ok(());
                }
            }
        }
        PollLimit::Micros(micros) => {
            for _ in 0..micros {
                if ready()? {
                    return Ok(());
                }
                delay.delay_us(1);
            }
        }
    }

    // 上限ちょうどで準備完了になった場合を取りこぼさない
    if ready()? {
        return Ok(());
    }
    Err(Error::Timeout(target))
}
