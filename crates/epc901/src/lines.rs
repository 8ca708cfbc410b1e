use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{Error, Result};

/// センサーに接続される信号線
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// PWR_DOWN (High = センサー停止)
    PowerDown,
    /// CLR_DATA
    ClearData,
    /// CLR_PIX
    ClearPixel,
    /// SHUTTER (High = 露光中)
    Shutter,
    /// READ (読み出しストローブ)
    Read,
    /// DATA_RDY (入力)
    DataReady,
    /// ADC_CS (Low = 選択)
    AdcChipSelect,
}

/// センサー制御用のGPIO一式
///
/// 出力ピンは同じ型にそろえて渡す (ESP-IDFなら `PinDriver<AnyOutputPin, Output>`)。
pub struct SensorLines<O, I> {
    pub power_down: O,
    pub clear_data: O,
    pub clear_pixel: O,
    pub shutter: O,
    pub read: O,
    pub data_ready: I,
}

impl<O, I> SensorLines<O, I>
where
    O: OutputPin,
    I: InputPin,
{
    pub fn new(power_down: O, clear_data: O, clear_pixel: O, shutter: O, read: O, data_ready: I) -> Self {
        Self {
            power_down,
            clear_data,
            clear_pixel,
            shutter,
            read,
            data_ready,
        }
    }

    fn output(&mut self, line: Line) -> &mut O {
        match line {
            Line::PowerDown => &mut self.power_down,
            Line::ClearData => &mut self.clear_data,
            Line::ClearPixel => &mut self.clear_pixel,
            Line::Shutter => &mut self.shutter,
            Line::Read => &mut self.read,
            Line::DataReady | Line::AdcChipSelect => {
                unreachable!("{line:?} は出力線ではありません")
            }
        }
    }

    pub(crate) fn set_high(&mut self, line: Line) -> Result<()> {
        self.output(line).set_high().map_err(Error::gpio(line))
    }

    pub(crate) fn set_low(&mut self, line: Line) -> Result<()> {
        self.output(line).set_low().map_err(Error::gpio(line))
    }

    pub(crate) fn is_data_ready(&mut self) -> Result<bool> {
        self.data_ready
            .is_high()
            .map_err(Error::gpio(Line::DataReady))
    }

    /// 全出力線を待機状態にする (パワーダウン、その他Low)
    pub(crate) fn set_idle(&mut self) -> Result<()> {
        self.set_high(Line::PowerDown)?;
        self.set_low(Line::ClearData)?;
        self.set_low(Line::ClearPixel)?;
        self.set_low(Line::Shutter)?;
        self.set_low(Line::Read)
    }
}
