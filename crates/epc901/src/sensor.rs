use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, info, warn};

use crate::bus::{BusLock, ControlBus, PixelBus};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::lines::{Line, SensorLines};
use crate::pixel::{combine_sample, PIPELINE_DISCARD, PIXEL_COUNT};
use crate::poll::{self, PollLimit, WaitTarget};

/// EPC901の7ビットI2Cアドレス (ブレークアウト基板の初期値)
pub const DEFAULT_ADDRESS: u8 = 0x15;

/// チップリビジョン (読み出し専用)
const REVISION_REGISTER: u8 = 0xFF;
/// 一般呼び出しで送るリセットコマンド
const RESET_COMMAND: u8 = 6;
const GENERAL_CALL_ADDRESS: u8 = 0;

// タイミングは未校正の内部発振器 (~36MHz) を前提にした余裕のある値
const POWER_UP_SETTLE_US: u32 = 12;
const MIN_EXPOSURE_US: u32 = 1;
const CLEAR_PULSE_US: u32 = 1;
const CLEAR_SETTLE_US: u32 = 10;
const READ_PULSE_US: u32 = 1;
const CONVERSION_SETTLE_US: u32 = 2; // TODO: 発振器校正を実装したら1µsに短縮できる

/// EPC901 キャプチャエンジン
///
/// 電源シーケンス、露光、1024画素の読み出しを1回のキャプチャとしてまとめる。
/// センサーに触れる操作はすべて「パワーアップ → 処理 → パワーダウン」で
/// 囲まれ、エラーで戻る場合もセンサーは低消費電力状態に戻る。
pub struct Epc901<C, P, O, I, D> {
    control: C,
    address: u8,
    pixel_bus: P,
    lines: SensorLines<O, I>,
    delay: D,
    config: CaptureConfig,
    revision: Option<u8>,
}

impl<C, P, O, I, D> Epc901<C, P, O, I, D>
where
    C: ControlBus,
    P: PixelBus,
    O: OutputPin,
    I: InputPin,
    D: DelayNs,
{
    /// 各バスと信号線を束ねたハンドルを作成する
    ///
    /// `address` は7ビットアドレス。制御バスには1ビット左シフトした値を使う。
    pub fn new(
        control: C,
        address: u8,
        pixel_bus: P,
        lines: SensorLines<O, I>,
        delay: D,
        config: CaptureConfig,
    ) -> Self {
        Self {
            control,
            address: address << 1,
            pixel_bus,
            lines,
            delay,
            config,
            revision: None,
        }
    }

    /// 信号線を既定状態にし、ピクセルバスを設定してチップリビジョンを読む
    ///
    /// # エラー
    ///
    /// リビジョンの読み出しに失敗した場合は制御バスのエラーをそのまま返す。
    /// この場合リビジョンはキャッシュされず、以前の初期化結果も破棄される。
    pub fn init(&mut self) -> Result<u8> {
        // 再初期化に失敗した場合も未初期化として扱う
        self.revision = None;
        self.lines.set_idle()?;
        self.pixel_bus.deselect().map_err(Error::pixel_bus)?;

        {
            let mut bus = BusLock::acquire(&mut self.pixel_bus)?;
            bus.configure().map_err(Error::pixel_bus)?;
        }

        let result = self.powered(|s| {
            s.control
                .read_register(s.address, REVISION_REGISTER, s.config.control_timeout_ms)
                .map_err(Error::from)
        });

        // 発振器の校正は行わない (1µs以上の露光では影響は小さい)
        match result {
            Ok(revision) => {
                self.revision = Some(revision);
                info!(
                    "EPC901 初期化完了 (アドレス: 0x{:02X}, リビジョン: 0x{:02X})",
                    self.address >> 1,
                    revision
                );
                Ok(revision)
            }
            Err(e) => {
                warn!("EPC901 のリビジョン読み出しに失敗しました: {}", e);
                Err(e)
            }
        }
    }

    /// 1ラインを撮影して `buffer` の先頭1024要素に書き込む
    ///
    /// `exposure_us` が0の場合は最小の1µsで露光する。
    /// 戻り値は書き込んだ画素数 (成功時は常に1024)。
    pub fn capture_image(&mut self, exposure_us: u32, buffer: &mut [u16]) -> Result<usize> {
        self.ensure_initialized()?;
        if buffer.len() < PIXEL_COUNT {
            return Err(Error::BufferTooSmall {
                len: buffer.len(),
                required: PIXEL_COUNT,
            });
        }

        let pixels = self.powered(|s| {
            s.expose(exposure_us)?;
            s.read_pixels(buffer)
        })?;

        debug!("キャプチャ完了: {} 画素 (露光 {}µs)", pixels, exposure_us);
        Ok(pixels)
    }

    /// キャッシュ済みのチップリビジョン。未取得なら0。
    pub fn revision(&self) -> u8 {
        self.revision.unwrap_or(0)
    }

    pub fn is_initialized(&self) -> bool {
        self.revision.is_some()
    }

    /// 制御バスで使う8ビットアドレス
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        self.ensure_initialized()?;
        self.powered(|s| {
            s.control
                .read_register(s.address, register, s.config.control_timeout_ms)
                .map_err(Error::from)
        })
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.ensure_initialized()?;
        self.powered(|s| {
            s.control
                .write_register(s.address, register, value, s.config.control_timeout_ms)
                .map_err(Error::from)
        })
    }

    /// 一般呼び出しでリセットコマンドを送る
    ///
    /// 初期化に失敗したセンサーの復帰にも使えるよう、初期化状態は確認しない。
    pub fn reset(&mut self) -> Result<()> {
        let result = self.powered(|s| {
            s.control
                .transmit(GENERAL_CALL_ADDRESS, &[RESET_COMMAND], s.config.control_timeout_ms)
                .map_err(Error::from)
        });
        match &result {
            Ok(()) => info!("EPC901 にリセットコマンドを送信しました"),
            Err(e) => warn!("EPC901 のリセットに失敗しました: {}", e),
        }
        result
    }

    /// 各バスと信号線を返してハンドルを破棄する
    pub fn release(self) -> (C, P, SensorLines<O, I>, D) {
        (self.control, self.pixel_bus, self.lines, self.delay)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.revision.is_none() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    /// `op` をパワーアップ/パワーダウンで囲んで実行する
    fn powered<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = match self.power_up() {
            Ok(()) => op(self),
            Err(e) => Err(e),
        };
        let down = self.power_down();

        match result {
            Ok(value) => down.map(|()| value),
            Err(e) => {
                if let Err(down_error) = down {
                    warn!("パワーダウンに失敗しました: {}", down_error);
                }
                Err(e)
            }
        }
    }

    fn power_up(&mut self) -> Result<()> {
        self.lines.set_low(Line::PowerDown)?;
        self.delay.delay_us(POWER_UP_SETTLE_US);
        Ok(())
    }

    fn power_down(&mut self) -> Result<()> {
        self.lines.set_high(Line::PowerDown)
    }

    fn pulse(&mut self, line: Line, width_us: u32, settle_us: u32) -> Result<()> {
        self.lines.set_high(line)?;
        self.delay.delay_us(width_us);
        self.lines.set_low(line)?;
        self.delay.delay_us(settle_us);
        Ok(())
    }

    fn expose(&mut self, exposure_us: u32) -> Result<()> {
        if self.config.clear_before_exposure {
            self.pulse(Line::ClearData, CLEAR_PULSE_US, CLEAR_SETTLE_US)?;
            self.pulse(Line::ClearPixel, CLEAR_PULSE_US, CLEAR_SETTLE_US)?;
        }

        // 露光0でも内部のフラッシュ/シフトに~1µs必要
        self.lines.set_high(Line::Shutter)?;
        self.delay.delay_us(exposure_us.max(MIN_EXPOSURE_US));
        self.lines.set_low(Line::Shutter)?;

        let Self {
            lines,
            delay,
            config,
            ..
        } = self;
        poll::wait_until(delay, config.data_ready_limit, WaitTarget::DataReady, || {
            lines.is_data_ready()
        })
        .inspect_err(|e| warn!("露光後のデータ準備を待てませんでした: {}", e))
    }

    fn read_pixels(&mut self, buffer: &mut [u16]) -> Result<usize> {
        // READパルス (~3発振サイクル) の後、変換完了まで待つ
        self.pulse(Line::Read, READ_PULSE_US, CONVERSION_SETTLE_US)?;

        let Self {
            pixel_bus,
            lines,
            delay,
            config,
            ..
        } = self;
        let mut bus = BusLock::acquire(pixel_bus)?;

        let result = read_samples(&mut *bus, lines, delay, config.rx_ready_limit, buffer);
        if let Err(e) = &result {
            warn!("画素読み出しを中断しました: {}", e);
            let _ = bus.deselect();
            let _ = lines.set_low(Line::Read);
        }
        result
    }
}

/// 1024画素を読み出す。最初の `PIPELINE_DISCARD` サンプルは捨てる。
///
/// 1サンプルの流れ:
/// CS Low → 転送開始 → READ High → 上位バイト → READ Low → 下位バイト → CS High
fn read_samples<P, O, I, D>(
    bus: &mut P,
    lines: &mut SensorLines<O, I>,
    delay: &mut D,
    limit: PollLimit,
    buffer: &mut [u16],
) -> Result<usize>
where
    P: PixelBus,
    O: OutputPin,
    I: InputPin,
    D: DelayNs,
{
    let mut produced = 0usize;
    let mut stored = 0usize;

    while stored < PIXEL_COUNT {
        // CS Low でADCはホールド
        bus.select().map_err(Error::pixel_bus)?;
        bus.start_transfer(0).map_err(Error::pixel_bus)?;
        lines.set_high(Line::Read)?;

        poll::wait_until(delay, limit, WaitTarget::PixelBusRx, || {
            bus.rx_ready().map_err(Error::pixel_bus)
        })?;
        let msb = bus.read_byte().map_err(Error::pixel_bus)?;

        // ADCは13ビット目でサンプルに戻る
        lines.set_low(Line::Read)?;

        poll::wait_until(delay, limit, WaitTarget::PixelBusRx, || {
            bus.rx_ready().map_err(Error::pixel_bus)
        })?;
        let lsb = bus.read_byte().map_err(Error::pixel_bus)?;

        bus.deselect().map_err(Error::pixel_bus)?;

        if produced >= PIPELINE_DISCARD {
            buffer[stored] = combine_sample(msb, lsb);
            stored += 1;
        }
        produced += 1;
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimSensor;

    #[test]
    fn test_address_is_shifted() {
        let sim = SimSensor::new();
        let sensor = sim.sensor(DEFAULT_ADDRESS, CaptureConfig::default());
        assert_eq!(sensor.address(), 0x2A);
    }

    #[test]
    fn test_operations_before_init_are_rejected() {
        let sim = SimSensor::new();
        let mut sensor = sim.sensor(DEFAULT_ADDRESS, CaptureConfig::default());
        let mut buffer = [0u16; PIXEL_COUNT];

        assert_eq!(sensor.capture_image(100, &mut buffer), Err(Error::NotInitialized));
        assert_eq!(sensor.read_register(0x00), Err(Error::NotInitialized));
        assert_eq!(sensor.write_register(0x00, 1), Err(Error::NotInitialized));
        // センサーには触れていない
        assert!(sim.events().is_empty());
    }

    #[test]
    fn test_reset_allowed_before_init() {
        let sim = SimSensor::new();
        let mut sensor = sim.sensor(DEFAULT_ADDRESS, CaptureConfig::default());
        assert!(sensor.reset().is_ok());
        assert_eq!(sim.transmitted(), vec![(0x00, vec![6])]);
    }

    #[test]
    fn test_small_buffer_is_rejected_without_touching_sensor() {
        let sim = SimSensor::new();
        let mut sensor = sim.sensor(DEFAULT_ADDRESS, CaptureConfig::default());
        sensor.init().unwrap();
        sim.clear_events();

        let mut buffer = [0u16; 1000];
        assert_eq!(
            sensor.capture_image(100, &mut buffer),
            Err(Error::BufferTooSmall {
                len: 1000,
                required: PIXEL_COUNT
            })
        );
        assert!(sim.events().is_empty());
    }
}
