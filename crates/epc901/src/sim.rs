//! ハードウェアなしでキャプチャ処理を動かすための模擬センサー
//!
//! `SimSensor` から取り出した制御バス・ピクセルバス・信号線・ディレイは
//! 1つの状態を共有し、すべての操作をイベント列として記録する。
//! テストではこのイベント列で操作順序や電源状態を検証できる。

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};

use crate::bus::{ControlBus, ControlBusError, PixelBus};
use crate::config::CaptureConfig;
use crate::lines::{Line, SensorLines};
use crate::sensor::Epc901;

/// 模擬センサー上で記録される操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 信号線の変化 (`true` = High)。ADCのCSも含む。
    Pin(Line, bool),
    /// 故障させた信号線への駆動 (レベルは変わらない)
    PinFault(Line, bool),
    DelayUs(u32),
    DelayNs(u32),
    Configure,
    Lock,
    Unlock,
    /// ピクセルバスの2バイト転送開始
    Transfer(u16),
    ReadByte(u8),
    RegisterRead {
        address: u8,
        register: u8,
        timeout_ms: u32,
    },
    RegisterWrite {
        address: u8,
        register: u8,
        value: u8,
        timeout_ms: u32,
    },
    Transmit {
        address: u8,
        data: Vec<u8>,
    },
}

#[derive(Debug)]
struct SimState {
    events: Vec<Event>,
    levels: HashMap<Line, bool>,
    /// 信号線ごとの、故障までに成功する駆動回数
    line_faults: HashMap<Line, usize>,
    registers: [u8; 256],
    control_error: Option<ControlBusError>,
    responsive: bool,
    data_ready: bool,
    samples: VecDeque<(u8, u8)>,
    default_sample: (u8, u8),
    rx_fifo: VecDeque<u8>,
    rx_stalled: bool,
    transfers: usize,
    locked: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            levels: HashMap::new(),
            line_faults: HashMap::new(),
            registers: [0; 256],
            control_error: None,
            responsive: true,
            data_ready: false,
            samples: VecDeque::new(),
            default_sample: (0, 0),
            rx_fifo: VecDeque::new(),
            rx_stalled: false,
            transfers: 0,
            locked: false,
        }
    }
}

impl SimState {
    fn drive(&mut self, line: Line, high: bool) -> Result<(), ErrorKind> {
        if let Some(remaining) = self.line_faults.get_mut(&line) {
            if *remaining == 0 {
                self.events.push(Event::PinFault(line, high));
                return Err(ErrorKind::Other);
            }
            *remaining -= 1;
        }
        self.set_level(line, high);
        Ok(())
    }

    fn set_level(&mut self, line: Line, high: bool) {
        let previous = self.levels.insert(line, high);
        self.events.push(Event::Pin(line, high));

        match (line, previous, high) {
            // シャッターを閉じると露光データが確定する
            (Line::Shutter, Some(true), false) => self.data_ready = self.responsive,
            // パワーアップ時は前回のデータは無効
            (Line::PowerDown, _, false) => self.data_ready = false,
            _ => {}
        }
    }
}

/// 模擬センサー本体
#[derive(Debug, Clone, Default)]
pub struct SimSensor {
    state: Arc<Mutex<SimState>>,
}

/// 模擬部品で組み立てたキャプチャエンジン
pub type SimEpc901 = Epc901<SimControlBus, SimPixelBus, SimPin, SimInput, SimDelay>;

impl SimSensor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn control_bus(&self) -> SimControlBus {
        SimControlBus {
            state: Arc::clone(&self.state),
        }
    }

    pub fn pixel_bus(&self) -> SimPixelBus {
        SimPixelBus {
            state: Arc::clone(&self.state),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: Arc::clone(&self.state),
        }
    }

    pub fn lines(&self) -> SensorLines<SimPin, SimInput> {
        let pin = |line| SimPin {
            line,
            state: Arc::clone(&self.state),
        };
        SensorLines::new(
            pin(Line::PowerDown),
            pin(Line::ClearData),
            pin(Line::ClearPixel),
            pin(Line::Shutter),
            pin(Line::Read),
            SimInput {
                state: Arc::clone(&self.state),
            },
        )
    }

    /// 模擬部品をすべて接続したキャプチャエンジンを作成する
    pub fn sensor(&self, address: u8, config: CaptureConfig) -> SimEpc901 {
        Epc901::new(
            self.control_bus(),
            address,
            self.pixel_bus(),
            self.lines(),
            self.delay(),
            config,
        )
    }

    pub fn set_register(&self, register: u8, value: u8) {
        self.state().registers[register as usize] = value;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.state().registers[register as usize]
    }

    /// 以降の制御バス通信をすべて失敗させる (`None` で解除)
    pub fn fail_control_bus(&self, error: Option<ControlBusError>) {
        self.state().control_error = error;
    }

    /// `line` への駆動を `after` 回成功させた後、以降はすべて失敗させる
    pub fn fail_line(&self, line: Line, after: usize) {
        self.state().line_faults.insert(line, after);
    }

    pub fn clear_line_faults(&self) {
        self.state().line_faults.clear();
    }

    /// キューが空のときに返すサンプル
    pub fn set_sample(&self, msb: u8, lsb: u8) {
        self.state().default_sample = (msb, lsb);
    }

    /// 転送ごとに先頭から返すサンプルを追加する
    pub fn queue_samples(&self, samples: impl IntoIterator<Item = (u8, u8)>) {
        self.state().samples.extend(samples);
    }

    /// `false` にするとシャッターを閉じてもDATA_RDYが立たない
    pub fn set_responsive(&self, responsive: bool) {
        self.state().responsive = responsive;
    }

    /// `true` の間、ピクセルバスの受信完了が立たない
    pub fn stall_pixel_bus(&self, stalled: bool) {
        self.state().rx_stalled = stalled;
    }

    /// 他の処理がピクセルバスを使用中の状態にする
    pub fn hold_pixel_bus(&self, held: bool) {
        self.state().locked = held;
    }

    pub fn is_pixel_bus_locked(&self) -> bool {
        self.state().locked
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// 信号線の現在値。一度も駆動されていなければ `None`。
    pub fn level(&self, line: Line) -> Option<bool> {
        self.state().levels.get(&line).copied()
    }

    /// ピクセルバスの転送回数
    pub fn transfers(&self) -> usize {
        self.state().transfers
    }

    /// アドレスなし送信の記録 (アドレス, データ)
    pub fn transmitted(&self) -> Vec<(u8, Vec<u8>)> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Transmit { address, data } => Some((*address, data.clone())),
                _ => None,
            })
            .collect()
    }
}

/// 模擬制御バス
#[derive(Debug, Clone)]
pub struct SimControlBus {
    state: Arc<Mutex<SimState>>,
}

impl SimControlBus {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ControlBus for SimControlBus {
    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        timeout_ms: u32,
    ) -> Result<u8, ControlBusError> {
        let mut state = self.state();
        state.events.push(Event::RegisterRead {
            address,
            register,
            timeout_ms,
        });
        if let Some(error) = state.control_error {
            return Err(error);
        }
        Ok(state.registers[register as usize])
    }

    fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
        timeout_ms: u32,
    ) -> Result<(), ControlBusError> {
        let mut state = self.state();
        state.events.push(Event::RegisterWrite {
            address,
            register,
            value,
            timeout_ms,
        });
        if let Some(error) = state.control_error {
            return Err(error);
        }
        state.registers[register as usize] = value;
        Ok(())
    }

    fn transmit(&mut self, address: u8, data: &[u8], _timeout_ms: u32) -> Result<(), ControlBusError> {
        let mut state = self.state();
        state.events.push(Event::Transmit {
            address,
            data: data.to_vec(),
        });
        match state.control_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// 模擬ピクセルバス (ADC + 同期シリアルバス)
#[derive(Debug, Clone)]
pub struct SimPixelBus {
    state: Arc<Mutex<SimState>>,
}

impl SimPixelBus {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PixelBus for SimPixelBus {
    type Error = Infallible;

    fn configure(&mut self) -> Result<(), Infallible> {
        self.state().events.push(Event::Configure);
        Ok(())
    }

    fn try_lock(&mut self) -> bool {
        let mut state = self.state();
        if state.locked {
            return false;
        }
        state.locked = true;
        state.events.push(Event::Lock);
        true
    }

    fn unlock(&mut self) {
        let mut state = self.state();
        state.locked = false;
        state.events.push(Event::Unlock);
    }

    fn select(&mut self) -> Result<(), Infallible> {
        self.state().set_level(Line::AdcChipSelect, false);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Infallible> {
        self.state().set_level(Line::AdcChipSelect, true);
        Ok(())
    }

    fn start_transfer(&mut self, word: u16) -> Result<(), Infallible> {
        let mut state = self.state();
        state.events.push(Event::Transfer(word));
        state.transfers += 1;
        let (msb, lsb) = state.samples.pop_front().unwrap_or(state.default_sample);
        state.rx_fifo.push_back(msb);
        state.rx_fifo.push_back(lsb);
        Ok(())
    }

    fn rx_ready(&mut self) -> Result<bool, Infallible> {
        let state = self.state();
        Ok(!state.rx_stalled && !state.rx_fifo.is_empty())
    }

    fn read_byte(&mut self) -> Result<u8, Infallible> {
        let mut state = self.state();
        // 空のデータレジスタは0を返す
        let byte = state.rx_fifo.pop_front().unwrap_or(0);
        state.events.push(Event::ReadByte(byte));
        Ok(byte)
    }
}

/// 模擬出力ピン
#[derive(Debug, Clone)]
pub struct SimPin {
    line: Line,
    state: Arc<Mutex<SimState>>,
}

impl SimPin {
    fn drive(&mut self, high: bool) -> Result<(), ErrorKind> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drive(self.line, high)
    }
}

impl ErrorType for SimPin {
    type Error = ErrorKind;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.drive(true)
    }
}

/// 模擬DATA_RDY入力
#[derive(Debug, Clone)]
pub struct SimInput {
    state: Arc<Mutex<SimState>>,
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()).data_ready)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

/// 待ち時間を記録するだけのディレイ
#[derive(Debug, Clone)]
pub struct SimDelay {
    state: Arc<Mutex<SimState>>,
}

impl SimDelay {
    fn record(&mut self, event: Event) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .push(event);
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(Event::DelayNs(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(Event::DelayUs(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(Event::DelayUs(ms.saturating_mul(1000)));
    }
}
