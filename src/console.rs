//! ホストとのコマンド応答処理
//!
//! 応答は1行ずつ送る。
//! - 成功: `ok`
//! - 失敗: `error: <理由>`
//! - `@transfer`: `<フレーム番号>,<タイムスタンプms>,<露光µs>` の行と、
//!   画素を4桁の16進数で連結した行
//!
//! エコーが有効な間は、応答の前に受信した行をそのまま返す。

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use epc901::{ControlBus, Epc901, PixelBus, PIXEL_COUNT};

use crate::command::{parse_command, Command};
use crate::serial::{LineBuffer, SerialPort, SerialResult, COMMAND_BUFFER_SIZE};
use crate::summary::LineSummary;

/// コンソールから操作するカメラ
pub trait LineCamera {
    /// センサーをリセットし、リビジョンを読み直す
    fn reinitialize(&mut self) -> epc901::Result<u8>;

    /// 1ラインを撮影する
    fn capture(&mut self, exposure_us: u32, pixels: &mut [u16]) -> epc901::Result<usize>;
}

impl<C, P, O, I, D> LineCamera for Epc901<C, P, O, I, D>
where
    C: ControlBus,
    P: PixelBus,
    O: OutputPin,
    I: InputPin,
    D: DelayNs,
{
    fn reinitialize(&mut self) -> epc901::Result<u8> {
        // リセットに失敗しても初期化は試み、未初期化状態を確定させる
        let reset = self.reset();
        let revision = self.init()?;
        reset.map(|()| revision)
    }

    fn capture(&mut self, exposure_us: u32, pixels: &mut [u16]) -> epc901::Result<usize> {
        self.capture_image(exposure_us, pixels)
    }
}

/// 撮影済みのフレーム
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub number: u32,
    pub timestamp_ms: u64,
    pub exposure_us: u32,
    pub pixels: Vec<u16>,
}

impl Frame {
    /// メタデータ行
    pub fn header(&self) -> String {
        format!("{},{},{}", self.number, self.timestamp_ms, self.exposure_us)
    }

    /// 画素データ行
    pub fn hex_pixels(&self) -> String {
        use core::fmt::Write;

        let mut line = String::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            let _ = write!(line, "{:04X}", pixel);
        }
        line
    }
}

/// コマンドコンソール
#[derive(Debug)]
pub struct Console {
    echo: bool,
    exposure_us: u32,
    next_frame: u32,
    frame: Option<Frame>,
    input: LineBuffer,
}

impl Console {
    /// エコー有効、露光時間 `exposure_us` で開始する
    pub fn new(exposure_us: u32) -> Self {
        Self {
            echo: true,
            exposure_us,
            next_frame: 0,
            frame: None,
            input: LineBuffer::new(),
        }
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn exposure_us(&self) -> u32 {
        self.exposure_us
    }

    /// 送信待ちのフレーム
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// 受信した1行を処理し、送信する応答行を返す
    pub fn handle_line<C: LineCamera>(&mut self, camera: &mut C, line: &str, now_ms: u64) -> Vec<String> {
        let mut replies = Vec::new();
        if self.echo {
            replies.push(line.to_string());
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                replies.push(format!("error: {}", e));
                return replies;
            }
        };

        match command {
            Command::Echo(enabled) => {
                self.echo = enabled;
                replies.push("ok".to_string());
            }
            Command::ResetSensor => match camera.reinitialize() {
                Ok(revision) => {
                    info!("センサーを再初期化しました (リビジョン: 0x{:02X})", revision);
                    replies.push("ok".to_string());
                }
                Err(e) => replies.push(format!("error: {}", e)),
            },
            Command::Exposure(exposure_us) => {
                self.exposure_us = exposure_us;
                replies.push("ok".to_string());
            }
            Command::Capture => replies.push(self.capture(camera, now_ms)),
            Command::Transfer => match self.frame.take() {
                Some(frame) => {
                    replies.push(frame.header());
                    replies.push(frame.hex_pixels());
                }
                // 空の2行でフレームがないことを知らせる
                None => {
                    replies.push(String::new());
                    replies.push(String::new());
                }
            },
            Command::Unknown(text) => replies.push(format!("error: unknown command {}", text)),
        }
        replies
    }

    /// シリアルから読めるだけ読み、完成したコマンドを処理する
    ///
    /// 処理したコマンド数を返す。
    pub fn poll<S: SerialPort, C: LineCamera>(
        &mut self,
        port: &mut S,
        camera: &mut C,
        timeout_ms: u32,
        now_ms: u64,
    ) -> SerialResult<usize> {
        let mut buffer = [0u8; COMMAND_BUFFER_SIZE];
        let read = port.read(&mut buffer, timeout_ms)?;
        if read == 0 {
            return Ok(0);
        }

        let lines = self.input.push(&buffer[..read]);
        for line in &lines {
            for reply in self.handle_line(camera, line, now_ms) {
                port.write_line(&reply)?;
            }
        }
        Ok(lines.len())
    }

    fn capture<C: LineCamera>(&mut self, camera: &mut C, now_ms: u64) -> String {
        let mut pixels = vec![0u16; PIXEL_COUNT];
        match camera.capture(self.exposure_us, &mut pixels) {
            Ok(count) => {
                pixels.truncate(count);
                if let Some(summary) = LineSummary::from_pixels(&pixels) {
                    info!(
                        "撮影完了: フレーム {}, 露光 {}µs, 最小 {}, 最大 {} (画素 {}), 平均 {:.1}",
                        self.next_frame,
                        self.exposure_us,
                        summary.min,
                        summary.max,
                        summary.peak_index,
                        summary.mean
                    );
                }
                self.frame = Some(Frame {
                    number: self.next_frame,
                    timestamp_ms: now_ms,
                    exposure_us: self.exposure_us,
                    pixels,
                });
                self.next_frame = self.next_frame.wrapping_add(1);
                "ok".to_string()
            }
            Err(e) => {
                warn!("撮影に失敗しました (コード {}): {}", e.status_code(), e);
                format!("error: {}", e)
            }
        }
    }
}
