#[cfg(target_os = "espidf")]
pub mod uart;

// Mock実装（テストとnon-espビルドで使用可能）
#[cfg(not(target_os = "espidf"))]
pub mod mock;

use log::warn;

/// シリアル通信での結果の型
pub type SerialResult<T> = Result<T, SerialError>;

/// コマンド1行の最大長
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// シリアル通信のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerialError {
    #[error("シリアル通信がタイムアウトしました")]
    Timeout,
    #[error("シリアル書き込みに失敗しました: {0}")]
    Write(String),
    #[error("シリアル読み取りに失敗しました: {0}")]
    Read(String),
}

/// コマンド用シリアルポートのインターフェース
///
/// 実機 (UART) とテスト用 (Mock) の実装を切り替えるためのトレイト。
pub trait SerialPort {
    /// 書き込めたバイト数を返す
    fn write(&mut self, data: &[u8]) -> SerialResult<usize>;

    /// 最大 `timeout_ms` 待って読み取る。何も届かなければ0を返す。
    fn read(&mut self, buffer: &mut [u8], timeout_ms: u32) -> SerialResult<usize>;

    /// 1行を改行付きで最後まで書き込む
    fn write_line(&mut self, line: &str) -> SerialResult<()> {
        for chunk in [line.as_bytes(), b"\n"] {
            let mut sent = 0;
            while sent < chunk.len() {
                let written = self.write(&chunk[sent..])?;
                if written == 0 {
                    return Err(SerialError::Write("0バイトしか書き込めませんでした".to_string()));
                }
                sent += written;
            }
        }
        Ok(())
    }
}

/// 受信バイト列を行単位に組み立てるバッファ
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 受信データを追加し、完成した行 (改行除く) を返す
    ///
    /// `COMMAND_BUFFER_SIZE` を超えた行は次の改行まで読み捨てる。
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            match byte {
                b'\n' => {
                    if self.overflowed {
                        warn!("コマンドが長すぎるため破棄しました");
                    } else {
                        let line = String::from_utf8_lossy(&self.pending);
                        let line = line.trim();
                        if !line.is_empty() {
                            lines.push(line.to_string());
                        }
                    }
                    self.pending.clear();
                    self.overflowed = false;
                }
                _ if self.overflowed => {}
                _ if self.pending.len() >= COMMAND_BUFFER_SIZE => {
                    self.pending.clear();
                    self.overflowed = true;
                }
                _ => self.pending.push(byte),
            }
        }
        lines
    }
}
