use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{SerialError, SerialPort, SerialResult};

/// テスト用のシリアルポートモック実装
///
/// 受信データのキューと送信データの記録を共有し、テストで検証できます。
#[derive(Debug, Clone, Default)]
pub struct MockSerial {
    /// 読み取り用のデータキュー（先頭から取り出される）
    pub read_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// 送信されたデータの記録
    pub sent_data: Arc<Mutex<Vec<u8>>>,
    /// エラーシミュレーション用のフラグ
    pub simulate_read_error: Arc<Mutex<bool>>,
    /// 1回の書き込みで受け付ける最大バイト数 (0 = 無制限)
    pub write_chunk: Arc<Mutex<usize>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト用: ホストから届くデータを追加
    pub fn queue_input(&self, data: &str) {
        self.read_queue
            .lock()
            .unwrap()
            .push_back(data.as_bytes().to_vec());
    }

    /// テスト用: 送信された行を取得
    pub fn sent_lines(&self) -> Vec<String> {
        let sent = self.sent_data.lock().unwrap();
        String::from_utf8_lossy(&sent)
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    pub fn clear_sent_data(&self) {
        self.sent_data.lock().unwrap().clear();
    }

    /// テスト用: 読み取りエラーをシミュレート
    pub fn set_read_error(&self, enable: bool) {
        *self.simulate_read_error.lock().unwrap() = enable;
    }

    /// テスト用: 書き込みを `chunk` バイトずつに分割させる
    pub fn set_write_chunk(&self, chunk: usize) {
        *self.write_chunk.lock().unwrap() = chunk;
    }
}

impl SerialPort for MockSerial {
    fn write(&mut self, data: &[u8]) -> SerialResult<usize> {
        let chunk = *self.write_chunk.lock().unwrap();
        let len = if chunk == 0 { data.len() } else { data.len().min(chunk) };
        self.sent_data.lock().unwrap().extend_from_slice(&data[..len]);
        Ok(len)
    }

    fn read(&mut self, buffer: &mut [u8], _timeout_ms: u32) -> SerialResult<usize> {
        if *self.simulate_read_error.lock().unwrap() {
            return Err(SerialError::Read("Simulated read error".to_string()));
        }
        let mut queue = self.read_queue.lock().unwrap();
        let Some(mut data) = queue.pop_front() else {
            return Ok(0);
        };
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        if len < data.len() {
            queue.push_front(data.split_off(len));
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_line_handles_partial_writes() {
        let mut serial = MockSerial::new();
        serial.set_write_chunk(3);
        serial.write_line("0,12,1000").unwrap();
        assert_eq!(serial.sent_lines(), vec!["0,12,1000"]);
    }

    #[test]
    fn test_read_splits_large_input() {
        let mut serial = MockSerial::new();
        serial.queue_input("@capture\n");
        let mut buffer = [0u8; 4];
        assert_eq!(serial.read(&mut buffer, 10), Ok(4));
        assert_eq!(&buffer, b"@cap");
        assert_eq!(serial.read(&mut buffer, 10), Ok(4));
        assert_eq!(serial.read(&mut buffer, 10), Ok(1));
        assert_eq!(serial.read(&mut buffer, 10), Ok(0));
    }
}
