use crate::poll::PollLimit;

/// キャプチャ動作の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// 制御バス (I2C) 1回あたりのタイムアウト
    pub control_timeout_ms: u32,
    /// 露光後のDATA_RDY待ちの上限
    pub data_ready_limit: PollLimit,
    /// 画素読み出し中の受信完了待ちの上限
    pub rx_ready_limit: PollLimit,
    /// 露光前にCLR_DATA / CLR_PIXパルスで残留電荷を消去する
    pub clear_before_exposure: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            control_timeout_ms: 100,
            data_ready_limit: PollLimit::Micros(100_000), // 100ms
            rx_ready_limit: PollLimit::Spins(10_000),
            clear_before_exposure: false,
        }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control_timeout(mut self, timeout_ms: u32) -> Self {
        self.control_timeout_ms = timeout_ms;
        self
    }

    pub fn with_data_ready_limit(mut self, limit: PollLimit) -> Self {
        self.data_ready_limit = limit;
        self
    }

    pub fn with_rx_ready_limit(mut self, limit: PollLimit) -> Self {
        self.rx_ready_limit = limit;
        self
    }

    pub fn with_clear_before_exposure(mut self, enabled: bool) -> Self {
        self.clear_before_exposure = enabled;
        self
    }
}
