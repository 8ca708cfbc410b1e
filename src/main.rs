#[cfg(target_os = "espidf")]
use esp_idf_hal::{delay::FreeRtos, peripherals::Peripherals};
#[cfg(target_os = "espidf")]
use log::{error, info, warn};

use epc901_camera::AppConfig;

/// アプリケーションのメインエントリーポイント
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_svc::systime::EspSystemTime;

    use epc901_camera::hardware::{self, BoardPins};
    use epc901_camera::serial::uart::UartPort;
    use epc901_camera::Console;

    // ESP-IDFの基本初期化
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("EPC901カメラ v{} を起動しています", epc901_camera::VERSION);

    // 設定ファイル読み込み
    let config = AppConfig::load().map_err(|e| {
        error!("設定ファイルの読み込みに失敗しました: {}", e);
        anyhow::anyhow!("設定ファイルの読み込みエラー: {}", e)
    })?;

    info!("ペリフェラルを初期化しています");
    let peripherals = Peripherals::take()?;
    let pins = BoardPins::from_pins(peripherals.pins);
    let mut sensor = hardware::build_sensor(peripherals.i2c0, pins.sensor, &config)?;
    let mut port = UartPort::new(
        peripherals.uart1,
        pins.console.tx,
        pins.console.rx,
        config.serial_baudrate,
    )?;

    if let Err(e) = sensor.init() {
        // ホストからの `@reset sensor` で再初期化できる
        warn!("センサーの初期化に失敗しました: {}", e);
    }

    let mut console = Console::new(config.exposure_us);
    info!("コマンド待機中 ({}bps)", config.serial_baudrate);
    loop {
        let now_ms = EspSystemTime.now().as_millis() as u64;
        if let Err(e) = console.poll(&mut port, &mut sensor, config.command_poll_ms, now_ms) {
            warn!("シリアル通信エラー: {}", e);
            FreeRtos::delay_ms(config.command_poll_ms);
        }
    }
}

/// ホストビルドでは設定の検証だけを行う
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    println!("EPC901カメラ v{}", epc901_camera::VERSION);
    println!("このファームウェアはESP32向けです。ESP-IDFターゲットでビルドしてください。");
    println!("設定: {:#?}", config);
    Ok(())
}
