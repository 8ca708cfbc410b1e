fn main() {
    // ESP-IDFのリンク設定はESP32向けビルドのときだけ出力する
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
