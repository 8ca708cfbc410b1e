/// シリアルコマンド解析機能
///
/// ホストからは1行1コマンドで送られる。
/// - `@echo on` / `@echo off`
/// - `@reset sensor`
/// - `@exposure <µs>`
/// - `@capture`
/// - `@transfer`
use log::{debug, warn};

use crate::config::parse_exposure_us;

/// 解析されたコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 受信した行をそのまま返すかどうか
    Echo(bool),
    /// センサーをリセットして再初期化する
    ResetSensor,
    /// 次回以降の撮影の露光時間 (µs)
    Exposure(u32),
    /// 1ラインを撮影して保持する
    Capture,
    /// 保持しているフレームを送信する
    Transfer,
    /// 不明なコマンド
    Unknown(String),
}

/// コマンド解析エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("コマンドの形式が不正です: {0}")]
    InvalidFormat(String),
    #[error("露光時間が不正です: {0}")]
    InvalidExposure(String),
}

/// コマンド文字列を解析します
pub fn parse_command(command_str: &str) -> Result<Command, CommandParseError> {
    debug!("Parsing command: '{}'", command_str);

    let trimmed = command_str.trim();
    let mut words = trimmed.split_whitespace();
    let name = words.next().unwrap_or("");
    let argument = words.next();
    if words.next().is_some() {
        return Err(CommandParseError::InvalidFormat(trimmed.to_string()));
    }

    match (name, argument) {
        ("@echo", Some("on")) => Ok(Command::Echo(true)),
        ("@echo", Some("off")) => Ok(Command::Echo(false)),
        ("@echo", _) => Err(CommandParseError::InvalidFormat(trimmed.to_string())),
        ("@reset", Some("sensor")) => Ok(Command::ResetSensor),
        ("@reset", _) => Err(CommandParseError::InvalidFormat(trimmed.to_string())),
        ("@exposure", Some(value)) => parse_exposure(value),
        ("@exposure", None) => Err(CommandParseError::InvalidFormat(trimmed.to_string())),
        ("@capture", None) => Ok(Command::Capture),
        ("@transfer", None) => Ok(Command::Transfer),
        ("@capture" | "@transfer", Some(_)) => {
            Err(CommandParseError::InvalidFormat(trimmed.to_string()))
        }
        _ => {
            warn!("Unknown command format: '{}'", trimmed);
            Ok(Command::Unknown(trimmed.to_string()))
        }
    }
}

fn parse_exposure(value: &str) -> Result<Command, CommandParseError> {
    let exposure_us = value.parse::<u32>().map_err(|_| {
        warn!("Invalid exposure: '{}'", value);
        CommandParseError::InvalidExposure(value.to_string())
    })?;
    parse_exposure_us(exposure_us)
        .map(Command::Exposure)
        .map_err(|_| CommandParseError::InvalidExposure(value.to_string()))
}
