//! ログ出力の初期化
//!
//! # 責務
//!
//! - `tracing-subscriber` による標準エラー出力へのログ（pretty / json）
//! - `tracing-appender` による日次ローテーションのファイル出力（任意）
//! - `RUST_LOG` を設定ファイルのレベルより優先するフィルター
//!
//! 標準出力は対話用に空けておき、ログはすべて標準エラー出力かファイルに書き出します。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::config::settings::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "mentat.log";

/// グローバルなサブスクライバーを設定する
///
/// ファイル出力を有効にした場合は [`WorkerGuard`] を返します。
/// プロセス終了まで保持しないと、バッファされたログが失われます。
///
/// # エラー
///
/// - [`ConfigError::Validation`] - レベル指定が不正、またはサブスクライバーが設定済み
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = build_filter(&config.level)?;

    let stderr_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::Validation(format!("ログの初期化に失敗しました: {e}")))?;

    Ok(guard)
}

/// `RUST_LOG` があればそれを、なければ設定のレベルを使う
pub fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| ConfigError::Validation(format!("ログレベル '{level}' が不正です: {e}"))),
    }
}
