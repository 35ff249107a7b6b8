use crate::config::LogSettings;
use crate::error::Error;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// ログファイル名
const LOG_FILE_NAME: &str = "sqlexec.log";

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル (trace, debug, info, warn, error) または EnvFilter 式
    pub level: String,
    /// ログディレクトリ
    pub log_dir: PathBuf,
    /// ファイルローテーション設定
    pub rotation: LogRotation,
    /// コンソール出力有効
    pub console_enabled: bool,
    /// ファイル出力有効
    pub file_enabled: bool,
}

#[derive(Debug, Clone)]
pub enum LogRotation {
    /// 日次ローテーション
    Daily,
    /// 時間毎ローテーション
    Hourly,
    /// ローテーションなし
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            rotation: LogRotation::Daily,
            console_enabled: true,
            file_enabled: false,
        }
    }
}

impl LogConfig {
    /// 設定からログ設定を作成
    pub fn from_settings(settings: &LogSettings) -> Self {
        let mut config = Self {
            level: settings.level.clone(),
            file_enabled: settings.file_enabled,
            ..Self::default()
        };
        if let Some(dir) = &settings.log_dir {
            config.log_dir = dir.clone();
        }
        config
    }

    /// カスタムログディレクトリを設定
    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// ローテーション設定
    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// コンソール出力制御
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console_enabled = enabled;
        self
    }

    /// ファイル出力制御
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.file_enabled = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// ログシステムを初期化
///
/// ファイル出力が有効な場合、返されたガードを保持している間だけ書き込みが行われる。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = config.env_filter();

    let guard = match (config.console_enabled, config.file_enabled) {
        (_, true) => {
            ensure_log_dir(&config.log_dir)?;
            let file_appender = match config.rotation {
                LogRotation::Daily => rolling::daily(&config.log_dir, LOG_FILE_NAME),
                LogRotation::Hourly => rolling::hourly(&config.log_dir, LOG_FILE_NAME),
                LogRotation::Never => rolling::never(&config.log_dir, LOG_FILE_NAME),
            };
            let (writer, guard) = non_blocking(file_appender);

            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(true);
            let result = if config.console_enabled {
                builder.with_writer(std::io::stderr.and(writer)).try_init()
            } else {
                builder.with_writer(writer).with_ansi(false).try_init()
            };
            result.map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
            Some(guard)
        }
        (true, false) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(true)
                .try_init()
                .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
            None
        }
        (false, false) => None,
    };

    tracing::info!(level = %config.level, file = config.file_enabled, "logging initialized");
    Ok(guard)
}

/// ログディレクトリを確保
fn ensure_log_dir(dir: &Path) -> crate::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
