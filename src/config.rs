use crate::database::DEFAULT_NAMESPACE;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 実行コアの設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecSettings {
    /// SQL方言タグ（コアは解釈しない）
    pub dialect: String,
    pub trace: TraceSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TraceSettings {
    /// true の場合、トレースを tracing サブスクライバーへ流す
    pub enabled: bool,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    pub level: String,
    pub log_dir: Option<PathBuf>,
    pub file_enabled: bool,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            dialect: "default".to_string(),
            trace: TraceSettings {
                enabled: false,
                namespace: DEFAULT_NAMESPACE.to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
                log_dir: None,
                file_enabled: false,
            },
        }
    }
}

/// 探索する設定ファイル
const CONFIG_PATHS: [&str; 2] = ["sqlexec.toml", "config/sqlexec.toml"];

impl ExecSettings {
    /// 既定値 → 設定ファイル → 環境変数（SQLEXEC_TRACE__ENABLED 等）の順に読み込む
    pub fn load() -> Result<Self> {
        let file = CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.exists());
        Self::load_from(file)
    }

    /// 指定ファイルと環境変数から読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_from(Some(path.as_ref()))
    }

    fn load_from(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("SQLEXEC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&ExecSettings::default())?);

        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "loading settings file");
            settings = settings.add_source(config::File::from(path));
        }

        Ok(settings.add_source(env).build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = ExecSettings::default();
        assert_eq!(settings.dialect, "default");
        assert_eq!(settings.trace.namespace, "[sqlexec]");
        assert!(!settings.trace.enabled);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "dialect = \"postgres\"\n\n[trace]\nenabled = true\nnamespace = \"[app]\""
        )
        .unwrap();

        let settings = ExecSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.dialect, "postgres");
        assert!(settings.trace.enabled);
        assert_eq!(settings.trace.namespace, "[app]");
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "dialect = \"postgres\"").unwrap();

        let vars = config::Map::from([
            ("SQLEXEC_DIALECT".to_string(), "mysql".to_string()),
            ("SQLEXEC_TRACE__ENABLED".to_string(), "true".to_string()),
        ]);
        let env = ExecSettings::environment().source(Some(vars));

        let settings = ExecSettings::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(settings.dialect, "mysql");
        assert!(settings.trace.enabled);
        assert_eq!(settings.trace.namespace, "[sqlexec]");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ExecSettings::from_file("/nonexistent/sqlexec.toml").is_err());
    }
}
