//! 环境变量配置
//! 启动时可从 .env 读取

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org";
const DEFAULT_TMDB_LANGUAGE: &str = "zh-CN";
const DEFAULT_CRAWL_DELAY_MS: u64 = 300;
const DEFAULT_STORAGE_DIR: &str = "./data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("缺少环境变量 {0}")]
    Missing(&'static str),
    #[error("环境变量 {name} 无效: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub token: String,
    pub base_url: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Cloudflare R2 或其他 S3 兼容存储
    R2 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
    Local { dir: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub tmdb: TmdbConfig,
    pub storage: StorageConfig,
    pub crawl_delay: Duration,
    pub crawl_on_start: bool,
}

impl Config {
    /// 读取 .env 后从进程环境加载
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: p,
            })?,
            None => DEFAULT_PORT,
        };

        let tmdb = TmdbConfig {
            token: var("TMDB_API_TOKEN").ok_or(ConfigError::Missing("TMDB_API_TOKEN"))?,
            base_url: var("TMDB_API_BASE_URL")
                .or_else(|| var("PUBLIC_TMDB_API_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_TMDB_BASE_URL.to_string()),
            language: var("TMDB_LANGUAGE").unwrap_or_else(|| DEFAULT_TMDB_LANGUAGE.to_string()),
        };

        let crawl_delay = match var("CRAWL_DELAY_MS") {
            Some(ms) => Duration::from_millis(ms.parse().map_err(|_| ConfigError::Invalid {
                name: "CRAWL_DELAY_MS",
                value: ms,
            })?),
            None => Duration::from_millis(DEFAULT_CRAWL_DELAY_MS),
        };

        let storage = match var("R2_BUCKET_NAME") {
            Some(bucket) => {
                let endpoint = var("R2_ENDPOINT")
                    .or_else(|| {
                        var("R2_ACCOUNT_ID")
                            .map(|id| format!("https://{}.r2.cloudflarestorage.com", id))
                    })
                    .ok_or(ConfigError::Missing("R2_ACCOUNT_ID"))?;
                StorageConfig::R2 {
                    bucket,
                    endpoint,
                    access_key_id: var("R2_ACCESS_KEY_ID")
                        .ok_or(ConfigError::Missing("R2_ACCESS_KEY_ID"))?,
                    secret_access_key: var("R2_SECRET_ACCESS_KEY")
                        .ok_or(ConfigError::Missing("R2_SECRET_ACCESS_KEY"))?,
                }
            }
            None => StorageConfig::Local {
                dir: PathBuf::from(
                    var("STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string()),
                ),
            },
        };

        Ok(Config {
            port,
            tmdb,
            storage,
            crawl_delay,
            crawl_on_start: var("CRAWL_ON_START").as_deref() == Some("1"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("TMDB_API_TOKEN", "secret")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org");
        assert_eq!(config.tmdb.language, "zh-CN");
        assert_eq!(config.crawl_delay, Duration::from_millis(300));
        assert!(!config.crawl_on_start);
        assert!(matches!(
            config.storage,
            StorageConfig::Local { ref dir } if dir == &PathBuf::from("./data")
        ));
    }

    #[test]
    fn test_token_is_required() {
        let err = config_from(&[("PORT", "8080")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TMDB_API_TOKEN")));
    }

    #[test]
    fn test_r2_endpoint_from_account_id() {
        let config = config_from(&[
            ("TMDB_API_TOKEN", "secret"),
            ("R2_BUCKET_NAME", "assets"),
            ("R2_ACCOUNT_ID", "abc123"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "shh"),
        ])
        .unwrap();
        match config.storage {
            StorageConfig::R2 { bucket, endpoint, .. } => {
                assert_eq!(bucket, "assets");
                assert_eq!(endpoint, "https://abc123.r2.cloudflarestorage.com");
            }
            other => panic!("unexpected storage: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_delay() {
        let err = config_from(&[("TMDB_API_TOKEN", "t"), ("CRAWL_DELAY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CRAWL_DELAY_MS", .. }));
    }

    #[test]
    fn test_public_base_url_fallback() {
        let config = config_from(&[
            ("TMDB_API_TOKEN", "t"),
            ("PUBLIC_TMDB_API_BASE_URL", "https://tmdb.proxy.example"),
        ])
        .unwrap();
        assert_eq!(config.tmdb.base_url, "https://tmdb.proxy.example");
    }
}
