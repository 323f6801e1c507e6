//! Runtime configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config:
//!
//! ```toml
//! cache_dir = "data/cache"
//! stock_dir = "data/stock"
//!
//! [http]
//! timeout_secs = 10
//!
//! [endpoints]
//! sina_kline = "http://money.finance.sina.com.cn/quotes_service/api/json_v2.php/CN_MarketData.getKLineData"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AshareConfig {
    /// Directory holding one latest-only file per (symbol, granularity).
    pub cache_dir: PathBuf,
    /// Root of the date-partitioned archive.
    pub stock_dir: PathBuf,
    pub http: HttpConfig,
    pub endpoints: Endpoints,
}

impl Default for AshareConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/cache"),
            stock_dir: PathBuf::from("data/stock"),
            http: HttpConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl AshareConfig {
    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// HTTP client settings shared by every provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout. A timed-out call fails that provider only.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Base URLs of the public quote endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    /// Sina scale-parameterized kline endpoint.
    pub sina_kline: String,
    /// Tencent forward-adjusted day/week/month kline endpoint.
    pub tencent_kline: String,
    /// Tencent recent-minute-bars endpoint.
    pub tencent_minute: String,
    /// Tencent realtime quote (`~`-separated), symbol appended.
    pub tencent_quote: String,
    /// Sina realtime quote (JS wrapper), symbol appended.
    pub sina_quote: String,
    /// Sina market-node listing used for name search.
    pub sina_market_node: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sina_kline: "http://money.finance.sina.com.cn/quotes_service/api/json_v2.php/CN_MarketData.getKLineData".to_string(),
            tencent_kline: "http://web.ifzq.gtimg.cn/appstock/app/fqkline/get".to_string(),
            tencent_minute: "http://ifzq.gtimg.cn/appstock/app/kline/mkline".to_string(),
            tencent_quote: "http://qt.gtimg.cn/q=".to_string(),
            sina_quote: "http://hq.sinajs.cn/list=".to_string(),
            sina_market_node: "http://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php/Market_Center.getHQNodeData".to_string(),
        }
    }
}
