use anyhow::Result;
use ethers::types::U256;
use ethers::utils::parse_ether;
use models::{TxMode, DEFAULT_RUN_DURATION, MAX_RUN_DURATION};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// 默认出价服务地址
///
/// 必须是 bidder 节点的 HTTP 网关端口 (13523)，13524 是 gRPC 端口
pub const DEFAULT_BIDDER_ADDRESS: &str = "mev-commit-bidder:13523";
/// 默认 blob 数量
pub const DEFAULT_NUM_BLOBS: usize = 6;

/// 启动期配置错误，全部为致命错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("RPC_ENDPOINT environment variable is required when USE_PAYLOAD is false")]
    MissingRpcEndpoint,

    #[error("environment variable {name} must be true or false, got '{value}'")]
    InvalidBool { name: &'static str, value: String },

    #[error("environment variable {name} must be a non-negative integer in range, got '{value}'")]
    InvalidUint { name: &'static str, value: String },

    #[error("environment variable {name} must be an ETH amount, got '{value}'")]
    InvalidEther { name: &'static str, value: String },

    #[error("only one of ETH_TRANSFER or BLOB can be set at a time")]
    ConfigConflict,

    #[error("bid range is empty: min {min} wei > max {max} wei")]
    InvalidBidRange { min: U256, max: U256 },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bidder: BidderConfig,
    pub chain: ChainConfig,
    pub wallet: WalletConfig,
    pub preconf: PreconfConfig,
    pub dial: DialConfig,
    pub log: LogConfig,
}

/// 出价服务配置
#[derive(Debug, Clone)]
pub struct BidderConfig {
    /// 出价服务 HTTP 网关地址 (可不带 scheme)
    pub address: String,
}

impl BidderConfig {
    /// 带 scheme 的 HTTP 基础地址
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }
}

/// 链端点配置
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// WebSocket 端点 (区块头订阅，始终需要)
    pub ws_endpoint: String,
    /// RPC 端点 (仅在 bundle 中继模式下需要)
    pub rpc_endpoint: Option<String>,
}

#[derive(Clone)]
pub struct WalletConfig {
    pub private_key: String,
}

// 私钥不进日志
impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &"*****")
            .finish()
    }
}

/// 预确认出价配置
#[derive(Debug, Clone)]
pub struct PreconfConfig {
    /// true: 出价携带完整交易; false: 先发 bundle 再以哈希出价
    pub use_payload: bool,
    /// 目标区块偏移
    pub offset: u64,
    /// 交易模式，None 表示未启用
    pub mode: Option<TxMode>,
    /// blob 交易携带的 blob 数量
    pub num_blobs: usize,
    /// 自转账金额 (wei)
    pub transfer_amount_wei: U256,
    /// 出价下限 (wei)
    pub bid_min_wei: U256,
    /// 出价上限 (wei)
    pub bid_max_wei: U256,
    /// 运行时长
    pub run_duration: Duration,
}

/// RPC 拨号配置
#[derive(Debug, Clone)]
pub struct DialConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
}

/// 校验交易模式开关 (两者互斥)
pub fn mode_from_flags(eth_transfer: bool, blob: bool) -> Result<Option<TxMode>, ConfigError> {
    match (eth_transfer, blob) {
        (true, true) => Err(ConfigError::ConfigConflict),
        (true, false) => Ok(Some(TxMode::SelfTransfer)),
        (false, true) => Ok(Some(TxMode::Blob)),
        (false, false) => Ok(None),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // 加载 .env 文件
        dotenv::dotenv().ok();

        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// 从任意 key/value 来源构建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // 出价服务
        let bidder = BidderConfig {
            address: get("BIDDER_ADDRESS").unwrap_or_else(|| DEFAULT_BIDDER_ADDRESS.to_string()),
        };

        let use_payload = parse_bool("USE_PAYLOAD", get("USE_PAYLOAD"), true)?;

        // 只有在中继模式下才需要 RPC 端点
        let rpc_endpoint = if use_payload {
            None
        } else {
            Some(get("RPC_ENDPOINT").ok_or(ConfigError::MissingRpcEndpoint)?)
        };

        let ws_endpoint = get("WS_ENDPOINT").ok_or(ConfigError::Missing("WS_ENDPOINT"))?;
        let private_key = get("PRIVATE_KEY").ok_or(ConfigError::Missing("PRIVATE_KEY"))?;

        let offset = parse_uint("OFFSET", get("OFFSET"), 1)?;

        // 模式开关 (可选，但不能同时开启)
        let mode = mode_from_flags(
            parse_bool("ETH_TRANSFER", get("ETH_TRANSFER"), false)?,
            parse_bool("BLOB", get("BLOB"), false)?,
        )?;

        let num_blobs = parse_uint("NUM_BLOBS", get("NUM_BLOBS"), DEFAULT_NUM_BLOBS as u64)? as usize;

        let transfer_amount_wei = match get("TRANSFER_AMOUNT_WEI") {
            Some(value) => U256::from_dec_str(&value).map_err(|_| ConfigError::InvalidUint {
                name: "TRANSFER_AMOUNT_WEI",
                value,
            })?,
            None => U256::exp10(15),
        };

        let bid_min_wei = parse_eth("BID_MIN_ETH", get("BID_MIN_ETH"), "0.0002")?;
        let bid_max_wei = parse_eth("BID_MAX_ETH", get("BID_MAX_ETH"), "0.001")?;
        if bid_min_wei > bid_max_wei {
            return Err(ConfigError::InvalidBidRange {
                min: bid_min_wei,
                max: bid_max_wei,
            });
        }

        let run_duration = match get("RUN_DURATION_HOURS") {
            Some(value) => parse_run_duration(value)?,
            None => DEFAULT_RUN_DURATION,
        };

        let max_attempts = match get("RPC_DIAL_ATTEMPTS") {
            Some(value) => {
                let n = parse_uint("RPC_DIAL_ATTEMPTS", Some(value.clone()), 0)?;
                u32::try_from(n).map_err(|_| ConfigError::InvalidUint {
                    name: "RPC_DIAL_ATTEMPTS",
                    value,
                })?
            }
            None => 5,
        };

        let dial = DialConfig {
            max_attempts,
            attempt_timeout: Duration::from_secs(parse_uint(
                "RPC_DIAL_TIMEOUT_SECS",
                get("RPC_DIAL_TIMEOUT_SECS"),
                30,
            )?),
        };

        // 日志配置
        let log = LogConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        Ok(Self {
            bidder,
            chain: ChainConfig {
                ws_endpoint,
                rpc_endpoint,
            },
            wallet: WalletConfig { private_key },
            preconf: PreconfConfig {
                use_payload,
                offset,
                mode,
                num_blobs,
                transfer_amount_wei,
                bid_min_wei,
                bid_max_wei,
                run_duration,
            },
            dial,
            log,
        })
    }
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .to_lowercase()
            .parse()
            .map_err(|_| ConfigError::InvalidBool { name, value }),
    }
}

fn parse_uint(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidUint { name, value }),
    }
}

/// 小时数转时长，不超过 `MAX_RUN_DURATION`
fn parse_run_duration(value: String) -> Result<Duration, ConfigError> {
    let hours = parse_uint("RUN_DURATION_HOURS", Some(value.clone()), 0)?;
    match hours.checked_mul(3600) {
        Some(secs) if secs <= MAX_RUN_DURATION.as_secs() => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidUint {
            name: "RUN_DURATION_HOURS",
            value,
        }),
    }
}

fn parse_eth(name: &'static str, value: Option<String>, default: &str) -> Result<U256, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    parse_ether(&value).map_err(|_| ConfigError::InvalidEther { name, value })
}
