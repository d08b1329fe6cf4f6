//! 应用配置和持久化
//!
//! 提供端口、上传目录、保留期等设置的存储和读取。
//! 所有配置在进程启动时确定，运行期间不可变。

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;

/// 应用设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 设备名称（显示在首页）
    pub device_name: String,
    /// 上传文件的存放目录
    pub upload_dir: PathBuf,
    /// 单个上传的最大字节数
    pub max_upload_bytes: u64,
    /// 文件保留期（秒），超过后由后台清理任务删除
    pub file_ttl_secs: u64,
    /// 清理任务的运行间隔（秒）
    pub sweep_interval_secs: u64,
    /// 清理任务失败后的一次性重试间隔（秒）
    pub sweep_retry_secs: u64,
    /// HTTP 监听端口
    pub port: u16,
    /// 消息日志容量
    pub message_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 500 * 1024 * 1024,
            file_ttl_secs: 3600,
            sweep_interval_secs: 600,
            sweep_retry_secs: 60,
            port: 5000,
            message_capacity: 100,
        }
    }
}

impl AppConfig {
    /// 获取配置文件路径
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cattydrop");
        config_dir.join("config.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 从指定路径加载设置
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn file_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.file_ttl_secs as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_retry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_retry_secs)
    }
}

/// 获取默认设备名称（主机名）
fn default_device_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "Cattydrop".to_string())
}
