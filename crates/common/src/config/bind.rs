use serde::{Deserialize, Serialize};

/// 网络绑定配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BindConfig {
    /// HTTP 服务绑定配置
    ///
    /// 服务本身只监听明文 HTTP，生产环境应放在 NGINX 等反向代理之后，
    /// 并配合 `trust_proxy = true` 读取真实客户端地址。
    #[serde(default)]
    pub http: HttpBindConfig,
}

/// HTTP 服务绑定配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpBindConfig {
    /// 绑定 IP 地址
    ///
    /// 通常使用 "0.0.0.0" 监听所有接口。
    pub ip: String,

    /// 绑定端口
    ///
    /// 设置为 0 时由操作系统分配端口（仅用于测试）。
    pub port: u16,
}

impl HttpBindConfig {
    /// 返回 `ip:port` 形式的监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for HttpBindConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}
