//! 未读日志摘要邮件配置
//!
//! 摘要任务在每小时的固定分钟触发，并且只在 `[start_hour, end_hour]`
//! 的本地时间窗口内运行。默认与原有 crontab `7 7-23 * * *` 一致。

use serde::{Deserialize, Serialize};

/// 摘要任务配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DigestConfig {
    /// 是否启用摘要任务
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// 每小时的第几分钟触发 (0-59)
    #[serde(default = "default_minute")]
    pub minute: u32,

    /// 时间窗口起始小时 (0-23，包含)
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,

    /// 时间窗口结束小时 (0-23，包含)
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
}

impl DigestConfig {
    /// 校验时间窗口参数
    pub fn validate(&self) -> Result<(), String> {
        if self.minute > 59 {
            return Err(format!("digest.minute {} must be within 0-59", self.minute));
        }
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(format!(
                "digest hours {}-{} must be within 0-23",
                self.start_hour, self.end_hour
            ));
        }
        if self.start_hour > self.end_hour {
            return Err(format!(
                "digest.start_hour {} is after digest.end_hour {}",
                self.start_hour, self.end_hour
            ));
        }
        Ok(())
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            minute: default_minute(),
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
        }
    }
}

fn default_enable() -> bool {
    true
}

fn default_minute() -> u32 {
    7
}

fn default_start_hour() -> u32 {
    7
}

fn default_end_hour() -> u32 {
    23
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_digest_window() {
        let config = DigestConfig::default();
        assert!(config.enable);
        assert_eq!(config.minute, 7);
        assert_eq!((config.start_hour, config.end_hour), (7, 23));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_digest_validation() {
        let mut config = DigestConfig {
            minute: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.minute = 0;
        config.start_hour = 22;
        config.end_hour = 8;
        assert!(config.validate().unwrap_err().contains("after"));

        config.end_hour = 24;
        assert!(config.validate().is_err());
    }
}
