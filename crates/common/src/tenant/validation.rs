//! 租户验证逻辑
//!
//! 创建租户时的结构校验。IP 白名单只在创建时要求非空，之后不再复查。

use super::error::TenantError;
use super::model::{AccessPolicy, TenantRecord};

impl TenantRecord {
    /// 校验记录是否可以被创建
    ///
    /// 只检查记录自身的结构；与已有记录的唯一性冲突由存储层负责
    pub fn validate(&self) -> Result<(), TenantError> {
        if self.tenant.trim().is_empty() {
            return Err(TenantError::ValidationError(
                "tenant cannot be empty".to_string(),
            ));
        }

        validate_policy("read", &self.read)?;
        validate_policy("write", &self.write)?;

        Ok(())
    }

    /// 读写两个模式是否使用了同一个 API Key
    pub fn has_shared_key(&self) -> bool {
        self.read.api_key == self.write.api_key
    }
}

fn validate_policy(mode: &str, policy: &AccessPolicy) -> Result<(), TenantError> {
    if policy.api_key.trim().is_empty() {
        return Err(TenantError::ValidationError(format!(
            "{mode}.apiKey cannot be empty"
        )));
    }
    if policy.ips.is_empty() {
        return Err(TenantError::ValidationError(format!(
            "{mode}.ips must contain at least one address"
        )));
    }
    if policy.ips.iter().any(|ip| ip.trim().is_empty()) {
        return Err(TenantError::ValidationError(format!(
            "{mode}.ips contains an empty address"
        )));
    }
    Ok(())
}
