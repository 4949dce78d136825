//! 访问校验
//!
//! 所有鉴权判定的唯一入口。给定访问模式、出示的 API Key、调用方地址和
//! （仅管理员路径使用的）目标租户，决定调用方能以哪个租户的身份操作。
//!
//! 校验是纯同步计算：只读取注册表当前快照，不做 I/O，不记录日志，
//! 不修改任何状态，可被任意数量的请求并发调用。

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use super::model::{AccessMode, TenantRecord};
use super::registry::TenantRegistry;

type HmacSha256 = Hmac<Sha256>;

/// 拒绝访问的内部原因
///
/// 只用于日志与指标，不影响对外的错误信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// 没有出示 API Key 或无法确定调用方地址
    MissingCredential,
    /// 没有任何租户在该模式下使用此 Key
    UnknownKey,
    /// Key 有效，但调用方地址不在白名单内
    IpNotAllowed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "missing_credential",
            DenyReason::UnknownKey => "unknown_key",
            DenyReason::IpNotAllowed => "ip_not_allowed",
        }
    }
}

/// 访问校验失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// 注册表为空，服务尚未配置任何租户
    #[error("Setup Incomplete")]
    SetupIncomplete,

    /// 凭证缺失、无效，或来源地址不被允许
    #[error("Access Denied")]
    AccessDenied(DenyReason),

    /// 管理员 Key 指定了不存在的租户
    #[error("Invalid Domain")]
    InvalidDomain,
}

impl AccessError {
    /// 用于日志和指标的原因代码
    pub fn reason_code(&self) -> &'static str {
        match self {
            AccessError::SetupIncomplete => "setup_incomplete",
            AccessError::AccessDenied(reason) => reason.as_str(),
            AccessError::InvalidDomain => "invalid_domain",
        }
    }
}

/// 校验通过后调用方可以操作的租户
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub tenant: String,
    pub mail_to: String,
}

pub struct AccessVerifier {
    registry: Arc<TenantRegistry>,
    admin_salt: [u8; 32],
    admin_tag: Option<Vec<u8>>,
    default_mail_to: String,
}

impl AccessVerifier {
    /// 创建校验器
    ///
    /// 管理员 Key 只以加盐 HMAC 的形式保存，比较时为常数时间。
    /// 空的管理员 Key 表示关闭管理员路径。
    pub fn new(
        registry: Arc<TenantRegistry>,
        admin_key: &str,
        default_mail_to: impl Into<String>,
    ) -> Self {
        let mut admin_salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut admin_salt);

        let admin_tag = if admin_key.is_empty() {
            None
        } else {
            HmacSha256::new_from_slice(&admin_salt).ok().map(|mut mac| {
                mac.update(admin_key.as_bytes());
                mac.finalize().into_bytes().to_vec()
            })
        };

        Self {
            registry,
            admin_salt,
            admin_tag,
            default_mail_to: default_mail_to.into(),
        }
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    pub fn default_mail_to(&self) -> &str {
        &self.default_mail_to
    }

    /// 是否为管理员 Key（常数时间比较）
    pub fn is_admin_key(&self, presented: &str) -> bool {
        let Some(tag) = &self.admin_tag else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.admin_salt) else {
            return false;
        };
        mac.update(presented.as_bytes());
        mac.verify_slice(tag).is_ok()
    }

    /// 校验一次访问
    ///
    /// 判定顺序：
    /// 1. 快照为空 → `SetupIncomplete`
    /// 2. 缺少 Key 或地址 → `AccessDenied`
    /// 3. 管理员 Key → 按 `requested_tenant` 查找租户，收件人固定为系统默认；
    ///    找不到 → `InvalidDomain`。不检查来源地址。
    /// 4. 租户 Key → 按模式查找持有该 Key 的租户并检查白名单
    pub fn verify(
        &self,
        mode: AccessMode,
        presented_key: Option<&str>,
        caller_ip: Option<&str>,
        requested_tenant: Option<&str>,
    ) -> Result<AccessGrant, AccessError> {
        let snapshot = self.registry.current();
        if snapshot.is_empty() {
            return Err(AccessError::SetupIncomplete);
        }

        let (Some(key), Some(ip)) = (presented_key, caller_ip) else {
            return Err(AccessError::AccessDenied(DenyReason::MissingCredential));
        };

        if self.is_admin_key(key) {
            let requested = requested_tenant.unwrap_or_default();
            return snapshot
                .iter()
                .find(|record| !requested.is_empty() && record.tenant == requested)
                .map(|record| AccessGrant {
                    tenant: record.tenant.clone(),
                    mail_to: self.default_mail_to.clone(),
                })
                .ok_or(AccessError::InvalidDomain);
        }

        let record = snapshot
            .iter()
            .find(|record| record.policy(mode).api_key == key)
            .ok_or(AccessError::AccessDenied(DenyReason::UnknownKey))?;

        if !record.policy(mode).allows(ip) {
            return Err(AccessError::AccessDenied(DenyReason::IpNotAllowed));
        }

        Ok(AccessGrant {
            tenant: record.tenant.clone(),
            mail_to: record.mail_to_or(&self.default_mail_to).to_string(),
        })
    }

    /// 租户的任一 API Key 是否与管理员 Key 相同
    ///
    /// `verify` 先匹配管理员 Key，这样的租户 Key 永远无法以租户身份通过校验
    pub fn collides_with_admin_key(&self, record: &TenantRecord) -> bool {
        record.api_keys().iter().any(|key| self.is_admin_key(key))
    }

    /// 校验管理员身份
    ///
    /// 只用于租户管理接口。与 `verify` 不同，空注册表不会被拒绝，
    /// 否则无法创建第一个租户。
    pub fn verify_admin(&self, presented_key: Option<&str>) -> Result<(), AccessError> {
        let key = presented_key.ok_or(AccessError::AccessDenied(DenyReason::MissingCredential))?;
        if self.is_admin_key(key) {
            Ok(())
        } else {
            Err(AccessError::AccessDenied(DenyReason::UnknownKey))
        }
    }
}
