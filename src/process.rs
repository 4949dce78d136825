//! 进程管理
//!
//! PID 文件的写入与清理，以及绑定端口后切换运行用户

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ProcessManager;

impl ProcessManager {
    /// 写入 PID 文件，返回实际写入的路径
    pub fn write_pid_file(pid_path: Option<&str>) -> Result<Option<PathBuf>> {
        let Some(path_str) = pid_path else {
            return Ok(None);
        };
        let path = Path::new(path_str);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create PID file directory: {parent:?}"))?;
        }

        if let Ok(previous) = fs::read_to_string(path) {
            warn!(
                "Overwriting existing PID file {:?} (previous PID: {})",
                path,
                previous.trim()
            );
        }

        let pid = std::process::id();
        let mut file =
            fs::File::create(path).with_context(|| format!("Failed to create PID file: {path:?}"))?;
        writeln!(file, "{pid}").with_context(|| format!("Failed to write PID to file: {path:?}"))?;

        info!("PID file written: {:?} (PID: {})", path, pid);
        Ok(Some(path.to_path_buf()))
    }

    pub fn remove_pid_file(pid_path: Option<&PathBuf>) {
        let Some(path) = pid_path else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => info!("PID file removed: {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {:?}: {}", path, e),
        }
    }

    /// 切换运行用户和组
    ///
    /// 只有 root 能切换；先切组再切用户。未指定组时使用用户的主组。
    #[cfg(unix)]
    pub fn drop_privileges(user: Option<&str>, group: Option<&str>) -> Result<()> {
        use nix::unistd::{Group, Uid, User, setgid, setuid};

        if !Uid::current().is_root() {
            if user.is_some() || group.is_some() {
                warn!("Not running as root, cannot switch user/group");
            }
            return Ok(());
        }

        if let Some(group_name) = group {
            let group_info = Group::from_name(group_name)?
                .ok_or_else(|| anyhow::anyhow!("Group '{group_name}' not found"))?;
            clear_supplementary_groups()?;
            setgid(group_info.gid)
                .with_context(|| format!("Failed to set group ID to {group_name}"))?;
            info!("Switched to group: {} (GID: {})", group_name, group_info.gid);
        }

        if let Some(user_name) = user {
            let user_info = User::from_name(user_name)?
                .ok_or_else(|| anyhow::anyhow!("User '{user_name}' not found"))?;

            if group.is_none() {
                clear_supplementary_groups()?;
                setgid(user_info.gid)
                    .with_context(|| format!("Failed to set primary group for user {user_name}"))?;
            }

            // 放弃 root 权限，必须最后执行
            setuid(user_info.uid).with_context(|| format!("Failed to set user ID to {user_name}"))?;
            info!("Switched to user: {} (UID: {})", user_name, user_info.uid);
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn drop_privileges(user: Option<&str>, group: Option<&str>) -> Result<()> {
        if user.is_some() || group.is_some() {
            warn!("User/group switching is not supported on this platform");
        }
        Ok(())
    }
}

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", target_os = "redox", target_os = "haiku"))))]
fn clear_supplementary_groups() -> Result<()> {
    nix::unistd::setgroups(&[]).context("Failed to clear supplementary groups")
}

#[cfg(all(unix, any(target_os = "macos", target_os = "ios", target_os = "redox", target_os = "haiku")))]
fn clear_supplementary_groups() -> Result<()> {
    Ok(())
}

/// 离开作用域时删除 PID 文件
pub struct PidFileGuard {
    path: Option<PathBuf>,
}

impl PidFileGuard {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        ProcessManager::remove_pid_file(self.path.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/logkeeper.pid");
        let path_str = path.display().to_string();

        let written = ProcessManager::write_pid_file(Some(&path_str)).unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(PidFileGuard::new(written));
        assert!(!path.exists());
    }

    #[test]
    fn test_no_pid_path_is_noop() {
        assert!(ProcessManager::write_pid_file(None).unwrap().is_none());
        ProcessManager::remove_pid_file(None);
    }
}
