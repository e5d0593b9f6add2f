//! 계정 설정 저장소.
//!
//! 레이아웃: `<root>/data_<account_id>/config.json` (프로비저닝 도구 출력 형식)

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CoreError;
use crate::models::account::{validate_account_id, AccountConfig};

/// 계정 설정 파일 이름
const ACCOUNT_CONFIG_FILE: &str = "config.json";

/// 파일 기반 계정 설정 저장소
#[derive(Debug, Clone)]
pub struct AccountStore {
    root: PathBuf,
}

impl AccountStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 계정 설정 파일 경로
    pub fn path_for(&self, account_id: &str) -> PathBuf {
        self.root
            .join(format!("data_{account_id}"))
            .join(ACCOUNT_CONFIG_FILE)
    }

    /// 계정 설정 로드.
    ///
    /// 파일이 없으면 `CoreError::ConfigMissing`. 파일의 `account_id`가 비어 있으면
    /// 디렉토리 이름의 ID로 채운다.
    pub fn load(&self, account_id: &str) -> Result<AccountConfig, CoreError> {
        validate_account_id(account_id)?;
        let path = self.path_for(account_id);
        if !path.exists() {
            return Err(CoreError::ConfigMissing {
                account_id: account_id.to_string(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let mut config: AccountConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("계정 설정 파싱 실패: {}: {}", path.display(), e))
        })?;

        if config.account_id.is_empty() {
            config.account_id = account_id.to_string();
        } else if config.account_id != account_id {
            return Err(CoreError::validation(
                "account_id",
                format!(
                    "디렉토리({account_id})와 파일({})의 계정 ID 불일치",
                    config.account_id
                ),
            ));
        }

        debug!(account_id, path = %path.display(), "계정 설정 로드");
        Ok(config)
    }

    /// 계정 설정 저장 (디렉토리 자동 생성)
    pub fn save(&self, config: &AccountConfig) -> Result<PathBuf, CoreError> {
        validate_account_id(&config.account_id)?;
        let path = self.path_for(&config.account_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::sample_account;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_is_identical() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path());
        let config = sample_account("04");

        let path = store.save(&config).unwrap();
        assert!(path.ends_with("data_04/config.json"));

        let loaded = store.load("04").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_config_missing() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path());

        let err = store.load("07").unwrap_err();
        assert!(matches!(err, CoreError::ConfigMissing { ref account_id } if account_id == "07"));
    }

    #[test]
    fn empty_account_id_filled_from_directory() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path());
        let mut config = sample_account("09");
        config.account_id = String::new();

        let path = store.path_for("09");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = store.load("09").unwrap();
        assert_eq!(loaded.account_id, "09");
    }

    #[test]
    fn mismatched_account_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path());
        let config = sample_account("10");
        let path = store.path_for("11");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert!(matches!(
            store.load("11"),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn traversal_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path());
        assert!(store.load("../etc").is_err());
    }
}
