//! 계정 설정 모델.
//!
//! 프로비저닝 도구가 계정마다 생성하는 `config.json` 레코드.
//! 코어는 읽기만 하며, 외부 명령에 전달하기 전에 반드시 `validate()`를 거친다.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// 계정별 디바이스/네트워크 설정 (불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 계정 ID (예: "01")
    #[serde(default)]
    pub account_id: String,
    /// 위장 MAC 주소 (xx:xx:xx:xx:xx:xx)
    pub mac_address: String,
    /// 위장 디바이스 모델명 (예: "Pixel 7")
    #[serde(rename = "model")]
    pub device_model: String,
    /// IANA 타임존 (예: "America/New_York")
    pub timezone: String,
    /// 프록시 설정
    #[serde(flatten)]
    pub proxy: ProxyConfig,
}

/// 계정 프록시 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 프록시 호스트
    #[serde(rename = "proxy_ip")]
    pub ip: String,
    /// 프록시 포트 (숫자 또는 숫자 문자열 허용)
    #[serde(rename = "proxy_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    /// 프록시 사용자명
    #[serde(rename = "proxy_user")]
    pub user: String,
    /// 프록시 비밀번호
    #[serde(rename = "proxy_pass")]
    pub pass: String,
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse::<u16>()
            .map_err(|e| serde::de::Error::custom(format!("잘못된 proxy_port '{text}': {e}"))),
    }
}

impl AccountConfig {
    /// 외부 명령 인자로 쓰이는 모든 필드 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_account_id(&self.account_id)?;
        validate_mac_address(&self.mac_address)?;
        validate_device_model(&self.device_model)?;
        validate_timezone(&self.timezone)?;
        if self.proxy.ip.trim().is_empty() {
            return Err(CoreError::validation("proxy_ip", "비어 있음"));
        }
        Ok(())
    }
}

/// 계정 ID 검증: `[A-Za-z0-9_-]{1,32}`
pub fn validate_account_id(account_id: &str) -> Result<(), CoreError> {
    if account_id.is_empty() || account_id.len() > 32 {
        return Err(CoreError::validation("account_id", "길이는 1~32자"));
    }
    if !account_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::validation(
            "account_id",
            format!("허용되지 않은 문자 포함: {account_id}"),
        ));
    }
    Ok(())
}

fn validate_mac_address(mac: &str) -> Result<(), CoreError> {
    let octets: Vec<&str> = mac.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return Err(CoreError::validation(
            "mac_address",
            format!("xx:xx:xx:xx:xx:xx 형식 아님: {mac}"),
        ));
    }
    Ok(())
}

fn validate_device_model(model: &str) -> Result<(), CoreError> {
    if model.trim().is_empty() || model.len() > 64 {
        return Err(CoreError::validation("model", "길이는 1~64자"));
    }
    if !model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
    {
        return Err(CoreError::validation(
            "model",
            format!("허용되지 않은 문자 포함: {model}"),
        ));
    }
    Ok(())
}

fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    if timezone.is_empty() || timezone.len() > 64 {
        return Err(CoreError::validation("timezone", "길이는 1~64자"));
    }
    if timezone.starts_with('/') || timezone.contains("..") {
        return Err(CoreError::validation(
            "timezone",
            format!("경로 형태 불가: {timezone}"),
        ));
    }
    if !timezone
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '+' | '-'))
    {
        return Err(CoreError::validation(
            "timezone",
            format!("허용되지 않은 문자 포함: {timezone}"),
        ));
    }
    Ok(())
}

/// 계정 선택자 파싱.
///
/// `"01-20"` 같은 범위는 왼쪽 값의 자릿수로 0-패딩하여 확장하고,
/// `"01,05,x9"` 같은 목록은 순서를 유지한다. 두 형식을 쉼표로 섞을 수 있다.
pub fn parse_account_selector(selector: &str) -> Result<Vec<String>, CoreError> {
    let mut ids = Vec::new();
    for part in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) if is_numeric(start) && is_numeric(end) => {
                let width = start.len();
                let from: u32 = start
                    .parse()
                    .map_err(|_| CoreError::validation("accounts", format!("잘못된 범위: {part}")))?;
                let to: u32 = end
                    .parse()
                    .map_err(|_| CoreError::validation("accounts", format!("잘못된 범위: {part}")))?;
                if from > to {
                    return Err(CoreError::validation(
                        "accounts",
                        format!("역순 범위: {part}"),
                    ));
                }
                ids.extend((from..=to).map(|n| format!("{n:0width$}")));
            }
            _ => {
                validate_account_id(part)?;
                ids.push(part.to_string());
            }
        }
    }
    if ids.is_empty() {
        return Err(CoreError::validation("accounts", "계정이 비어 있음"));
    }
    Ok(ids)
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
pub(crate) fn sample_account(account_id: &str) -> AccountConfig {
    AccountConfig {
        account_id: account_id.to_string(),
        mac_address: "02:1a:2b:3c:4d:5e".to_string(),
        device_model: "Pixel 7".to_string(),
        timezone: "America/New_York".to_string(),
        proxy: ProxyConfig {
            ip: "203.0.113.7".to_string(),
            port: 8080,
            user: "user".to_string(),
            pass: "secret".to_string(),
        },
    }
}
