//! 오라클 응답 본문 해석.
//!
//! 본문 정규화 → `<answer>…</answer>` 추출 → `Decision` JSON 파싱.

use twinfarm_core::error::OracleFailure;
use twinfarm_core::models::decision::Decision;

const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";

/// 로그/에러 메시지에 남길 원문 최대 길이
const RAW_PREVIEW_CHARS: usize = 200;

/// HTTP 응답 본문을 텍스트로 정규화.
///
/// - JSON 문자열 → 언래핑된 문자열
/// - JSON 객체/배열 → 문자열 값들을 줄바꿈으로 이은 텍스트 (이스케이프 없이)
/// - 그 외 JSON 값 → 직렬화 텍스트
/// - JSON이 아니면 원문 그대로
pub fn normalize_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(text)) => text,
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            let mut leaves = Vec::new();
            collect_strings(&value, &mut leaves);
            leaves.join("\n")
        }
        Ok(other) => other.to_string(),
        Err(_) => body.to_string(),
    }
}

/// 문서 순서대로 문자열 값 수집
fn collect_strings<'a>(value: &'a serde_json::Value, out: &mut Vec<&'a str>) {
    match value {
        serde_json::Value::String(text) => out.push(text),
        serde_json::Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        serde_json::Value::Object(fields) => fields.values().for_each(|field| collect_strings(field, out)),
        _ => {}
    }
}

/// 첫 번째 `<answer>`와 그 뒤 첫 번째 `</answer>` 사이 텍스트 (앞뒤 공백 제거)
pub fn extract_answer(text: &str) -> Result<&str, OracleFailure> {
    let start = text
        .find(ANSWER_OPEN)
        .ok_or(OracleFailure::MissingDelimiter)?
        + ANSWER_OPEN.len();
    let len = text[start..]
        .find(ANSWER_CLOSE)
        .ok_or(OracleFailure::MissingDelimiter)?;
    Ok(text[start..start + len].trim())
}

/// 마크다운 코드 펜스(```json … ```) 제거
fn strip_code_fence(payload: &str) -> &str {
    let Some(rest) = payload.strip_prefix("```") else {
        return payload;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 정규화된 응답 텍스트에서 결정 파싱
pub fn parse_decision(text: &str) -> Result<Decision, OracleFailure> {
    let payload = strip_code_fence(extract_answer(text)?);
    serde_json::from_str(payload).map_err(|e| {
        OracleFailure::MalformedPayload(format!(
            "{} (raw: {})",
            e,
            payload.chars().take(RAW_PREVIEW_CHARS).collect::<String>()
        ))
    })
}
