//! 인지 프레임 모델.

use chrono::{DateTime, Utc};

/// PNG 파일 시그니처
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 루프 1회분 스크린샷 + 지시문. 매 반복마다 만들고 버린다.
#[derive(Debug, Clone)]
pub struct PerceptionFrame {
    /// PNG 이미지 바이트
    pub image: Vec<u8>,
    /// 오라클에 전달할 지시문
    pub instruction: String,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
}

impl PerceptionFrame {
    /// 새 프레임 생성
    pub fn new(image: Vec<u8>, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
            captured_at: Utc::now(),
        }
    }

    /// PNG 시그니처로 시작하는지
    pub fn is_png(&self) -> bool {
        self.image.starts_with(&PNG_SIGNATURE)
    }
}
