//! ClassId - 클래스 고유 식별자

use plugforge_foundation::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128비트 클래스 식별자
///
/// 문자열 형식은 `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` (대문자, 중괄호 포함).
/// nil UID 는 유효하지 않은 식별자로 취급되어 레지스트리에 등록될 수 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClassId(Uuid);

impl ClassId {
    /// 유효하지 않은 식별자
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// 무작위 식별자 생성
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }

    /// 문자열 파싱. 중괄호는 있어도 없어도 된다.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);
        Uuid::parse_str(inner).ok().map(Self)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Uuid::encode_buffer();
        write!(f, "{{{}}}", self.0.hyphenated().encode_upper(&mut buf))
    }
}

impl FromStr for ClassId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("Invalid class id: {}", s)))
    }
}

impl From<Uuid> for ClassId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid class id: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let id = ClassId::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(id.to_string(), "{01234567-89AB-CDEF-0123-456789ABCDEF}");
    }

    #[test]
    fn test_parse_with_and_without_braces() {
        let id = ClassId::generate();
        let text = id.to_string();
        assert_eq!(ClassId::parse(&text), Some(id));
        assert_eq!(ClassId::parse(text.trim_matches(|c| c == '{' || c == '}')), Some(id));
        assert_eq!(ClassId::parse(&text.to_lowercase()), Some(id));
        assert!(ClassId::parse("Reverb").is_none());
        assert!("not-a-uid".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_nil_is_invalid() {
        assert!(!ClassId::nil().is_valid());
        assert!(!ClassId::default().is_valid());
        assert!(ClassId::generate().is_valid());
    }
}
