//! Attributes - 타입이 있는 키/값 속성 맵
//!
//! 클래스 속성, 스캔 캐시 섹션, 블록리스트 항목이 모두 이 구조를 공유한다.
//! JSON 으로 직렬화할 때는 태그 없이 값 그대로 기록된다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// AttrValue
// ============================================================================

/// 속성 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
    Object(Attributes),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Attributes> {
        match self {
            AttrValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::String(v) => f.write_str(v),
            AttrValue::List(items) => write!(f, "[{} items]", items.len()),
            AttrValue::Object(obj) => write!(f, "{{{} keys}}", obj.len()),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(v: Vec<AttrValue>) -> Self {
        AttrValue::List(v)
    }
}

impl From<Attributes> for AttrValue {
    fn from(v: Attributes) -> Self {
        AttrValue::Object(v)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// 정렬된 속성 맵
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 스타일 설정
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttrValue::as_int)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttrValue::as_bool)
    }

    pub fn get_list(&self, key: &str) -> Option<&[AttrValue]> {
        self.get(key).and_then(AttrValue::as_list)
    }

    pub fn get_object(&self, key: &str) -> Option<&Attributes> {
        self.get(key).and_then(AttrValue::as_object)
    }

    /// 리스트 값에 항목 추가 (없으면 생성, 리스트가 아니면 교체)
    pub fn queue(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let entry = self
            .0
            .entry(key.into())
            .or_insert_with(|| AttrValue::List(Vec::new()));
        match entry {
            AttrValue::List(items) => items.push(value.into()),
            other => *other = AttrValue::List(vec![value.into()]),
        }
    }

    /// 다른 맵의 값을 덮어쓰며 복사
    pub fn merge(&mut self, other: &Attributes) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let attrs = Attributes::new()
            .with("name", "Reverb")
            .with("count", 3)
            .with("enabled", true);

        assert_eq!(attrs.get_str("name"), Some("Reverb"));
        assert_eq!(attrs.get_int("count"), Some(3));
        assert_eq!(attrs.get_bool("enabled"), Some(true));
        assert_eq!(attrs.get_str("count"), None);
        assert_eq!(attrs.get_int("missing"), None);
    }

    #[test]
    fn test_queue_appends() {
        let mut attrs = Attributes::new();
        attrs.queue("Classes", Attributes::new().with("name", "A"));
        attrs.queue("Classes", Attributes::new().with("name", "B"));

        let list = attrs.get_list("Classes").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].as_object().unwrap().get_str("name"), Some("B"));
    }

    #[test]
    fn test_untagged_json_shape() {
        let attrs = Attributes::new()
            .with("numClasses", 2)
            .with("discardable", false)
            .with("version", Attributes::new().with("vendor", "Acme"));

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["numClasses"], 2);
        assert_eq!(json["discardable"], false);
        assert_eq!(json["version"]["vendor"], "Acme");

        let back: Attributes = serde_json::from_value(json).unwrap();
        assert_eq!(back.get_int("numClasses"), Some(2));
        assert_eq!(back.get_object("version").unwrap().get_str("vendor"), Some("Acme"));
    }
}
