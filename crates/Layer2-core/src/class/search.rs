//! Class Search - 카테고리 내 클래스 검색

use super::ClassDescriptor;
use std::sync::Arc;

/// 하위 카테고리 접두사 매칭에 필요한 최소 검색어 길이
const MIN_SUB_CATEGORY_TERMS: usize = 3;

/// 검색 조건
#[derive(Debug, Clone, Default)]
pub struct SearchDescription {
    /// 검색어
    pub terms: String,

    /// 대소문자 구분
    pub match_case: bool,
}

impl SearchDescription {
    pub fn new(terms: impl Into<String>) -> Self {
        Self {
            terms: terms.into(),
            match_case: false,
        }
    }

    pub fn match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }
}

/// 클래스 검색기
#[derive(Debug)]
pub struct ClassSearcher {
    terms: String,
    match_case: bool,
}

impl ClassSearcher {
    pub fn new(description: &SearchDescription) -> Self {
        let terms = description.terms.trim();
        Self {
            terms: if description.match_case {
                terms.to_string()
            } else {
                terms.to_lowercase()
            },
            match_case: description.match_case,
        }
    }

    fn normalize<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        if self.match_case {
            std::borrow::Cow::Borrowed(text)
        } else {
            std::borrow::Cow::Owned(text.to_lowercase())
        }
    }

    fn contains(&self, text: &str) -> bool {
        !text.is_empty() && self.normalize(text).contains(self.terms.as_str())
    }

    /// 클래스가 검색어와 일치하는지
    ///
    /// 지역화된 이름, 클래스 제작사, 모듈 제작사, 대체 클래스 이름을 부분 문자열로 비교하고,
    /// 검색어가 충분히 길면 `/` 로 구분된 하위 카테고리 토큰의 접두사도 비교한다.
    pub fn matches(&self, class: &ClassDescriptor) -> bool {
        if self.terms.is_empty() {
            return true;
        }

        if self.contains(&class.localized_name())
            || class.vendor().is_some_and(|v| self.contains(&v))
            || self.contains(&class.version().vendor)
            || class.alternative_class_name().is_some_and(|n| self.contains(&n))
        {
            return true;
        }

        if self.terms.chars().count() >= MIN_SUB_CATEGORY_TERMS {
            let sub_category = class.localized_sub_category();
            return sub_category
                .split('/')
                .any(|token| self.normalize(token.trim()).starts_with(self.terms.as_str()));
        }
        false
    }

    /// 일치하는 클래스의 URL 목록
    pub fn search<'a>(&self, classes: impl IntoIterator<Item = &'a Arc<ClassDescriptor>>) -> Vec<String> {
        classes
            .into_iter()
            .filter(|class| self.matches(class))
            .map(|class| class.class_url())
            .collect()
    }
}
