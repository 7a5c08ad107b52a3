//! Class Store - 식별자 인덱스 + 카테고리 버킷

use super::{ClassDescriptor, ClassId};
use crate::hooks::HookList;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// 등록된 클래스 저장소
///
/// 식별자 인덱스와 카테고리 버킷은 항상 같은 디스크립터 집합을 가리킨다.
/// 동기화는 소유자(레지스트리)의 락이 담당한다.
#[derive(Debug, Default)]
pub struct ClassStore {
    /// 식별자 → 디스크립터
    by_id: HashMap<ClassId, Arc<ClassDescriptor>>,

    /// 카테고리 → 등록 순서대로의 디스크립터
    categories: HashMap<String, Vec<Arc<ClassDescriptor>>>,

    /// 대체 클래스 조회에 실패한 식별자 (부정 캐시)
    alternative_misses: HashSet<ClassId>,
}

impl ClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 클래스 추가
    ///
    /// 유효하지 않은 식별자, 중복 식별자, 필터 거부 시 `false`. 먼저 등록된 쪽이 유지된다.
    pub fn add(&mut self, class: Arc<ClassDescriptor>, hooks: &HookList) -> bool {
        let class_id = class.class_id();
        if !class_id.is_valid() {
            warn!("Rejected class '{}' with invalid id", class.name());
            return false;
        }

        if let Some(existing) = self.by_id.get(&class_id) {
            if existing.name() != class.name() {
                warn!(
                    "UID conflict on class registration: '{}' ignored, {} already used by '{}'",
                    class.name(),
                    class_id,
                    existing.name()
                );
            }
            return false;
        }

        if !hooks.accepts(&class) {
            debug!("Class '{}' rejected by filter", class.name());
            return false;
        }

        self.categories
            .entry(class.category().to_string())
            .or_default()
            .push(class.clone());
        self.by_id.insert(class_id, class);

        // 새 클래스가 이전 실패를 해결할 수 있음
        self.alternative_misses.clear();
        true
    }

    /// 클래스 제거. 등록되어 있던 바로 그 디스크립터일 때만 제거된다.
    pub fn remove(&mut self, class: &Arc<ClassDescriptor>) -> bool {
        match self.by_id.get(&class.class_id()) {
            Some(existing) if Arc::ptr_eq(existing, class) => {}
            _ => return false,
        }
        self.by_id.remove(&class.class_id());
        self.remove_from_category(class);
        class.unlink();
        true
    }

    /// 조건에 맞는 클래스를 모두 제거하고 반환
    pub fn remove_where(
        &mut self,
        predicate: impl Fn(&ClassDescriptor) -> bool,
    ) -> Vec<Arc<ClassDescriptor>> {
        let removed: Vec<_> = self
            .by_id
            .values()
            .filter(|class| predicate(class))
            .cloned()
            .collect();
        for class in &removed {
            self.by_id.remove(&class.class_id());
            self.remove_from_category(class);
            class.unlink();
        }
        removed
    }

    fn remove_from_category(&mut self, class: &Arc<ClassDescriptor>) {
        if let Some(bucket) = self.categories.get_mut(class.category()) {
            bucket.retain(|c| !Arc::ptr_eq(c, class));
            if bucket.is_empty() {
                self.categories.remove(class.category());
            }
        }
    }

    /// 모든 클래스 제거
    pub fn clear(&mut self) -> Vec<Arc<ClassDescriptor>> {
        self.categories.clear();
        self.alternative_misses.clear();
        let removed: Vec<_> = self.by_id.drain().map(|(_, class)| class).collect();
        for class in &removed {
            class.unlink();
        }
        removed
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get(&self, class_id: &ClassId) -> Option<Arc<ClassDescriptor>> {
        self.by_id.get(class_id).cloned()
    }

    pub fn contains(&self, class_id: &ClassId) -> bool {
        self.by_id.contains_key(class_id)
    }

    /// `category:name` / `category:subCategory:name` 형식 이름으로 조회
    ///
    /// 이름은 마지막 `:` 뒤, 하위 카테고리는 나머지에서 첫 `:` 뒤이다.
    /// 하위 카테고리가 지정되지 않으면 하위 카테고리와 무관하게 일치시킨다.
    pub fn find_by_name(&self, qualified_name: &str) -> Option<Arc<ClassDescriptor>> {
        let (prefix, name) = qualified_name.rsplit_once(':')?;
        let (category, sub_category) = match prefix.split_once(':') {
            Some((category, sub)) => (category, Some(sub)),
            None => (prefix, None),
        };

        self.categories.get(category)?.iter().find(|class| {
            class.name() == name && sub_category.map_or(true, |sub| class.sub_category() == sub)
        })
        .cloned()
    }

    /// 카테고리의 클래스 목록 (등록 순서)
    pub fn category(&self, category: &str) -> Vec<Arc<ClassDescriptor>> {
        self.categories.get(category).cloned().unwrap_or_default()
    }

    pub fn category_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.categories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassDescriptor>> {
        self.by_id.values()
    }

    // ========================================================================
    // 대체 클래스 부정 캐시
    // ========================================================================

    pub fn is_known_alternative_miss(&self, class_id: &ClassId) -> bool {
        self.alternative_misses.contains(class_id)
    }

    pub fn record_alternative_miss(&mut self, class_id: ClassId) {
        self.alternative_misses.insert(class_id);
    }

    pub fn invalidate_alternative_misses(&mut self) {
        self.alternative_misses.clear();
    }
}
