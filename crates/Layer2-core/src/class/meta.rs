//! 잘 알려진 클래스 속성 키

/// 클래스 제작사
pub const CLASS_VENDOR: &str = "Class:Vendor";

/// 지역화된 이름
pub const LOCALIZED_NAME: &str = "Class:LocalizedName";

/// 지역화된 하위 카테고리
pub const LOCALIZED_SUB_CATEGORY: &str = "Class:LocalizedSubCategory";

/// 지역화된 설명
pub const LOCALIZED_DESCRIPTION: &str = "Class:LocalizedDescription";

/// 대체 클래스 ID (쉼표로 구분된 목록 가능)
pub const ALTERNATIVE_CLASS_ID: &str = "Class:AlternativeClassID";

/// 대체 클래스 이름 (검색용)
pub const ALTERNATIVE_CLASS_NAME: &str = "Class:AlternativeClassName";

/// 메타 클래스 ID
pub const META_CLASS_ID: &str = "Class:MetaClassID";
