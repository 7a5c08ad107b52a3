//! Class - 클래스 식별자, 디스크립터, 저장소
//!
//! - `id`: ClassId (128비트 UID)
//! - `descriptor`: ClassDescriptor, ClassInfo, VersionDescriptor, ClassFlags
//! - `store`: 식별자 인덱스 + 카테고리 버킷
//! - `collection`: 팩토리에서 클래스 목록 수집
//! - `search`: 카테고리 검색
//! - `meta`: 잘 알려진 속성 키

mod collection;
mod descriptor;
mod id;
pub mod meta;
mod search;
mod store;

pub use collection::ClassCollection;
pub use descriptor::{
    ClassDescriptor, ClassFlags, ClassInfo, ClassOwner, VersionDescriptor, CLASS_URL_SCHEME,
};
pub use id::ClassId;
pub use search::{ClassSearcher, SearchDescription};
pub use store::ClassStore;
