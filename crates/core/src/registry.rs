//! 컴포넌트 레지스트리 -- 타입 ID로 디스크립터 팩토리를 찾음
//!
//! [`ComponentRegistry`]는 `(subagent, kind)` 한 쌍마다 하나씩 만들어집니다.
//! 예: `("logging", "receiver")`, `("metrics", "processor")`.
//!
//! 레지스트리는 명시적인 초기화 함수에서 한 번 채워지고, 이후에는 읽기 전용으로
//! 사용됩니다. 모듈 로드 시점의 부수 효과로 등록하지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut registry: ComponentRegistry<dyn LoggingReceiver> =
//!     ComponentRegistry::new("logging", "receiver");
//! registry.register("files", PlatformFilter::All, files_factory)?;
//!
//! let receiver = registry.build("files", body, Platform::Linux)?;
//! ```

use crate::error::{OpsconfError, RegistryError};
use crate::types::{Platform, PlatformFilter};

/// 사용자 설정 본문(`type` 키를 제외한 나머지)에서 컴포넌트를 생성하는 함수
pub type Factory<T> = fn(serde_yaml::Value) -> Result<Box<T>, OpsconfError>;

struct Entry<T: ?Sized> {
    type_id: String,
    platforms: PlatformFilter,
    factory: Factory<T>,
}

/// 타입 ID로 키잉된 컴포넌트 팩토리 레지스트리
///
/// 등록 순서가 보존됩니다. 지원 타입 목록은 정렬해서 반환합니다.
pub struct ComponentRegistry<T: ?Sized> {
    subagent: &'static str,
    kind: &'static str,
    entries: Vec<Entry<T>>,
}

impl<T: ?Sized> ComponentRegistry<T> {
    /// 빈 레지스트리를 생성합니다.
    pub fn new(subagent: &'static str, kind: &'static str) -> Self {
        Self {
            subagent,
            kind,
            entries: Vec::new(),
        }
    }

    /// 팩토리를 등록합니다.
    ///
    /// 같은 타입 ID가 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register(
        &mut self,
        type_id: &str,
        platforms: PlatformFilter,
        factory: Factory<T>,
    ) -> Result<(), OpsconfError> {
        if self.entries.iter().any(|e| e.type_id == type_id) {
            return Err(RegistryError::AlreadyRegistered {
                subagent: self.subagent.to_owned(),
                kind: self.kind.to_owned(),
                type_id: type_id.to_owned(),
            }
            .into());
        }
        self.entries.push(Entry {
            type_id: type_id.to_owned(),
            platforms,
            factory,
        });
        Ok(())
    }

    /// 타입 ID와 설정 본문으로 컴포넌트를 생성합니다.
    ///
    /// 등록되지 않았거나 `platform`에서 지원하지 않는 타입이면
    /// 지원 타입 목록을 담은 [`RegistryError::Unsupported`]를 반환합니다.
    pub fn build(
        &self,
        type_id: &str,
        body: serde_yaml::Value,
        platform: Platform,
    ) -> Result<Box<T>, OpsconfError> {
        match self
            .entries
            .iter()
            .find(|e| e.type_id == type_id && e.platforms.allows(platform))
        {
            Some(entry) => (entry.factory)(body),
            None => Err(RegistryError::Unsupported {
                subagent: self.subagent.to_owned(),
                kind: self.kind.to_owned(),
                type_id: type_id.to_owned(),
                supported: self.supported_types(platform),
            }
            .into()),
        }
    }

    /// `platform`에서 사용 가능한 타입 ID 목록 (정렬됨)
    pub fn supported_types(&self, platform: Platform) -> Vec<String> {
        let mut types: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.platforms.allows(platform))
            .map(|e| e.type_id.clone())
            .collect();
        types.sort();
        types
    }

    /// 타입 ID가 `platform`에서 등록되어 있는지 확인합니다.
    pub fn contains(&self, type_id: &str, platform: Platform) -> bool {
        self.entries
            .iter()
            .any(|e| e.type_id == type_id && e.platforms.allows(platform))
    }

    /// 등록된 타입 수
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// 등록 순서대로 `(타입 ID, 플랫폼 필터)`를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PlatformFilter)> {
        self.entries
            .iter()
            .map(|e| (e.type_id.as_str(), e.platforms))
    }

    pub fn subagent(&self) -> &'static str {
        self.subagent
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}
