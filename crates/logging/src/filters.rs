//! 단순 FILTER 단계 -- nest, grep, 고정 Lua 스크립트, modify
//!
//! 제품 프로세서가 파싱 뒤에 붙이는 구조 변경 단계입니다. 모두 레코드 값을
//! 보지 않고 컴포넌트만 만들므로 [`Inspect`](crate::Inspect)는 비어 있습니다.

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::{Component, Kind, ModifyOptions, lua_filter};

use crate::component::LoggingProcessor;

/// 와일드카드에 맞는 키를 한 맵 아래로 모으는 nest FILTER
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestWildcard {
    pub wildcard: String,
    pub nest_under: String,
    pub remove_prefix: String,
}

impl NestWildcard {
    pub fn new(wildcard: &str, nest_under: &str, remove_prefix: &str) -> Self {
        Self {
            wildcard: wildcard.to_owned(),
            nest_under: nest_under.to_owned(),
            remove_prefix: remove_prefix.to_owned(),
        }
    }

    /// `a.b.*` 키를 `a.b` 맵 아래 `*`로 옮깁니다.
    pub fn dotted(prefix: &str) -> Self {
        Self::new(&format!("{prefix}.*"), prefix, &format!("{prefix}."))
    }
}

impl LoggingProcessor for NestWildcard {
    fn components(&self, _ctx: &GenContext, tag: &str, _uid: &str) -> Vec<Component> {
        vec![
            Component::new(Kind::Filter)
                .with("Name", "nest")
                .with("Match", tag)
                .with("Operation", "nest")
                .with("Wildcard", self.wildcard.clone())
                .with("Nest_under", self.nest_under.clone())
                .with("Remove_prefix", self.remove_prefix.clone()),
        ]
    }
}

/// 키가 비어 있지 않은 레코드를 버리는 grep FILTER
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepExclude {
    pub key: String,
}

impl GrepExclude {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_owned() }
    }
}

impl LoggingProcessor for GrepExclude {
    fn components(&self, _ctx: &GenContext, tag: &str, _uid: &str) -> Vec<Component> {
        vec![
            Component::new(Kind::Filter)
                .with("Name", "grep")
                .with("Match", tag)
                .with("Exclude", format!("{} .+", self.key)),
        ]
    }
}

/// 미리 작성된 Lua 함수를 실행하는 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuaScript {
    pub function: &'static str,
    pub source: &'static str,
}

impl LuaScript {
    pub const fn new(function: &'static str, source: &'static str) -> Self {
        Self { function, source }
    }
}

impl LoggingProcessor for LuaScript {
    fn components(&self, _ctx: &GenContext, tag: &str, _uid: &str) -> Vec<Component> {
        vec![lua_filter(tag, self.function, self.source)]
    }
}

/// modify FILTER 목록 (규칙 하나당 FILTER 하나)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifySteps {
    pub options: Vec<ModifyOptions>,
}

impl ModifySteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙을 추가합니다 (builder).
    pub fn then(mut self, options: ModifyOptions) -> Self {
        self.options.push(options);
        self
    }
}

impl LoggingProcessor for ModifySteps {
    fn components(&self, _ctx: &GenContext, tag: &str, _uid: &str) -> Vec<Component> {
        self.options.iter().map(|o| o.component(tag)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_core::fluentbit::{Condition, ModifyRule};

    #[test]
    fn dotted_nest_strips_prefix_with_dot() {
        let c = NestWildcard::dotted("user.run_as").components(&GenContext::default(), "t", "u");
        assert_eq!(c[0].get("Wildcard"), Some("user.run_as.*"));
        assert_eq!(c[0].get("Nest_under"), Some("user.run_as"));
        assert_eq!(c[0].get("Remove_prefix"), Some("user.run_as."));
        assert_eq!(c[0].get("Operation"), Some("nest"));
    }

    #[test]
    fn grep_excludes_non_empty_key() {
        let c = GrepExclude::new("@timestamp").components(&GenContext::default(), "p.es", "es");
        assert_eq!(c[0].get("Name"), Some("grep"));
        assert_eq!(c[0].get("Match"), Some("p.es"));
        assert_eq!(c[0].get("Exclude"), Some("@timestamp .+"));
    }

    #[test]
    fn lua_script_is_attached_once() {
        const SRC: &str = "function f(tag, timestamp, record)\n  return 0, timestamp, record\nend\n";
        let c = LuaScript::new("f", SRC).components(&GenContext::default(), "t", "u");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].get("call"), Some("f"));
        assert_eq!(c[0].script.as_ref().map(|s| s.contents.as_str()), Some(SRC));
    }

    #[test]
    fn modify_steps_keep_order_and_conditions() {
        let steps = ModifySteps::new()
            .then(ModifyOptions::new(ModifyRule::Add, "logging.googleapis.com/severity INFO"))
            .then(
                ModifyOptions::remove("connection_id")
                    .when(Condition::KeyValueEquals("connection_id".into(), "-1".into())),
            );
        let c = steps.components(&GenContext::default(), "t", "u");
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].get("Add"), Some("logging.googleapis.com/severity INFO"));
        assert_eq!(c[1].get("Condition"), Some("Key_value_equals connection_id -1"));
    }
}
