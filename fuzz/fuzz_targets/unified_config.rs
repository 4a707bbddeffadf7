#![no_main]

use libfuzzer_sys::fuzz_target;

use opsconf_apps::{UnifiedConfig, build_registries};
use opsconf_core::context::GenContext;

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(yaml) = std::str::from_utf8(data) {
        let Ok(config) = UnifiedConfig::parse(yaml) else {
            return;
        };
        let Ok(registries) = build_registries() else {
            return;
        };
        let _ = config.resolve(&registries, &GenContext::default());
    }
});
