#![no_main]

use distinct_counter::CounterConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<CounterConfig>(data) {
        assert!(config.validate().is_ok());
        let json = serde_json::to_string(&config).unwrap();
        let again: CounterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(again, config);
    }
});
