#![no_main]
use libfuzzer_sys::fuzz_target;
use zwc_book::{BookInfo, Sidecar};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(sidecar) = Sidecar::parse(text) {
        if let Ok(info) = BookInfo::from_sidecar(&sidecar) {
            assert!(info.current_page >= 1 && info.current_page <= info.total_pages);
        }

        // Saved text parses back to the same entries
        let reparsed = Sidecar::parse(&sidecar.to_text());
        assert_eq!(reparsed.ok(), Some(sidecar));
    }
});
