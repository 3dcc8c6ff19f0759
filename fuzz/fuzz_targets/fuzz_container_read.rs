#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zwc_book::ContainerReader;

#[derive(Arbitrary, Debug)]
struct Input {
    claimed_pages: u16,
    page: u16,
    bytes: Vec<u8>,
}

// Damaged containers and wrong page counts must fail with an error, never panic
fuzz_target!(|input: Input| {
    let total = input.claimed_pages as u32;
    if let Ok(reader) = ContainerReader::open(input.bytes.clone(), total) {
        let _ = reader.read_page(input.page as u32);
        let _ = reader.infer_page_count();
        if let Ok(table) = reader.offset_table() {
            let _ = table.validate(input.bytes.len() as u64);
        }
    }

    let _ = ContainerReader::open_verified(input.bytes, total);
});
