#![no_main]

use libfuzzer_sys::fuzz_target;

use jip_model::codec::Table;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = Table::from_raw(data) {
        // A parsed table serializes back to its input
        assert_eq!(table.to_raw().as_ref(), data);
        assert!(table.iter().all(|(_, row)| !row.is_empty()));
    }
});
