#![no_main]

use dotmeta::metadata::reader::CilMetadata;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(metadata) = CilMetadata::from(data) {
        for table_id in metadata.tables().present_tables() {
            let rows = metadata.tables().row_count(table_id).min(64);
            for rid in 1..=rows {
                let _ = metadata.tables().row(table_id, rid);
            }
        }
        let _ = metadata.field_list(1);
        let _ = metadata.method_list(1);
        let _ = metadata.field_owner(1);
    }
});
