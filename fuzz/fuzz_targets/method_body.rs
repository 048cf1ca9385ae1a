#![no_main]

use dotmeta::cil::{BodyReader, BodyWriter, NoLocals};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut body) = BodyReader::new().read(data, None, &NoLocals) {
        body.simplify_macros();
        body.optimize_macros();
        let _ = BodyWriter::encode(&mut body);
    }
});
