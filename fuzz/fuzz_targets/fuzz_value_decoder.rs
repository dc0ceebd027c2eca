#![no_main]

use libfuzzer_sys::fuzz_target;

use jip_model::VarType;
use jip_model::codec;

fuzz_target!(|data: &[u8]| {
    let Some((&tag, raw)) = data.split_first() else {
        return;
    };
    let ty = VarType::ALL[tag as usize % VarType::ALL.len()];

    // Anything that decodes must re-encode to the same bytes
    if let Ok(value) = codec::decode(ty, raw) {
        if ty != VarType::TableBlob && ty != VarType::String && raw.len() <= codec::MAX_VARIABLE_SIZE {
            let encoded = codec::encode(ty, &value).expect("decoded value re-encodes");
            assert_eq!(encoded.as_ref(), raw);
        }
    }
});
