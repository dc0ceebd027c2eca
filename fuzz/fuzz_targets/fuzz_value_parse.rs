#![no_main]

use libfuzzer_sys::fuzz_target;

use jip_model::{Value, VarType, codec};

fuzz_target!(|data: &[u8]| {
    let Some((&tag, text)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(text) else {
        return;
    };
    let ty = VarType::ALL[tag as usize % VarType::ALL.len()];

    if let Ok(value) = Value::parse(ty, text) {
        assert_eq!(value.var_type(), ty);
        let _ = codec::encode(ty, &value);
    }
});
