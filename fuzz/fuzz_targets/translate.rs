#![no_main]

use libfuzzer_sys::fuzz_target;
use tyflow::bytecode::{CodeObject, Literal};
use tyflow::{translate, TranslationConfig};

fuzz_target!(|data: &[u8]| {
    let code = CodeObject {
        name: "fuzz".to_string(),
        filename: "<fuzz>".to_string(),
        first_line: 1,
        code: data.to_vec(),
        consts: vec![Literal::Int(0), Literal::Int(1), Literal::Float(0.5), Literal::Bool(true)],
        names: vec!["g".to_string()],
        varnames: vec!["a".to_string(), "b".to_string(), "x".to_string(), "y".to_string()],
        argcount: 2,
        lnotab: Vec::new(),
    };
    let _ = translate(&code, None, &TranslationConfig::default());
});
