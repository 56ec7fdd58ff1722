//! Translation unit integration tests: caching, batch builds and concurrency.

use std::{sync::Arc, thread};

use tyflow::{
    bytecode::{CodeBuilder, CodeObject, Literal, Opcode},
    types::{FuncType, Type},
    Error, FunctionKey, Result, TranslationConfig, TranslationUnit,
};

/// `def <name>(x): return x * <factor>`, defined at `line`
fn scaled(name: &str, line: u32, factor: i64) -> Result<CodeObject> {
    let mut builder = CodeBuilder::new(name)
        .filename("module.py")
        .first_line(line)
        .params(&["x"]);
    builder
        .load_fast("x")?
        .load_const(Literal::Int(factor))?
        .op(Opcode::BinaryMultiply)?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}

fn rejected(name: &str) -> Result<CodeObject> {
    let mut builder = CodeBuilder::new(name).filename("module.py").params(&["p"]);
    builder.load_fast("p")?.load_attr("y")?.op(Opcode::ReturnValue)?;
    builder.finish()
}

#[test]
fn test_key_identifies_function() -> Result<()> {
    let code = scaled("double", 3, 2)?;
    assert_eq!(code.key(), FunctionKey::new("module.py", "double", 3));
    assert_ne!(scaled("double", 9, 2)?.key(), code.key());
    Ok(())
}

#[test]
fn test_repeated_builds_share_the_procedure() -> Result<()> {
    let unit = TranslationUnit::new();
    let code = scaled("double", 3, 2)?;

    let first = unit.build_function(&code, Some(FuncType::new(vec![Type::INT], Type::INT)))?;
    let again = unit.build_function(&code, Some(FuncType::new(vec![Type::FLOAT], Type::FLOAT)))?;
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(again.return_type(), &Type::INT);

    let cached = unit.get(&code.key()).expect("cached");
    assert!(Arc::ptr_eq(&first, &cached));
    Ok(())
}

#[test]
fn test_build_all() -> Result<()> {
    let unit = TranslationUnit::with_config(TranslationConfig::default().with_window(1));
    let functions = vec![
        (scaled("double", 1, 2)?, Some(FuncType::new(vec![Type::INT], Type::INT))),
        (rejected("broken")?, None),
        (scaled("half", 10, 2)?, Some(FuncType::new(vec![Type::FLOAT], Type::FLOAT))),
    ];

    let results = unit.build_all(&functions);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().map(|p| p.name().to_string()).ok(), Some("double".into()));
    match &results[1] {
        Err(Error::Unsupported(diagnostic)) => assert_eq!(diagnostic.window.len(), 1),
        other => panic!("expected an unsupported construct, got {other:?}"),
    }
    // float * int has no common numeric type
    assert_eq!(results[2].as_ref().map(|p| p.return_type().clone()).ok(), Some(Type::Anything));

    assert_eq!(unit.len(), 2);
    assert_eq!(
        unit.keys(),
        vec![
            FunctionKey::new("module.py", "double", 1),
            FunctionKey::new("module.py", "half", 10),
        ]
    );
    Ok(())
}

#[test]
fn test_concurrent_callers_build_once() -> Result<()> {
    let unit = TranslationUnit::new();
    let code = scaled("shared", 5, 3)?;

    let built: Vec<Arc<_>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| unit.build_function(&code, None)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("builder thread"))
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(unit.len(), 1);
    for procedure in &built[1..] {
        assert!(Arc::ptr_eq(&built[0], procedure));
    }
    Ok(())
}

#[test]
fn test_large_batch() -> Result<()> {
    let unit = TranslationUnit::new();
    let functions = (0..200)
        .map(|i| Ok((scaled(&format!("f{i}"), i + 1, i64::from(i))?, None)))
        .collect::<Result<Vec<_>>>()?;

    let results = unit.build_all(&functions);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(unit.len(), 200);
    assert!(!unit.is_empty());
    Ok(())
}
