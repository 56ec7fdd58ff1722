//! Translation units: the per-function pipeline and its build cache.
//!
//! [`translate`] runs every pass on a single code object. A
//! [`TranslationUnit`] wraps it with a concurrent cache keyed by
//! [`FunctionKey`], so that each function of a program is built at most once
//! no matter how many callers ask for it, and can build whole batches of
//! functions in parallel.
//!
//! # Thread Safety
//!
//! [`TranslationUnit`] is [`Send`] and [`Sync`]. The cache is a [`DashMap`];
//! [`TranslationUnit::build_function`] holds the entry for its key while it
//! builds, so concurrent requests for the same function wait for the first
//! build instead of repeating it. Failed builds are not cached.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use rayon::prelude::*;

use crate::{
    analysis::{
        compute_dominators, construct_ssa, discover, propagate_liveness, verify, Annotator,
    },
    bytecode::CodeObject,
    config::TranslationConfig,
    ir::Procedure,
    types::FuncType,
    Result,
};

/// Identity of a source function: where it was defined and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    /// Source file
    pub filename: String,
    /// Function name
    pub name: String,
    /// Line of the function header
    pub first_line: u32,
}

impl FunctionKey {
    /// Creates a function key.
    #[must_use]
    pub fn new(filename: &str, name: &str, first_line: u32) -> Self {
        Self {
            filename: filename.to_string(),
            name: name.to_string(),
            first_line,
        }
    }
}

impl std::fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.first_line, self.name)
    }
}

/// Translates one function into an annotated SSA procedure.
///
/// Runs discovery, dominators, liveness, phi placement and resolution, the
/// verifier (if enabled) and type propagation. `signature` provides the
/// argument types the annotator starts from; without one, arguments stay
/// unbound.
///
/// # Errors
///
/// Any error of the individual passes. No partial procedure is returned.
///
/// # Examples
///
/// ```rust
/// use tyflow::bytecode::{CodeBuilder, Opcode};
/// use tyflow::types::{FuncType, Type};
/// use tyflow::{translate, TranslationConfig};
///
/// let mut builder = CodeBuilder::new("negate").params(&["x"]);
/// builder.load_fast("x")?.op(Opcode::UnaryNegative)?.op(Opcode::ReturnValue)?;
///
/// let signature = FuncType::new(vec![Type::FLOAT], Type::FLOAT);
/// let procedure = translate(&builder.finish()?, Some(signature), &TranslationConfig::default())?;
/// assert_eq!(procedure.return_type(), &Type::FLOAT);
/// # Ok::<(), tyflow::Error>(())
/// ```
pub fn translate(
    code: &CodeObject,
    signature: Option<FuncType>,
    config: &TranslationConfig,
) -> Result<Procedure> {
    let mut procedure = discover(code, signature, config)?;
    compute_dominators(&mut procedure)?;
    propagate_liveness(&mut procedure)?;
    construct_ssa(&mut procedure)?;
    if config.verify {
        verify(&procedure)?;
    }
    Annotator::new(&mut procedure, config).run()?;
    Ok(procedure)
}

/// A set of translated functions, built on demand and cached by identity.
///
/// # Examples
///
/// ```rust
/// use tyflow::bytecode::{CodeBuilder, Literal, Opcode};
/// use tyflow::TranslationUnit;
///
/// let mut builder = CodeBuilder::new("one");
/// builder.load_const(Literal::Int(1))?.op(Opcode::ReturnValue)?;
/// let code = builder.finish()?;
///
/// let unit = TranslationUnit::new();
/// let first = unit.build_function(&code, None)?;
/// let second = unit.build_function(&code, None)?;
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(unit.len(), 1);
/// # Ok::<(), tyflow::Error>(())
/// ```
pub struct TranslationUnit {
    procedures: DashMap<FunctionKey, Arc<Procedure>>,
    config: TranslationConfig,
}

impl TranslationUnit {
    /// Creates an empty unit with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TranslationConfig::default())
    }

    /// Creates an empty unit with `config`.
    #[must_use]
    pub fn with_config(config: TranslationConfig) -> Self {
        Self {
            procedures: DashMap::new(),
            config,
        }
    }

    /// The configuration every function is built with.
    #[must_use]
    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Returns the procedure for `code`, translating it on first request.
    ///
    /// The cache is keyed by [`CodeObject::key`]; a later request with a
    /// different `signature` returns the procedure built by the first one.
    ///
    /// # Errors
    ///
    /// Returns the translation error if the function has not been built yet
    /// and cannot be.
    pub fn build_function(
        &self,
        code: &CodeObject,
        signature: Option<FuncType>,
    ) -> Result<Arc<Procedure>> {
        match self.procedures.entry(code.key()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let procedure = Arc::new(translate(code, signature, &self.config)?);
                debug!("built {}", entry.key());
                Ok(Arc::clone(entry.insert(procedure).value()))
            }
        }
    }

    /// Builds many functions in parallel.
    ///
    /// Results are returned in input order; a failure of one function does not
    /// affect the others.
    pub fn build_all(
        &self,
        functions: &[(CodeObject, Option<FuncType>)],
    ) -> Vec<Result<Arc<Procedure>>> {
        functions
            .par_iter()
            .map(|(code, signature)| self.build_function(code, signature.clone()))
            .collect()
    }

    /// Returns an already built procedure.
    #[must_use]
    pub fn get(&self, key: &FunctionKey) -> Option<Arc<Procedure>> {
        self.procedures.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if `key` has been built.
    #[must_use]
    pub fn contains(&self, key: &FunctionKey) -> bool {
        self.procedures.contains_key(key)
    }

    /// Keys of every built function, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<FunctionKey> {
        let mut keys: Vec<FunctionKey> = self.procedures.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of built functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Returns `true` if nothing has been built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

impl Default for TranslationUnit {
    fn default() -> Self {
        Self::new()
    }
}
