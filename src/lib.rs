// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # tyflow
//!
//! The analysis front end of an ahead-of-time translator for stack-machine
//! bytecode. `tyflow` lowers one bytecode function at a time into a typed SSA
//! intermediate representation, ready to be handed to a code emitter.
//!
//! ## Features
//!
//! - **Control flow recovery** - Abstract interpretation of the bytecode into basic blocks
//! - **Minimal SSA** - Dominance-frontier phi placement pruned by liveness
//! - **Type inference** - A monotone lattice of nominal, constant and function types
//!   propagated to a fixed point
//! - **Diagnostics** - Unsupported constructs are reported with file, line and a
//!   disassembly window
//! - **Parallel builds** - A concurrent translation unit that builds each function once
//!
//! ## Quick Start
//!
//! ```rust
//! use tyflow::prelude::*;
//!
//! // def scale(a, b): return a + b * 20
//! let mut builder = CodeBuilder::new("scale").params(&["a", "b"]);
//! builder
//!     .load_fast("a")?
//!     .load_fast("b")?
//!     .load_const(Literal::Int(20))?
//!     .op(Opcode::BinaryMultiply)?
//!     .op(Opcode::BinaryAdd)?
//!     .op(Opcode::ReturnValue)?;
//! let code = builder.finish()?;
//!
//! let signature = FuncType::new(vec![Type::INT, Type::INT], Type::INT);
//! let procedure = translate(&code, Some(signature), &TranslationConfig::default())?;
//!
//! assert_eq!(procedure.return_type(), &Type::INT);
//! println!("{procedure}");
//! # Ok::<(), tyflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`bytecode`] - Code objects, opcode tables, decoding and a code builder
//! - [`ir`] - The SSA representation: procedures, blocks, values
//! - [`analysis`] - The passes: discovery, dominators, liveness, phis, verification, annotation
//! - [`types`] - The type lattice
//! - [`unit`] - The per-function pipeline and the concurrent build cache
//! - [`utils`] - Bit sets and Graphviz rendering
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Translation either succeeds completely or fails with an [`Error`]:
//!
//! ```rust
//! use tyflow::bytecode::{CodeBuilder, Opcode};
//! use tyflow::{translate, Error, TranslationConfig};
//!
//! let mut builder = CodeBuilder::new("attr").params(&["p"]);
//! builder.load_fast("p")?.load_attr("x")?.op(Opcode::ReturnValue)?;
//!
//! match translate(&builder.finish()?, None, &TranslationConfig::default()) {
//!     Err(Error::Unsupported(diagnostic)) => assert_eq!(diagnostic.opcode, "LOAD_ATTR"),
//!     other => panic!("unexpected result {other:?}"),
//! }
//! # Ok::<(), tyflow::Error>(())
//! ```
//!
//! ## Logging
//!
//! Passes report through the [`log`] facade: `debug` for per-pass summaries,
//! `trace` for per-block and per-value detail, `warn` when an inferred return
//! type does not fit the declared signature. No logger is installed.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run translate --release
//! ```

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types
pub mod prelude;

pub mod analysis;
pub mod bytecode;
pub mod config;
pub mod ir;
pub mod types;
pub mod unit;
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use tyflow::bytecode::{CodeBuilder, CodeObject, Opcode};
/// use tyflow::Result;
///
/// fn identity() -> Result<CodeObject> {
///     let mut builder = CodeBuilder::new("identity").params(&["x"]);
///     builder.load_fast("x")?.op(Opcode::ReturnValue)?;
///     builder.finish()
/// }
/// # identity()?;
/// # Ok::<(), tyflow::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `tyflow` Error type
///
/// Covers every failure of the translation pipeline; see its variants for the
/// individual categories.
pub use error::{Diagnostic, Error};

/// Translation settings, see [`config::TranslationConfig`].
pub use config::TranslationConfig;

/// The translation pipeline and its build cache.
pub use unit::{translate, FunctionKey, TranslationUnit};
