//! A from-scratch GW-BASIC interpreter engine: tokenizer, program store,
//! expression evaluator, statement dispatcher and run loop, plus the
//! `Terminal`/`FileSystem`/`GraphicsSound` contracts an embedder wires up
//! (§6). The CLI binary in `src/main.rs` is one such embedder.

pub mod error;
pub mod interp;
pub mod program;
pub mod shims;
pub mod token;
pub mod tokenizer;
pub mod value;
pub mod vars;

pub use error::{GwError, GwResult};
pub use interp::Interpreter;
