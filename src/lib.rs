pub mod ast;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod parse;
pub mod resolve;
pub mod wasm;
