//! Transaction-aware SQL sessions for `vernal-context` applications.
//!
//! The data store itself is abstracted by [SqlSessionFactory](session::SqlSessionFactory) and
//! [SqlSession](session::SqlSession). On top of that, the
//! [SqlSessionTemplate](template::SqlSessionTemplate) hands out managed sessions: outside of a
//! [transaction](transaction::TransactionScope) every call runs on a fresh session which is
//! committed and closed right away, while inside one the same session is reused and committed only
//! when the transaction commits.
//!
//! Mappers bind named methods to statements. They can be declared manually with
//! [MapperDefinition](mapper::MapperDefinition) or generated from a trait with the `mapper`
//! attribute macro (requires the `derive` feature), and registered as beans by importing the
//! [mapper scanner](scanner::MapperScannerRegistrar) from a configuration unit.
//!
//! ### Features
//!
//! * `derive` - automatically import helper proc macros (enabled by default)

pub mod config;
pub mod error;
pub mod mapper;
pub mod scanner;
pub mod session;
pub mod template;
pub mod transaction;
pub mod utils;

#[cfg(feature = "derive")]
pub use vernal_session_derive::mapper;
