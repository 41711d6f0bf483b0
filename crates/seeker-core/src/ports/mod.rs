//! Ports - 外部コラボレータへのインターフェース
//!
//! The pipeline only talks to these traits. Production implementations live in
//! `clients`; tests use recording stubs.

pub mod notifier;
pub mod search;
pub mod translator;

pub use self::notifier::Notifier;
pub use self::search::SearchProvider;
pub use self::translator::Translator;
