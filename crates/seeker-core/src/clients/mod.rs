//! HTTP implementations of the ports.

pub mod drive;
pub mod gemini;
pub mod prompt;
pub mod telegram;

pub use self::drive::DriveSearch;
pub use self::gemini::GeminiTranslator;
pub use self::prompt::PromptTemplate;
pub use self::telegram::TelegramNotifier;
