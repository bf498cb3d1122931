pub mod db;
pub mod open_library;
pub mod openai_llm;

pub use db::DbAdapter;
pub use open_library::OpenLibraryAdapter;
pub use openai_llm::OpenAiTextAdapter;
