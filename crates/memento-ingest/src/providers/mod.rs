//! External collaborator boundaries: LLM captioning, vector storage, file
//! storage

pub mod caption;
pub mod llm;
pub mod openai;
pub mod sink;

pub use caption::{apply_section_titles, caption_images, generate_section_titles};
pub use llm::LlmProvider;
pub use openai::OpenAiVision;
pub use sink::{FileSource, LocalFileSource, NullSink, VectorSink};
