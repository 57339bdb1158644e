//! Source ingestion: document loading, chunking, and question generation.

pub mod chunker;
pub mod document;
pub mod generator;

pub use chunker::{ChunkOptions, TextChunk, chunk_text};
pub use document::{clean_text, load_document};
pub use generator::{
    LlmQuestionGenerator, QUESTIONS_PER_CHUNK, QuestionGenerator, parse_question_lines,
};
