//! Document ingestion pipeline with multi-format parsing and chunk alignment

mod chunker;
pub mod compound;
pub mod format;
pub mod hwp5;
pub mod hwpx;
mod images;
pub mod layout;
mod linker;
mod office;
mod parser;
pub mod pdf;
mod processor;

pub use chunker::{TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use compound::CompoundFile;
pub use format::FormatSniffer;
pub use hwp5::Hwp5RecordParser;
pub use hwpx::HwpxZipExtractor;
pub use images::extract_images;
pub use linker::ImagePlaceholderLinker;
pub use parser::DocumentParser;
pub use pdf::PdfLayoutReconstructor;
pub use processor::IngestPipeline;
