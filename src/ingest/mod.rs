pub mod parser;
pub mod splitter;

pub use parser::{parse_document_file, DocumentError, ParsedDocument};
pub use splitter::TextSplitter;
