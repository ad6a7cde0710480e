pub mod docstore;
pub mod generate;
pub mod index;
pub mod loader;
#[allow(clippy::module_inception)]
pub mod rag;
pub mod splitter;
