pub mod walk;

pub use walk::{discover_pdfs, is_pdf};
