//! Application layer: math rendering, document processing and the file batch.

pub mod batch;
pub mod document;
pub mod error;
pub mod options;
pub mod render;

pub use batch::{BatchError, BatchReport, parse_html_files};
pub use document::{DocumentError, ParsedHtml, parse_html};
pub use options::{OptionsError, RenderOptions, RenderOverrides};
pub use render::{KatexRenderer, MathMode, MathRenderer, RenderedMath, render_math};
