use katex::{Opts, OptsBuilder, OutputType};

use super::types::{MathMode, MathOutput, MathRenderer, RenderError};

/// KaTeX-backed math renderer. Errors are thrown, never rendered in red.
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexRenderer {
    output: MathOutput,
}

impl KatexRenderer {
    pub fn new(output: MathOutput) -> Self {
        Self { output }
    }

    fn opts(&self, mode: MathMode) -> Result<Opts, RenderError> {
        let mut builder = OptsBuilder::default();
        builder.display_mode(mode.is_display());
        builder.output_type(output_type(self.output));
        builder.throw_on_error(true);

        builder.build().map_err(|err| RenderError::Options {
            message: err.to_string(),
        })
    }
}

impl MathRenderer for KatexRenderer {
    fn render(&self, source: &str, mode: MathMode) -> Result<String, RenderError> {
        let opts = self.opts(mode)?;
        katex::render_with_opts(source, opts)
            .map_err(|err| RenderError::katex(source, mode, err.to_string()))
    }
}

fn output_type(output: MathOutput) -> OutputType {
    match output {
        MathOutput::Html => OutputType::Html,
        MathOutput::Mathml => OutputType::Mathml,
        MathOutput::HtmlAndMathml => OutputType::HtmlAndMathml,
    }
}
