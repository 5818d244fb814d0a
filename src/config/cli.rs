use std::path::PathBuf;

use clap::{Args, Parser, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the katexify binary.
#[derive(Debug, Parser)]
#[command(
    name = "katexify",
    version,
    about = "Render KaTeX math expressions in HTML files, in place"
)]
pub struct CliArgs {
    /// Glob pattern(s) of source files; prefix a pattern with `!` to exclude
    /// matches. Defaults to `**/*.html` without `node_modules`.
    #[arg(value_name = "SOURCES")]
    pub sources: Vec<String>,

    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "KATEXIFY_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: RenderArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderArgs {
    /// Encoding of source files (utf-8, utf-16le, latin1, ascii).
    #[arg(short = 'e', long = "encoding", value_name = "ENCODING")]
    pub encoding: Option<String>,

    /// CSS selector of the elements whose content is rendered.
    #[arg(short = 'q', long = "query", value_name = "SELECTOR")]
    pub query: Option<String>,

    /// Comma separated list of tags whose bodies are left untouched.
    #[arg(
        short = 'i',
        long = "ignore",
        value_name = "TAGS",
        value_delimiter = ','
    )]
    pub ignore: Option<Vec<String>>,

    /// Regular expression for spans left untouched.
    #[arg(long = "ignore-pattern", value_name = "REGEX")]
    pub ignore_pattern: Option<String>,

    /// Regular expression for display math; group 1 is the math source.
    #[arg(long = "display-pattern", value_name = "REGEX")]
    pub display_pattern: Option<String>,

    /// Regular expression for inline math; group 1 is the math source.
    #[arg(long = "inline-pattern", value_name = "REGEX")]
    pub inline_pattern: Option<String>,

    /// Directory the source patterns are resolved against.
    #[arg(long = "root", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// KaTeX output flavour (html|mathml|htmlAndMathml).
    #[arg(long = "output", value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Do not report progress for each rewritten file.
    #[arg(long = "quiet", action = clap::ArgAction::SetTrue)]
    pub quiet: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
