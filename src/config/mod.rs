//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::{RenderOverrides, render::MathOutput};
use crate::infra::encoding::TextEncoding;

pub use cli::{CliArgs, RenderArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "katexify";
const ENV_PREFIX: &str = "KATEXIFY";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderOverrides,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_environment(cli, environment())
}

pub fn load_with_cli() -> Result<Settings, LoadError> {
    load(&CliArgs::parse())
}

fn load_with_environment(cli: &CliArgs, environment: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    let mut raw: RawSettings = builder
        .add_source(environment)
        .build()?
        .try_deserialize()?;
    raw.apply_cli(cli);

    Settings::from_raw(raw)
}

/// `KATEXIFY__SECTION__KEY` variables. List keys take comma-separated values.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("render.ignore_tags")
        .with_list_parse_key("files.sources")
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    files: RawFileSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    selector: Option<String>,
    ignore_tags: Option<Vec<String>>,
    ignore_pattern: Option<String>,
    display_pattern: Option<String>,
    inline_pattern: Option<String>,
    output: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFileSettings {
    sources: Option<Vec<String>>,
    encoding: Option<String>,
    root: Option<PathBuf>,
    log: Option<bool>,
}

impl RawSettings {
    fn apply_cli(&mut self, cli: &CliArgs) {
        if !cli.sources.is_empty() {
            self.files.sources = Some(cli.sources.clone());
        }
        self.apply_render_args(&cli.overrides);
    }

    fn apply_render_args(&mut self, args: &RenderArgs) {
        if let Some(encoding) = args.encoding.as_ref() {
            self.files.encoding = Some(encoding.clone());
        }
        if let Some(query) = args.query.as_ref() {
            self.render.selector = Some(query.clone());
        }
        if let Some(tags) = args.ignore.as_ref() {
            self.render.ignore_tags = Some(tags.clone());
        }
        if let Some(pattern) = args.ignore_pattern.as_ref() {
            self.render.ignore_pattern = Some(pattern.clone());
        }
        if let Some(pattern) = args.display_pattern.as_ref() {
            self.render.display_pattern = Some(pattern.clone());
        }
        if let Some(pattern) = args.inline_pattern.as_ref() {
            self.render.inline_pattern = Some(pattern.clone());
        }
        if let Some(root) = args.root.as_ref() {
            self.files.root = Some(root.clone());
        }
        if let Some(output) = args.output.as_ref() {
            self.render.output = Some(output.clone());
        }
        if args.quiet {
            self.files.log = Some(false);
        }
        if let Some(level) = args.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = args.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            render,
            files,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_overrides(render, files)?;

        Ok(Self { logging, render })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_overrides(
    render: RawRenderSettings,
    files: RawFileSettings,
) -> Result<RenderOverrides, LoadError> {
    let encoding = files
        .encoding
        .as_deref()
        .map(TextEncoding::from_str)
        .transpose()
        .map_err(|err| LoadError::invalid("files.encoding", err.to_string()))?;

    let output = render
        .output
        .as_deref()
        .map(MathOutput::from_str)
        .transpose()
        .map_err(|err| LoadError::invalid("render.output", err.to_string()))?;

    Ok(RenderOverrides {
        ignore_pattern: non_empty(render.ignore_pattern),
        ignore_tags: render.ignore_tags,
        display_pattern: non_empty(render.display_pattern),
        inline_pattern: non_empty(render.inline_pattern),
        selector: non_empty(render.selector),
        encoding,
        sources: files.sources.filter(|sources| !sources.is_empty()),
        root: files.root,
        // The binary reports progress unless told otherwise.
        log: Some(files.log.unwrap_or(true)),
        output,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
