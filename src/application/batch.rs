//! Sequential, in-place rendering over a set of files.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::{
    document::{DocumentError, parse_html},
    options::RenderOptions,
    render::MathRenderer,
};
use crate::infra::{
    encoding::EncodingError,
    files::{EnumerationError, SourceFiles},
};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: EncodingError,
    },
    #[error("failed to render math in `{path}`: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    /// The file being processed when the batch stopped, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            BatchError::Enumeration(_) => None,
            BatchError::Read { path, .. }
            | BatchError::Decode { path, .. }
            | BatchError::Render { path, .. }
            | BatchError::Write { path, .. } => Some(path),
        }
    }
}

/// Tallies from one completed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub expressions: usize,
}

/// Render math in every file matched by the configured source patterns.
///
/// Files are handled one at a time in enumeration order; a file is written
/// back only when at least one expression was rendered. The first error stops
/// the batch; files already written stay written.
pub async fn parse_html_files<R>(
    options: &RenderOptions,
    engine: &R,
) -> Result<BatchReport, BatchError>
where
    R: MathRenderer + ?Sized,
{
    let sources = options.sources();
    let patterns = sources.join(", ");

    if options.log() {
        info!(patterns = %patterns, "rendering KaTeX math expressions in {patterns}");
    }

    let mut report = BatchReport::default();

    for entry in SourceFiles::new(options.root(), sources)? {
        let path = entry?;
        report.files_scanned += 1;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| BatchError::Read {
                path: path.clone(),
                source,
            })?;
        let html = options
            .encoding()
            .decode(bytes)
            .map_err(|source| BatchError::Decode {
                path: path.clone(),
                source,
            })?;

        let parsed = parse_html(&html, options, engine).map_err(|source| BatchError::Render {
            path: path.clone(),
            source,
        })?;

        if parsed.match_count == 0 {
            debug!(path = %path.display(), "no math expressions found");
            continue;
        }

        tokio::fs::write(&path, options.encoding().encode(&parsed.html))
            .await
            .map_err(|source| BatchError::Write {
                path: path.clone(),
                source,
            })?;

        report.files_rewritten += 1;
        report.expressions += parsed.match_count;

        if options.log() {
            info!(
                path = %path.display(),
                matches = parsed.match_count,
                "rendered {} expression(s) in {}",
                parsed.match_count,
                path.display()
            );
        } else {
            debug!(path = %path.display(), matches = parsed.match_count, "file rewritten");
        }
    }

    if options.log() {
        info!(
            files = report.files_scanned,
            rewritten = report.files_rewritten,
            expressions = report.expressions,
            "finished rendering"
        );
    }

    Ok(report)
}
