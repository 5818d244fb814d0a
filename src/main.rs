use std::{
    io::{self, IsTerminal},
    process,
};

use katexify::{
    application::{KatexRenderer, RenderOptions, error::AppError, parse_html_files},
    config,
    infra::telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let message = error.messages().join(": ");
    if dispatcher::has_been_set() {
        error!(error = %message, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %message, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let settings = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let options = RenderOptions::resolve(settings.render)?;
    let engine = KatexRenderer::new(options.output());
    parse_html_files(&options, &engine).await?;

    Ok(())
}
