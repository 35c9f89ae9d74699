//! Brochure CLI
//!
//! Generates `{company_name}_brochure.md` in the current directory from the
//! company's website.

use std::io::Write;

use anyhow::{Context, Result};
use brochure_generator::{
    brochure_file_name, save_brochure, BrochureGenerator, Config, ResponseMode,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "brochure")]
#[command(about = "Generate a brochure for a company from its website")]
struct Cli {
    /// The name of the company
    company_name: String,

    /// The URL of the company's website
    url: String,

    /// The language for the brochure
    #[arg(long, default_value = "English")]
    language: String,

    /// Model used to pick relevant links (overrides the environment)
    #[arg(long)]
    link_model: Option<String>,

    /// Model used to write the brochure (overrides the environment)
    #[arg(long)]
    brochure_model: Option<String>,

    /// Print the brochure to stdout while it is being written
    #[arg(long)]
    stream: bool,
}

/// Live echo of streamed fragments. The first write error is logged and
/// echoing stops; the brochure is still collected and saved.
struct Echo<W> {
    out: W,
    failed: bool,
}

impl<W: Write> Echo<W> {
    fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    fn write(&mut self, fragment: &str) {
        if self.failed {
            return;
        }
        if let Err(e) = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|_| self.out.flush())
        {
            tracing::warn!(error = %e, "Stopped echoing brochure to stdout");
            self.failed = true;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed markdown on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,brochure_generator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()
        .context("Failed to load configuration")?
        .with_link_model(cli.link_model)
        .with_brochure_model(cli.brochure_model);

    tracing::info!(
        backend = ?config.backend,
        base_url = %config.base_url,
        link_model = %config.link_model,
        brochure_model = %config.brochure_model,
        "Configuration loaded"
    );

    let generator = BrochureGenerator::new(&config).context("Failed to set up generator")?;

    let brochure = if cli.stream {
        let mut echo = Echo::new(std::io::stdout());
        let text = generator
            .generate_with(
                &cli.company_name,
                &cli.url,
                &cli.language,
                ResponseMode::Stream,
                |fragment| echo.write(fragment),
            )
            .await
            .context("Failed to generate brochure")?;
        println!();
        text
    } else {
        generator
            .generate(&cli.company_name, &cli.url, &cli.language)
            .await
            .context("Failed to generate brochure")?
    };

    let path = brochure_file_name(&cli.company_name);
    save_brochure(&path, &brochure)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Brochure for {} generated and saved to {}",
        cli.company_name,
        path.display()
    );

    Ok(())
}
