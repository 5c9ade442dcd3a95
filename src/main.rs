use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::process;
use timetable2pdf::{
    fetch_page_title, share_link, Exporter, ModalAlert, ShareData, ShareTarget, SystemClipboard,
    SystemShare, TIMETABLE_ELEMENT_ID,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "timetable2pdf")]
#[command(
    about = "CLI utility to export a rendered college timetable page to PDF and share its link"
)]
#[command(version = "0.1.0")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the timetable region of a page into a single-page PDF
    Export {
        /// URL of the page showing the timetable
        url: String,

        /// Output directory used to save the PDF
        #[arg(short = 'o', long = "outDir", default_value = "output_timetable2pdf")]
        out_dir: String,

        /// Id of the page element holding the timetable
        #[arg(short = 'e', long = "element", default_value = TIMETABLE_ELEMENT_ID)]
        element: String,

        /// Page load timeout in seconds
        #[arg(short = 't', long = "timeout", default_value = "30.0", value_parser = parse_timeout)]
        timeout: f64,
    },
    /// Share the page link, or copy it to the clipboard when no share target exists
    Share {
        /// URL of the page to share
        url: String,

        /// Title to share (by default the page's own title is fetched)
        #[arg(long = "title")]
        title: Option<String>,

        /// Skip the share target and copy the link to the clipboard
        #[arg(short = 'c', long = "copy")]
        copy: bool,
    },
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if value < 0.0 {
        return Err("Must be zero or positive number.".to_string());
    }
    Ok(value)
}

async fn run_share(url: &str, title: Option<String>, copy: bool) -> Result<()> {
    let title = match title {
        Some(title) => title,
        None => fetch_page_title(url).await?,
    };

    let data = ShareData::new(title, url);
    let target = if copy { None } else { SystemShare::detect() };
    if target.is_none() {
        info!("No share target available, copying link to clipboard");
    }

    let mut clipboard = SystemClipboard;
    share_link(
        &data,
        target.as_ref().map(|t| t as &dyn ShareTarget),
        &mut clipboard,
        &ModalAlert,
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    // Set up logging with chromiumoxide errors suppressed
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse().unwrap())
        .add_directive("chromiumoxide::handler=off".parse().unwrap())
        .add_directive("timetable2pdf=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Export {
            url,
            out_dir,
            element,
            timeout,
        } => match Url::parse(&url) {
            Ok(_) => Exporter::new(out_dir, element, timeout).run(&url).await,
            Err(e) => Err(anyhow::anyhow!("Invalid URL \"{}\": {}", url, e)),
        },
        Commands::Share { url, title, copy } => match Url::parse(&url) {
            Ok(_) => run_share(&url, title, copy).await,
            Err(e) => Err(anyhow::anyhow!("Invalid URL \"{}\": {}", url, e)),
        },
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
