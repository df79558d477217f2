use clap::{Parser, Subcommand};
use pictor::http::RequestContext;
use pictor::imaging::RustBackend;
use pictor::options::{RenderOptions, parse_options_with};
use pictor::service::{ImageRequest, ImageService};
use pictor::{config, logging, server};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pictor")]
#[command(about = "On-demand image variant server")]
#[command(long_about = "\
On-demand image variant server

Sources live in a storage tree; every URL names one source and an argument
string. Variants are rendered on first request and cached next to their
siblings.

URL shape:

  /{storage-type}/{module}/{id}/{args}/{filename}
  /gallery/1/255/w600-h400-z1-cffffff/photo.jpg

Argument tokens (dash-separated, any order, last one wins):

  w<n>     width in pixels
  h<n>     height in pixels
  q<n>     encode quality
  c<hex6>  canvas color
  e<0|1>   e0: serve a transparent pixel instead of a placeholder
  z<0-3>   crop policy: 0 shrink, 1 canvas fit, 2 exact fill, 3 proportional

Run 'pictor gen-config' to generate a documented pictor.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "pictor.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Identifies one `(type, module, id)` storage directory.
#[derive(clap::Args, Clone)]
struct Location {
    /// Storage type (thumbnail, gallery, editor, template, or a raw id)
    storage_type: String,
    /// Module name
    module: String,
    /// Numeric entity id
    id: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Serve images over HTTP
    Serve,
    /// Run one request through the service and save the body
    Render {
        #[command(flatten)]
        location: Location,
        /// Source filename
        filename: String,
        /// Argument string, e.g. w600-h400-z1
        #[arg(long, default_value = "")]
        args: String,
        /// Keep the source geometry (no resize, no limits)
        #[arg(long)]
        original: bool,
        /// Accept header to negotiate with
        #[arg(long)]
        accept: Option<String>,
        /// User-Agent header to negotiate with
        #[arg(long)]
        user_agent: Option<String>,
        /// If-Modified-Since header value
        #[arg(long)]
        if_modified_since: Option<String>,
        /// Where to write the response body
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete every cached variant of one storage directory
    Purge {
        #[command(flatten)]
        location: Location,
    },
    /// Print a stock pictor.toml with all options documented
    GenConfig,
}

type Error = Box<dyn std::error::Error>;

/// Load config, install logging and build the service.
fn start(path: &Path) -> Result<(config::ServiceConfig, ImageService<RustBackend>), Error> {
    let config = config::load_config(path)?;
    logging::init(&config.logging)?;
    let service = ImageService::new(RustBackend::new(), &config);
    Ok((config, service))
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let (config, service) = start(&cli.config)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(Arc::new(service), &config.server.bind))?;
        }
        Command::Render {
            location,
            filename,
            args,
            original,
            accept,
            user_agent,
            if_modified_since,
            output,
        } => {
            let (_, service) = start(&cli.config)?;
            let base = if original {
                RenderOptions::original()
            } else {
                RenderOptions::default()
            };
            let options = parse_options_with(&args, base, service.limits());
            let request = ImageRequest::new(
                Some(&location.storage_type),
                &location.module,
                location.id,
                Some(&filename),
                options,
            );

            let mut ctx = RequestContext::new(chrono::Utc::now());
            if let Some(accept) = accept {
                ctx = ctx.with_accept(accept);
            }
            if let Some(user_agent) = user_agent {
                ctx = ctx.with_user_agent(user_agent);
            }
            if let Some(since) = if_modified_since {
                ctx = ctx.with_if_modified_since(since);
            }

            let (response, outcome) = service.handle(&request, &ctx);
            println!("{} ({outcome})", response.status);
            for (name, value) in &response.headers {
                println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, &response.body)?;
                    println!("==> {} bytes → {}", response.body.len(), path.display());
                }
                None => println!("==> {} bytes", response.body.len()),
            }
        }
        Command::Purge { location } => {
            let (_, service) = start(&cli.config)?;
            let removed =
                service.purge(Some(&location.storage_type), &location.module, location.id)?;
            let dir = service.directory(Some(&location.storage_type), &location.module, location.id);
            if removed {
                println!("Removed {}", dir.cache_root().display());
            } else {
                println!("Nothing cached at {}", dir.cache_root().display());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
