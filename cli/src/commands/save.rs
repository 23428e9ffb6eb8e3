//! `a3s-stow save` command: write images to a tar archive.
//!
//! The archive is valid for both `docker load` and OCI image-layout
//! readers. Without `--output` it is streamed to stdout.

use std::io::IsTerminal;
use std::path::PathBuf;

use a3s_stow_core::config::{GlobalOptions, ImageSaveOptions};
use a3s_stow_core::platform::parse_platforms;
use a3s_stow_runtime::{Destination, ImageExporter, LocalRuntime, SaveRequest};
use clap::Args;

#[derive(Args)]
pub struct SaveArgs {
    /// Images to save (name[:tag], name@digest or image ID)
    #[arg(value_name = "IMAGE")]
    pub images: Vec<String>,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Save only these platforms (e.g. "linux/amd64,linux/arm64"), can be repeated
    #[arg(long, value_name = "LIST")]
    pub platform: Vec<String>,

    /// Save every platform of multi-platform images (overrides --platform)
    #[arg(long)]
    pub all_platforms: bool,
}

impl SaveArgs {
    fn into_options(self, global: GlobalOptions) -> ImageSaveOptions {
        ImageSaveOptions {
            global,
            images: self.images,
            output: self.output,
            platforms: self.platform,
            all_platforms: self.all_platforms,
        }
    }
}

pub async fn execute(args: SaveArgs, global: GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.into_options(global);
    save(&options)?;
    Ok(())
}

/// Run an export described by `options`, returning the archive size.
pub(crate) fn save(options: &ImageSaveOptions) -> Result<u64, Box<dyn std::error::Error>> {
    let platforms = parse_platforms(options.platforms.as_slice())?;

    let destination = match &options.output {
        Some(path) => Destination::File(path.clone()),
        None if std::io::stdout().is_terminal() => {
            return Err(
                "refusing to write the archive to a terminal; use --output or redirect stdout"
                    .into(),
            );
        }
        None => Destination::Stdout,
    };

    let layout = options.global.layout()?;
    let runtime = LocalRuntime::open(&layout)?;
    let request = SaveRequest::new(options.images.clone())
        .with_platforms(platforms)
        .with_all_platforms(options.all_platforms);

    let written = ImageExporter::new(&runtime).export_to(&request, &destination)?;
    if let Destination::File(path) = &destination {
        tracing::info!(
            path = %path.display(),
            size = %crate::output::format_bytes(written),
            "Saved images"
        );
    }
    Ok(written)
}
