// src/main.rs
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use sv_echogram::config::EchogramConfig;
use sv_echogram::echogram::{
    render_echogram_png, render_histogram_png, CancelToken, ChannelSelector, EchogramPipeline,
    JsonSourceOpener, PlotStyle, Selection, SyntheticConfig, SyntheticSource,
};
const USAGE: &str =
    "usage: sv-echogram <store.json | --synthetic> [channel] [out.png] [--config cfg.json] [--box t0 t1 d0 d1]";
struct Args {
    input: Option<PathBuf>,
    channel: Option<String>,
    output: PathBuf,
    config: Option<PathBuf>,
    // seconds after the first ping, meters below the surface
    selection: Option<[f64; 4]>,
}
fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut selection = None;
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(
                    raw.next().ok_or_else(|| anyhow!("--config needs a path"))?,
                ));
            }
            "--box" => {
                let mut corners = [0.0; 4];
                for corner in corners.iter_mut() {
                    let value = raw.next().ok_or_else(|| anyhow!("--box needs 4 numbers"))?;
                    *corner = value
                        .parse()
                        .with_context(|| format!("invalid --box value {value:?}"))?;
                }
                selection = Some(corners);
            }
            "-h" | "--help" => bail!("{USAGE}"),
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let input = match positional.next() {
        Some(first) if first == "--synthetic" => None,
        Some(first) => Some(PathBuf::from(first)),
        None => bail!("{USAGE}"),
    };
    Ok(Args {
        input,
        channel: positional.next(),
        output: positional
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("echogram.png")),
        config,
        selection,
    })
}
fn histogram_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "echogram".to_owned());
    output.with_file_name(format!("{stem}-hist.png"))
}
fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => EchogramConfig::load(path)?,
        None => EchogramConfig::default(),
    };
    let never = CancelToken::never();
    let mut pipeline = match &args.input {
        None => {
            let source = SyntheticSource::new(SyntheticConfig::default());
            let mut pipeline = EchogramPipeline::with_source(config, Box::new(source))?;
            pipeline.render(&never)?;
            pipeline
        }
        Some(path) => {
            let mut pipeline = EchogramPipeline::new(config, Box::new(JsonSourceOpener))?;
            pipeline
                .change_source(path, &never)
                .with_context(|| format!("failed to render {}", path.display()))?;
            pipeline
        }
    };
    info!("channels: {:?}", pipeline.channels());
    if let Some(channel) = &args.channel {
        pipeline.change_channel(ChannelSelector::Name(channel.clone()), &never)?;
    }
    let view = pipeline.view().ok_or_else(|| anyhow!("nothing rendered"))?;
    let (vmin, vmax) = view.limits;
    info!(
        "{}: {}x{} raster, color limits {vmin:.1}..{vmax:.1} dB",
        view.channel,
        view.raster.width(),
        view.raster.height()
    );
    let png = render_echogram_png(view, &PlotStyle::default())?;
    fs::write(&args.output, png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("wrote {}", args.output.display());
    if let Some([t0, t1, d0, d1]) = args.selection {
        let origin = view.grid.time.first().copied().unwrap_or(0.0);
        let selection = Selection::Rect {
            time: (origin + t0, origin + t1),
            depth: (d0, d1),
        };
        let histogram = pipeline.change_selection(&selection)?;
        info!("selection holds {} samples", histogram.total());
        let path = histogram_path(&args.output);
        let png = render_histogram_png(histogram, &PlotStyle::default())?;
        fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
