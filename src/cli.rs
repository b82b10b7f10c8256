use crate::channel::{FLOW_FILE_SUFFIX, HostMessage};
use crate::config::{Config, load_config};
use crate::ir::Direction;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flowviz", version, about = "Salesforce Flow (.flow-meta.xml) visualizer")]
pub struct Args {
    /// Input file, a directory of .flow-meta.xml files, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (or directory for directory input). Defaults to stdout for text formats.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON5 file (theme, themeVariables, layout, missingTargets)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Flow direction, TB or LR (overrides the config file)
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Also write the positioned scene as JSON to this path
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    /// Positioned scene as JSON
    Json,
    /// The renderFlow channel message as one JSON line
    Message,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
            OutputFormat::Message => "jsonl",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(token) = args.direction.as_deref() {
        config.layout.direction = Direction::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("Unknown direction '{token}' (expected TB or LR)"))?;
    }

    if let Some(dir) = args.input.as_deref().filter(|path| path.is_dir()) {
        let inputs = collect_flow_files(dir)?;
        if inputs.is_empty() {
            return Err(anyhow::anyhow!(
                "No {FLOW_FILE_SUFFIX} files found in {}",
                dir.display()
            ));
        }
        let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format, &inputs)?;
        for (input, output) in inputs.iter().zip(&outputs) {
            let text = std::fs::read_to_string(input)?;
            render_one(&text, &config, args.output_format, Some(output.as_path()), None)?;
        }
        return Ok(());
    }

    let input = read_input(args.input.as_deref())?;
    render_one(
        &input,
        &config,
        args.output_format,
        args.output.as_deref(),
        args.dump_layout.as_deref(),
    )
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn render_one(
    input: &str,
    config: &Config,
    format: OutputFormat,
    output: Option<&Path>,
    dump_layout: Option<&Path>,
) -> Result<()> {
    let rendered = crate::layout_flow(input, config)?;
    if let Some(path) = dump_layout {
        write_layout_dump(path, &rendered.scene)?;
    }
    match format {
        OutputFormat::Svg => {
            let svg = render_svg(&rendered.scene, &config.theme, &config.render);
            write_output_svg(&svg, output)?;
        }
        OutputFormat::Png => {
            let output = ensure_output(output, "png")?;
            let svg = render_svg(&rendered.scene, &config.theme, &config.render);
            write_output_png(&svg, output, &config.render)?;
        }
        OutputFormat::Json => {
            let dump = LayoutDump::from_scene(&rendered.scene);
            write_text(&serde_json::to_string_pretty(&dump)?, output)?;
        }
        OutputFormat::Message => {
            let message = HostMessage::RenderFlow {
                data: rendered.data,
                scene: None,
            };
            write_text(&format!("{}\n", serde_json::to_string(&message)?), output)?;
        }
    }
    Ok(())
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output<'a>(output: Option<&'a Path>, ext: &str) -> Result<&'a Path> {
    output.ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

fn collect_flow_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_flow = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(FLOW_FILE_SUFFIX));
        if path.is_file() && is_flow {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One output per input, named after the flow (`Order.flow-meta.xml` becomes
/// `Order.svg`) inside the output directory.
fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    inputs: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let base = output.ok_or_else(|| anyhow::anyhow!("Output directory required for directory input"))?;
    if !base.is_dir() {
        std::fs::create_dir_all(base)?;
    }
    let outputs = inputs
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            let stem = input
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(FLOW_FILE_SUFFIX))
                .map(str::to_string)
                .unwrap_or_else(|| format!("flow-{}", idx + 1));
            base.join(format!("{stem}.{}", format.extension()))
        })
        .collect();
    Ok(outputs)
}
