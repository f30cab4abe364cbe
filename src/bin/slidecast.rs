use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "slidecast", version)]
struct Cli {
    /// TOML configuration file. Environment overrides apply on top.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the slide plan for a target duration.
    Plan(PlanArgs),
    /// Rasterize a single slide of a lesson package as a PNG.
    Frame(FrameArgs),
    /// Run the full pipeline and print the published artifact as JSON (requires `ffmpeg`).
    Render(RenderArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Target total duration in seconds.
    #[arg(long)]
    duration: u32,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Lesson package JSON.
    #[arg(long)]
    lesson: PathBuf,

    /// Slide number (1-based).
    #[arg(long, default_value_t = 1)]
    slide: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also write the composed SVG next to the PNG.
    #[arg(long)]
    dump_svg: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Lesson package JSON.
    #[arg(long)]
    lesson: PathBuf,

    /// Narration audio file.
    #[arg(long)]
    audio: PathBuf,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Listen address; overrides `server.bind`.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = slidecast::AppConfig::load(cli.config.as_deref())?;
    slidecast::logging::init_logging(&cfg.logging);

    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Render(args) => cmd_render(&cfg, args),
        Command::Serve(args) => cmd_serve(&cfg, args),
    }
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let plan = slidecast::plan_for_duration(args.duration);
    println!(
        "slides: {}\nper_slide_seconds: {}\ntotal_seconds: {}",
        plan.slide_count,
        plan.per_slide_duration_seconds,
        plan.total_seconds()
    );
    Ok(())
}

fn cmd_frame(cfg: &slidecast::AppConfig, args: FrameArgs) -> anyhow::Result<()> {
    let package = slidecast::LessonPackage::from_path(&args.lesson)?;
    let total = package.slides.len();
    if args.slide == 0 || args.slide > total {
        anyhow::bail!("--slide must be in 1..={total}");
    }
    let slide = &package.slides[args.slide - 1];

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    if args.dump_svg {
        let svg_path = args.out.with_extension("svg");
        let svg = slidecast::raster::slide::compose_slide_svg(slide, args.slide, total);
        std::fs::write(&svg_path, svg)
            .with_context(|| format!("write svg '{}'", svg_path.display()))?;
        eprintln!("wrote {}", svg_path.display());
    }

    let rasterizer = slidecast::Rasterizer::new(&cfg.render.rasterizer_opts())?;
    rasterizer.render_slide(slide, args.slide, total, &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(cfg: &slidecast::AppConfig, args: RenderArgs) -> anyhow::Result<()> {
    let package = slidecast::LessonPackage::from_path(&args.lesson)?;
    let pipeline = slidecast::Pipeline::from_config(cfg)?;
    let artifact = pipeline.run(&package, &args.audio)?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

fn cmd_serve(cfg: &slidecast::AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    // Built before the runtime starts: the durable store's blocking client must not be created
    // on an async thread.
    let pipeline = Arc::new(slidecast::Pipeline::from_config(cfg)?);
    let addr = args.bind.unwrap_or(cfg.server.bind);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("slidecast-http")
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(slidecast::server::http::serve(
        addr,
        pipeline,
        &cfg.server.public_base_path,
    ))
}
