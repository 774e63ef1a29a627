use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use hexflip::{
    AtlasOpts, Compositor, CompositorOpts, DEFAULT_MAX_WIDTH, GraphStore, Manifest, NodeId,
    forward_tasks, pack_atlas,
};

#[derive(Parser, Debug)]
#[command(name = "hexflip", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a single frame of the recipe root as a PNG.
    Frame(FrameArgs),
    /// Pack every frame of the recipe root into a sprite sheet PNG + JSON.
    Atlas(AtlasArgs),
    /// Re-derive every node ID from content and write the merged manifest.
    Rehash(RehashArgs),
    /// Write the starter manifest.
    Starter(StarterArgs),
    /// Emit the preview-window snapshot of the recipe root as JSON.
    Viewer(ViewerArgs),
    /// Print every task command, one JSON record per line.
    Tasks(TasksArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input manifest JSON; repeat to merge several.
    #[arg(long = "in", required = true)]
    in_paths: Vec<PathBuf>,

    /// Frame index (0-based).
    #[arg(long)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Start from a transparent background instead of the checkerboard.
    #[arg(long, default_value_t = false)]
    transparent: bool,
}

#[derive(Parser, Debug)]
struct AtlasArgs {
    /// Input manifest JSON; repeat to merge several.
    #[arg(long = "in", required = true)]
    in_paths: Vec<PathBuf>,

    /// Output directory for `atlas.png` and `atlas.json`.
    #[arg(long)]
    out_dir: PathBuf,

    /// Maximum sheet width in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// Start each frame from a transparent background instead of the checkerboard.
    #[arg(long, default_value_t = false)]
    transparent: bool,

    /// Compose frames on worker threads.
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

#[derive(Parser, Debug)]
struct RehashArgs {
    /// Input manifest JSON; repeat to merge several.
    #[arg(long = "in", required = true)]
    in_paths: Vec<PathBuf>,

    /// Output manifest path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct StarterArgs {
    /// Output manifest path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ViewerArgs {
    /// Input manifest JSON; repeat to merge several.
    #[arg(long = "in", required = true)]
    in_paths: Vec<PathBuf>,

    /// Output JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TasksArgs {
    /// Input manifest JSON; repeat to merge several.
    #[arg(long = "in", required = true)]
    in_paths: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Atlas(args) => cmd_atlas(args),
        Command::Rehash(args) => cmd_rehash(args),
        Command::Starter(args) => cmd_starter(args),
        Command::Viewer(args) => cmd_viewer(args),
        Command::Tasks(args) => cmd_tasks(args),
    }
}

fn load_store(paths: &[PathBuf]) -> anyhow::Result<GraphStore> {
    let mut store = GraphStore::new();
    for path in paths {
        store
            .merge_manifest_path(path)
            .with_context(|| format!("load manifest '{}'", path.display()))?;
    }
    Ok(store)
}

fn recipe_root(store: &GraphStore) -> anyhow::Result<NodeId> {
    store
        .roots()
        .recipe
        .clone()
        .context("merged manifests have no recipe root")
}

fn compositor_opts(transparent: bool) -> CompositorOpts {
    CompositorOpts {
        checkerboard: !transparent,
        ..CompositorOpts::default()
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut store = load_store(&args.in_paths)?;
    let recipe = recipe_root(&store)?;
    let mut compositor = Compositor::new(compositor_opts(args.transparent));
    let composed = store
        .compose_frame(&mut compositor, &recipe, args.frame)
        .with_context(|| format!("recipe '{recipe}' has no renderable plan"))?;
    composed.frame.save_png(&args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_atlas(args: AtlasArgs) -> anyhow::Result<()> {
    let mut store = load_store(&args.in_paths)?;
    let recipe = recipe_root(&store)?;
    let plan = store
        .build_plan(&recipe)
        .with_context(|| format!("recipe '{recipe}' has no renderable plan"))?;
    let mut compositor = Compositor::new(compositor_opts(args.transparent));
    let opts = AtlasOpts {
        max_width: args.max_width,
        parallel: args.parallel,
        ..AtlasOpts::default()
    };
    let atlas = pack_atlas(&mut compositor, &plan, &opts)?;
    let (png, json) = atlas.write_to_dir(&args.out_dir)?;

    eprintln!(
        "wrote {} ({}x{}) and {} ({} frames)",
        png.display(),
        atlas.sheet.width,
        atlas.sheet.height,
        json.display(),
        atlas.meta.frames.len()
    );
    Ok(())
}

fn cmd_rehash(args: RehashArgs) -> anyhow::Result<()> {
    let mut store = load_store(&args.in_paths)?;
    let report = store.recompute_ids();
    store.snapshot().write_to_path(&args.out)?;

    eprintln!(
        "wrote {} ({} nodes, {} renamed, {} collapsed)",
        args.out.display(),
        store.len(),
        report.renamed,
        report.collapsed
    );
    Ok(())
}

fn cmd_starter(args: StarterArgs) -> anyhow::Result<()> {
    Manifest::starter().write_to_path(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_viewer(args: ViewerArgs) -> anyhow::Result<()> {
    let mut store = load_store(&args.in_paths)?;
    let recipe = recipe_root(&store)?;
    let snap = store
        .snapshot_for_viewer(&recipe)
        .with_context(|| format!("recipe '{recipe}' has no renderable plan"))?;
    let text = serde_json::to_string_pretty(&snap).context("serialize viewer snapshot")?;
    match args.out {
        Some(path) => write_text(&path, &text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_tasks(args: TasksArgs) -> anyhow::Result<()> {
    let store = load_store(&args.in_paths)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failed = None;
    let mut sink = |cmd: &serde_json::Value| match writeln!(out, "{cmd}") {
        Ok(()) => true,
        Err(e) => {
            failed.get_or_insert(e);
            false
        }
    };
    let report = forward_tasks(&store, &mut sink);
    if let Some(e) = failed {
        return Err(e).context("write task commands to stdout");
    }

    eprintln!(
        "forwarded {} commands from {} tasks ({} skipped)",
        report.commands_sent, report.tasks_run, report.skipped
    );
    Ok(())
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}
