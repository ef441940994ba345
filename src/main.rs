//! Skylight
//!
//! Compositor core for a browser-hosted remote display. Decodes fragmented
//! YUVA frames, composites them with OpenGL and places transient surfaces
//! with xdg positioner rules.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skylight::compositor::color::composite_cpu;
use skylight::compositor::planes::{YuvaPlanes, MAX_PLANE_ALIGNMENT};
use skylight::compositor::{Compositor, Presented, SurfaceId};
use skylight::config::{Config, RendererConfig};
use skylight::proto::{self, EncodedFrame, Fragment, FrameHeader};
use skylight::server::{self, StreamEvent, FRAME_QUEUE_DEPTH};
use skylight::shared::{Point, Rect};
use skylight::wm::{Anchor, ConstraintAdjustment, ConstraintViolations, Gravity, Positioner};

#[derive(Parser, Debug)]
#[command(name = "skylight", version)]
struct Cli {
    /// Config file (default: ~/.config/skylight/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a frame's header and fragment sizes.
    Inspect(InspectArgs),
    /// Pack raw fragment files into a frame.
    Encode(EncodeArgs),
    /// Composite a frame and write it as PNG.
    Render(RenderArgs),
    /// Place a surface with positioner rules and print the result as JSON.
    Place(PlaceArgs),
    /// Composite frames streamed over a Unix socket.
    Serve(ServeArgs),
    /// Stream frame files to a running server.
    Send(SendArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Encoded frame file.
    frame: PathBuf,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    #[arg(long, default_value_t = 0)]
    serial: u32,

    #[arg(long, default_value_t = 0)]
    encoding_type: u16,

    #[arg(long)]
    width: u16,

    #[arg(long)]
    height: u16,

    /// Fragment payload files, in plane order.
    fragments: Vec<PathBuf>,

    /// Output frame path.
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Encoded frame file.
    frame: PathBuf,

    /// Output PNG path.
    #[arg(short, long)]
    out: PathBuf,

    /// Use the CPU reference compositor instead of OpenGL.
    #[arg(long)]
    cpu: bool,

    /// Plane row and height alignment (overrides the config).
    #[arg(long, value_parser = clap::value_parser!(u32).range(..=MAX_PLANE_ALIGNMENT as i64))]
    alignment: Option<u32>,
}

#[derive(Parser, Debug)]
struct PlaceArgs {
    /// Surface size, `WxH`.
    #[arg(long, value_parser = parse_pair)]
    size: (i32, i32),

    /// Anchor rectangle relative to the parent, `x,y,w,h`.
    #[arg(long, value_parser = parse_quad)]
    anchor_rect: (i32, i32, i32, i32),

    #[arg(long, default_value_t = Anchor::None)]
    anchor: Anchor,

    #[arg(long, default_value_t = Gravity::None)]
    gravity: Gravity,

    /// Offset from the anchor point, `x,y`.
    #[arg(long, value_parser = parse_pair, default_value = "0,0")]
    offset: (i32, i32),

    /// Constraint adjustments, e.g. `slide-x,flip-y`.
    #[arg(long, value_parser = parse_constraints, default_value = "none")]
    constraints: ConstraintAdjustment,

    /// Parent window geometry, `x,y,w,h`.
    #[arg(long, value_parser = parse_quad)]
    parent: (i32, i32, i32, i32),

    /// Constraint bounds in parent coordinates, `x0,y0,x1,y1`
    /// (default: the configured output).
    #[arg(long, value_parser = parse_quad)]
    bounds: Option<(i32, i32, i32, i32)>,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Socket path (overrides the config).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Write every composited frame as PNG here (overrides the config).
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SendArgs {
    /// Socket path (overrides the config).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Encoded frame files, sent in order.
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

fn split_numbers(s: &str) -> Result<Vec<i32>, String> {
    s.split([',', 'x'])
        .map(|part| part.trim().parse::<i32>().map_err(|e| format!("'{}': {}", part, e)))
        .collect()
}

fn parse_pair(s: &str) -> Result<(i32, i32), String> {
    match split_numbers(s)?[..] {
        [a, b] => Ok((a, b)),
        _ => Err(format!("expected two numbers, got '{}'", s)),
    }
}

fn parse_quad(s: &str) -> Result<(i32, i32, i32, i32), String> {
    match split_numbers(s)?[..] {
        [a, b, c, d] => Ok((a, b, c, d)),
        _ => Err(format!("expected four numbers, got '{}'", s)),
    }
}

fn parse_constraints(s: &str) -> Result<ConstraintAdjustment, String> {
    if s.eq_ignore_ascii_case("none") || s.is_empty() {
        return Ok(ConstraintAdjustment::empty());
    }
    let flags = s.to_ascii_uppercase().replace('-', "_").replace(',', "|");
    bitflags::parser::from_str(&flags).map_err(|e| format!("'{}': {}", s, e))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))
}

fn decode_frame(bytes: &[u8]) -> Result<EncodedFrame<'_>> {
    proto::decode(bytes).context("Failed to decode frame")
}

fn write_png(path: &Path, rgba: &[u8], width: u32, height: u32) -> Result<()> {
    image::save_buffer_with_format(path, rgba, width, height, image::ColorType::Rgba8, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {:?}", path))
}

#[derive(Serialize)]
struct FrameSummary {
    #[serde(flatten)]
    header: FrameHeader,
    fragments: Vec<usize>,
    payload_len: usize,
    wire_size: usize,
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let bytes = read_file(&args.frame)?;
    let frame = decode_frame(&bytes)?;

    let summary = FrameSummary {
        header: frame.header(),
        fragments: frame.fragments().iter().map(Fragment::len).collect(),
        payload_len: frame.payload_len(),
        wire_size: frame.wire_size(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let h = &summary.header;
    println!("serial:         {}", h.serial);
    println!("encoding type:  {}", h.encoding_type);
    println!("size:           {}x{}", h.width, h.height);
    println!("fragments:      {}", h.fragment_count);
    for (i, len) in summary.fragments.iter().enumerate() {
        println!("  [{}] {} bytes", i, len);
    }
    println!("payload:        {} bytes", summary.payload_len);
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> Result<()> {
    let payloads = args
        .fragments
        .iter()
        .map(|path| read_file(path))
        .collect::<Result<Vec<_>>>()?;
    let fragments: Vec<Fragment<'_>> = payloads.iter().map(|p| Fragment::new(p)).collect();

    let encoded = proto::encode(args.serial, args.encoding_type, args.width, args.height, &fragments)
        .context("Failed to encode frame")?;
    std::fs::write(&args.out, &encoded).with_context(|| format!("Failed to write {:?}", args.out))?;

    info!("Wrote {} bytes ({} fragments) to {:?}", encoded.len(), fragments.len(), args.out);
    Ok(())
}

fn cmd_render(args: RenderArgs, config: &Config) -> Result<()> {
    let bytes = read_file(&args.frame)?;
    let frame = decode_frame(&bytes)?;
    let alignment = args.alignment.unwrap_or(config.renderer.plane_alignment);
    let (width, height) = (u32::from(frame.width), u32::from(frame.height));

    let rgba = if args.cpu {
        let planes = YuvaPlanes::split(&frame, alignment).context("Frame has a bad plane layout")?;
        composite_cpu(&planes)
    } else {
        let renderer_config = RendererConfig {
            plane_alignment: alignment,
            ..config.renderer.clone()
        };
        let mut compositor = Compositor::new(&renderer_config)?;
        match compositor.present(0, &frame)? {
            Presented::Frame(target) => target.read_rgba(),
            Presented::Stale { serial, last } => {
                anyhow::bail!("frame {} was dropped behind {}", serial, last)
            }
        }
    };

    write_png(&args.out, &rgba, width, height)?;
    info!("Rendered {}x{} frame {} to {:?}", width, height, frame.serial, args.out);
    Ok(())
}

#[derive(Serialize)]
struct Placement {
    geometry: Rect,
    anchor_point: Point,
    violations: ConstraintViolations,
    constrained: bool,
}

fn cmd_place(args: PlaceArgs, config: &Config) -> Result<()> {
    let mut positioner = Positioner::new();
    positioner.set_size(args.size.0, args.size.1)?;
    let (x, y, w, h) = args.anchor_rect;
    positioner.set_anchor_rect(x, y, w, h)?;
    positioner.set_anchor(args.anchor);
    positioner.set_gravity(args.gravity);
    positioner.set_offset(args.offset.0, args.offset.1);
    positioner.set_constraint_adjustment(args.constraints);

    let state = positioner.snapshot()?;
    positioner.destroy();

    let (px, py, pw, ph) = args.parent;
    let parent = Rect::from_origin_size(px, py, pw, ph).context("Invalid parent geometry")?;

    let (min, max) = match args.bounds {
        Some((x0, y0, x1, y1)) => (Point::new(x0, y0), Point::new(x1, y1)),
        None => (Point::ORIGIN, config.output.bounds().context("Invalid output size")?),
    };

    let violations = state.constraint_violations(&parent, min, max);
    let placement = Placement {
        geometry: state.window_geometry(&parent),
        anchor_point: state.anchor_point(&parent),
        violations,
        constrained: violations.is_constrained(),
    };

    println!("{}", serde_json::to_string_pretty(&placement)?);
    Ok(())
}

async fn cmd_serve(args: ServeArgs, config: &Config) -> Result<()> {
    let socket = args.socket.unwrap_or_else(|| config.stream.socket_path());
    let dump_dir = args.dump_dir.or_else(|| config.stream.dump_dir.clone());
    if let Some(dir) = &dump_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create dump dir {:?}", dir))?;
    }

    // Composites run on this task; the GL context is not Send.
    let mut compositor = Compositor::new(&config.renderer)?;
    info!("Compositing on {}", compositor.gl_context().renderer_string());

    let listener = server::bind(&socket)?;
    let (tx, mut rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let accept = tokio::spawn(server::accept_loop(listener, tx, config.stream.max_message_size));

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(StreamEvent::Connected(surface)) => info!("Surface {} connected", surface),
                Some(StreamEvent::Frame { surface, message }) => {
                    if let Err(e) = handle_frame(&mut compositor, surface, &message, dump_dir.as_deref()) {
                        warn!("Surface {}: {:#}", surface, e);
                    }
                }
                Some(StreamEvent::Disconnected(surface)) => compositor.remove_surface(surface),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    accept.abort();
    if let Err(e) = std::fs::remove_file(&socket) {
        debug!("Socket {:?} not removed: {}", socket, e);
    }
    Ok(())
}

fn handle_frame(compositor: &mut Compositor, surface: SurfaceId, message: &[u8], dump_dir: Option<&Path>) -> Result<()> {
    let frame = decode_frame(message)?;

    let target = match compositor.present(surface, &frame)? {
        Presented::Frame(target) => target,
        Presented::Stale { .. } => return Ok(()),
    };

    if let Some(dir) = dump_dir {
        let path = dir.join(format!("surface-{}-{:08}.png", surface, frame.serial));
        write_png(&path, &target.read_rgba(), target.width(), target.height())?;
        debug!("Dumped {:?}", path);
    }
    Ok(())
}

async fn cmd_send(args: SendArgs, config: &Config) -> Result<()> {
    let socket = args.socket.unwrap_or_else(|| config.stream.socket_path());
    let frames = args
        .frames
        .iter()
        .map(|path| {
            let bytes = read_file(path)?;
            proto::decode(&bytes).with_context(|| format!("{:?} is not a valid frame", path))?;
            Ok(bytes)
        })
        .collect::<Result<Vec<_>>>()?;

    server::send_frames(&socket, frames, config.stream.max_message_size).await?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Encode(args) => cmd_encode(args),
        Command::Render(args) => cmd_render(args, &config),
        Command::Place(args) => cmd_place(args, &config),
        Command::Serve(args) => cmd_serve(args, &config).await,
        Command::Send(args) => cmd_send(args, &config).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
