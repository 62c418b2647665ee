//! # SRLUT Tool
//!
//! Operator CLI for the LUT upscaler: adapter inspection, single-image
//! upscaling and throughput benchmarks.
//!
//! ```text
//! srlut info
//! srlut upscale --input <image> --output <image> [--lut <table.bin>] [--cpu]
//! srlut bench [--frames <n>] [--cpu] [--json]
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use srlut_core::{
    reference, GpuContext, LutTable, LutUpscaler, NativeBuffer, Outcome, StaticProvider,
    VideoFilter, VideoFrame, SCALE_FACTOR, SUPPORTED_SHAPES,
};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // stdout is reserved for command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("srlut=info".parse()?))
        .with_writer(io::stderr)
        .init();

    match args.get(1).map(String::as_str) {
        Some("info") => run_info(),
        Some("upscale") => run_upscale(parse_upscale_args(&args)?),
        Some("bench") => run_bench(parse_bench_args(&args)?),
        Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    eprintln!(
        "\nSRLUT v{}\n\nUsage:\n  srlut info\n  srlut upscale --input <image> --output <image> [--lut <table.bin>] [--cpu]\n  srlut bench [--frames <n>] [--cpu] [--json]\n",
        env!("CARGO_PKG_VERSION")
    );
}

fn format_shapes() -> String {
    SUPPORTED_SHAPES
        .iter()
        .map(|(w, h)| format!("{w}x{h}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// CPU path for `--cpu` runs, row-parallel when the `rayon` feature is on.
fn cpu_upscale(lut: &LutTable, src: &[u8], width: u32, height: u32) -> Vec<u8> {
    #[cfg(feature = "rayon")]
    {
        reference::upscale_plane_parallel(lut, src, width, height)
    }
    #[cfg(not(feature = "rayon"))]
    {
        reference::upscale_plane(lut, src, width, height)
    }
}

// ============================================================================
// info
// ============================================================================

fn run_info() -> Result<()> {
    let ctx = GpuContext::global().context("GPU context unavailable")?;
    let info = ctx.adapter_info();
    println!("adapter: {}", info.name);
    println!("backend: {:?}", info.backend);
    println!("type:    {:?}", info.device_type);
    println!("driver:  {} {}", info.driver, info.driver_info);
    println!("shapes:  {}", format_shapes());
    Ok(())
}

// ============================================================================
// upscale
// ============================================================================

struct UpscaleOptions {
    input: PathBuf,
    output: PathBuf,
    lut: Option<PathBuf>,
    cpu: bool,
}

fn parse_upscale_args(args: &[String]) -> Result<UpscaleOptions> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut lut: Option<PathBuf> = None;
    let mut cpu = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("missing value for --input"))?;
                input = Some(PathBuf::from(value));
                i += 2;
            }
            "--output" | "-o" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("missing value for --output"))?;
                output = Some(PathBuf::from(value));
                i += 2;
            }
            "--lut" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("missing value for --lut"))?;
                lut = Some(PathBuf::from(value));
                i += 2;
            }
            "--cpu" => {
                cpu = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => bail!("unknown upscale option: {other}"),
        }
    }

    let input = input.ok_or_else(|| anyhow::anyhow!("missing required --input"))?;
    let output = output.ok_or_else(|| anyhow::anyhow!("missing required --output"))?;
    Ok(UpscaleOptions {
        input,
        output,
        lut,
        cpu,
    })
}

fn run_upscale(options: UpscaleOptions) -> Result<()> {
    let lut = match &options.lut {
        Some(path) => {
            LutTable::from_file(path).with_context(|| format!("loading table {}", path.display()))?
        }
        None => LutTable::builtin(),
    };

    let image = image::open(&options.input)
        .with_context(|| format!("opening {}", options.input.display()))?
        .to_luma8();
    let (width, height) = image.dimensions();
    if !SUPPORTED_SHAPES.contains(&(width, height)) {
        bail!(
            "input is {width}x{height}; supported source shapes: {}",
            format_shapes()
        );
    }

    let src = image.into_raw();
    let started = Instant::now();
    let upscaled = if options.cpu {
        cpu_upscale(&lut, &src, width, height)
    } else {
        gpu_upscale(lut, &src, width, height)?
    };
    let elapsed = started.elapsed();

    let (dst_w, dst_h) = (width * SCALE_FACTOR, height * SCALE_FACTOR);
    let out = image::GrayImage::from_raw(dst_w, dst_h, upscaled)
        .context("upscaled plane has unexpected size")?;
    out.save(&options.output)
        .with_context(|| format!("saving {}", options.output.display()))?;

    tracing::info!(
        "upscaled {}x{} -> {}x{} in {:.1} ms ({})",
        width,
        height,
        dst_w,
        dst_h,
        elapsed.as_secs_f64() * 1000.0,
        if options.cpu { "cpu" } else { "gpu" }
    );
    Ok(())
}

fn gpu_upscale(lut: LutTable, src: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let ctx = GpuContext::global().context("GPU context unavailable")?;
    let mut filter = LutUpscaler::with_provider(lut, Arc::new(StaticProvider::new(ctx.clone())));

    let mut frame = VideoFrame::native(
        width,
        height,
        NativeBuffer {
            y: Some(ctx.upload_plane(src, width, height)),
            u: None,
            v: None,
        },
    );
    match filter.process(&mut frame) {
        Outcome::Enhanced => {}
        Outcome::Passthrough(err) => bail!("upscale failed: {err}"),
    }

    let out = frame
        .native_luma()
        .cloned()
        .context("missing output luma handle")?;
    Ok(ctx.download_luma(&out, frame.width(), frame.height())?)
}

// ============================================================================
// bench
// ============================================================================

struct BenchOptions {
    frames: u32,
    cpu: bool,
    json: bool,
}

fn parse_bench_args(args: &[String]) -> Result<BenchOptions> {
    let mut frames: u32 = 120;
    let mut cpu = false;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" | "-n" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("missing value for --frames"))?;
                frames = value
                    .parse()
                    .with_context(|| format!("invalid frame count {value}"))?;
                i += 2;
            }
            "--cpu" => {
                cpu = true;
                i += 1;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => bail!("unknown bench option: {other}"),
        }
    }

    if frames == 0 {
        bail!("--frames must be at least 1");
    }
    Ok(BenchOptions { frames, cpu, json })
}

#[derive(Serialize)]
struct BenchReport {
    mode: &'static str,
    width: u32,
    height: u32,
    frames: u32,
    avg_ms: f64,
    min_ms: f64,
    max_ms: f64,
    fps: f64,
}

fn run_bench(options: BenchOptions) -> Result<()> {
    let (width, height) = (640u32, 360u32);
    let lut = LutTable::builtin();
    let mut timings_ms = Vec::with_capacity(options.frames as usize);

    if options.cpu {
        for n in 0..options.frames {
            let src = synthetic_plane(width, height, n);
            let started = Instant::now();
            let out = cpu_upscale(&lut, &src, width, height);
            timings_ms.push(started.elapsed().as_secs_f64() * 1000.0);
            std::hint::black_box(out);
        }
    } else {
        let ctx = GpuContext::global().context("GPU context unavailable")?;
        let mut filter =
            LutUpscaler::with_provider(lut, Arc::new(StaticProvider::new(ctx.clone())));

        // pipeline build and table upload happen outside the timed loop
        let mut warmup = bench_frame(&ctx, width, height, 0);
        match filter.process(&mut warmup) {
            Outcome::Enhanced => {}
            Outcome::Passthrough(err) => bail!("warmup failed: {err}"),
        }

        for n in 0..options.frames {
            let mut frame = bench_frame(&ctx, width, height, n + 1);
            let started = Instant::now();
            match filter.process(&mut frame) {
                Outcome::Enhanced => {}
                Outcome::Passthrough(err) => bail!("frame {n} failed: {err}"),
            }
            timings_ms.push(started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    let report = summarize(&timings_ms, width, height, options.cpu);
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {}x{} -> {}x{}: {} frames, avg {:.2} ms, min {:.2} ms, max {:.2} ms, {:.1} fps",
            report.mode,
            report.width,
            report.height,
            report.width * SCALE_FACTOR,
            report.height * SCALE_FACTOR,
            report.frames,
            report.avg_ms,
            report.min_ms,
            report.max_ms,
            report.fps
        );
    }
    Ok(())
}

fn bench_frame(ctx: &GpuContext, width: u32, height: u32, seed: u32) -> VideoFrame {
    let plane = synthetic_plane(width, height, seed);
    VideoFrame::native(
        width,
        height,
        NativeBuffer {
            y: Some(ctx.upload_plane(&plane, width, height)),
            u: None,
            v: None,
        },
    )
}

fn synthetic_plane(width: u32, height: u32, seed: u32) -> Vec<u8> {
    (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            ((x + y * 3 + seed * 11) & 0xff) as u8
        })
        .collect()
}

fn summarize(timings_ms: &[f64], width: u32, height: u32, cpu: bool) -> BenchReport {
    let frames = timings_ms.len() as u32;
    let total: f64 = timings_ms.iter().sum();
    let avg_ms = total / frames as f64;
    let min_ms = timings_ms.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = timings_ms.iter().copied().fold(0.0_f64, f64::max);
    BenchReport {
        mode: if cpu { "cpu" } else { "gpu" },
        width,
        height,
        frames,
        avg_ms,
        min_ms,
        max_ms,
        fps: if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 },
    }
}
