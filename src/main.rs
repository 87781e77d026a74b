use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;

use smallpixel::config::{DisplayGeometry, EngineConfig, Quality, TargetResolution};
use smallpixel::host::{BitrateSink, FrameClock, FrameSink, FrameSource, VideoFrame};
use smallpixel::{Size, Tier, UpscalingEngine};

/// Offline demo of the upscaling engine: feeds synthetic video frames
/// through the full planner → render chain → stats pipeline and prints the
/// resulting session statistics.
#[derive(Parser, Debug)]
#[command(name = "smallpixel")]
#[command(about = "Run the adaptive upscaling engine against synthetic video frames")]
struct Args {
    /// Display width in CSS pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Display height in CSS pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Device pixel ratio of the simulated display
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// Number of frames to run before stopping
    #[arg(short = 'n', long, default_value_t = 120)]
    frames: u32,

    /// Quality preset
    #[arg(short, long, value_enum, default_value = "high")]
    quality: Quality,

    /// Explicit target tier name (480p, 720p, 1080p, 1440p, 4K, 8K); auto-detected when omitted
    #[arg(short, long)]
    target: Option<String>,

    /// Disable the GPU shader tier
    #[arg(long)]
    no_gpu: bool,

    /// Disable bandwidth savings (deliver at the target tier)
    #[arg(long)]
    no_savings: bool,

    /// Base URL or directory for super-resolution model assets
    #[arg(long)]
    model_base: Option<String>,

    /// API key sent with model fetches
    #[arg(long, default_value = "")]
    api_key: String,

    /// Print the final stats snapshot as JSON
    #[arg(long)]
    json: bool,
}

/// Synthetic source: a moving gradient at the planned delivery tier.
struct GradientSource {
    size: Size,
    tick: u64,
}

#[async_trait]
impl FrameSource for GradientSource {
    async fn sample_frame(&mut self) -> Option<VideoFrame> {
        let (w, h) = (self.size.w as usize, self.size.h as usize);
        let mut data = vec![255u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 4;
                data[i] = ((x as u64 + self.tick) % 256) as u8;
                data[i + 1] = ((y as u64 + self.tick) % 256) as u8;
                data[i + 2] = (self.tick % 256) as u8;
            }
        }
        self.tick += 1;
        let mut frame = VideoFrame::tightly_packed(data, self.size.w, self.size.h);
        frame.pts_ns = Some(self.tick * 16_666_667);
        Some(frame)
    }

    fn input_size(&self) -> Option<Size> {
        Some(self.size)
    }
}

/// Sink that only counts presented frames.
struct CountingSink {
    presented: Arc<AtomicU32>,
}

#[async_trait]
impl FrameSink for CountingSink {
    async fn acquire(&mut self, _target: Size) -> smallpixel::EngineResult<()> {
        Ok(())
    }

    async fn present_frame(&mut self, _frame: &VideoFrame) -> smallpixel::EngineResult<()> {
        self.presented.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Interval-based stand-in for a real display clock.
struct IntervalClock {
    period: Duration,
}

#[async_trait]
impl FrameClock for IntervalClock {
    async fn next_frame(&mut self) {
        tokio::time::sleep(self.period).await;
    }

    fn refresh_rate(&self) -> f64 {
        1.0 / self.period.as_secs_f64()
    }
}

struct LoggingBitrateSink;

impl BitrateSink for LoggingBitrateSink {
    fn request_tier(&self, tier: Tier) {
        println!("ABR player asked to deliver: {}", tier.name());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smallpixel=info".into()),
        )
        .init();

    let args = Args::parse();

    let target_resolution = match args.target.as_deref() {
        Some(name) => TargetResolution::Fixed(
            Tier::from_name(name)
                .ok_or_else(|| anyhow::anyhow!("unknown tier: {name}"))?,
        ),
        None => TargetResolution::Auto,
    };

    let config = EngineConfig {
        target_resolution,
        quality: args.quality,
        enable_upscaling: true,
        gpu_acceleration: !args.no_gpu,
        bandwidth_savings: !args.no_savings,
        api_key: args.api_key,
        model_base: args.model_base,
    };

    // Plan the tiers up front only to size the synthetic source; the engine
    // repeats the same planning internally at start().
    let target = sp_scale::tiers::detect_target(
        config.target_resolution.as_explicit(),
        args.width,
        args.height,
        args.dpr,
    );
    let source_tier = if config.bandwidth_savings {
        sp_scale::tiers::optimal_source(target)
    } else {
        target
    };
    println!(
        "display {}x{} @ {:.1}x → target {}, delivery {}",
        args.width,
        args.height,
        args.dpr,
        target.name(),
        source_tier.name()
    );

    let presented = Arc::new(AtomicU32::new(0));
    let mut engine = UpscalingEngine::builder()
        .config(config)
        .display(DisplayGeometry::new(args.width, args.height).with_pixel_ratio(args.dpr))
        .source(GradientSource {
            size: source_tier.size(),
            tick: 0,
        })
        .sink(CountingSink {
            presented: Arc::clone(&presented),
        })
        .clock(IntervalClock {
            period: Duration::from_millis(16),
        })
        .bitrate_sink(LoggingBitrateSink)
        .build()?;

    engine.initialize().await?;
    engine.start().await?;

    let stop = engine.stop_handle();
    let frames = args.frames;
    let watcher = tokio::spawn({
        let presented = Arc::clone(&presented);
        async move {
            while presented.load(Ordering::Relaxed) < frames {
                tokio::time::sleep(Duration::from_millis(8)).await;
            }
            stop.stop();
        }
    });

    engine.run().await?;
    watcher.await?;

    let stats = engine.stats();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "rendered {} frames ({} skipped) at {} → {} via {:?}",
            stats.frames_rendered,
            stats.frames_skipped,
            stats.original_resolution,
            stats.target_resolution,
            stats.active_strategy
        );
        println!(
            "savings: {:.2}% of delivery bitrate, {:.3} MB this session, last frame {:.2} ms",
            stats.savings_percentage, stats.bandwidth_saved_mb, stats.upscaling_latency_ms
        );
    }

    engine.destroy().await;
    Ok(())
}
