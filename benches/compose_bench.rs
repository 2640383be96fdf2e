use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use image::{Rgba, RgbaImage};
use meme_canvas::{MemeState, MemeStyle};
use meme_canvas_raster::{encode_png, RasterRenderer, RasterTextMeasurer};
use meme_canvas_render::{ImageSize, LayoutEngine, MemeFrame};

const LONG_TOP: &str = "when you finally fix the bug at three in the morning";
const LONG_BOTTOM: &str = "and the fix introduces two new ones";

const SCENARIOS: &[(&str, MemeStyle, (u32, u32))] = &[
    ("classic-landscape", MemeStyle::Classic, (1200, 800)),
    ("classic-portrait", MemeStyle::Classic, (600, 900)),
    ("modern-landscape", MemeStyle::Modern, (1200, 800)),
    ("demotivational-square", MemeStyle::Demotivational, (1000, 1000)),
];

/// Counts live heap bytes so each case can report its peak above baseline.
struct HeapTracker;

static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL_ALLOCATOR: HeapTracker = HeapTracker;

impl HeapTracker {
    fn grow(delta: usize) {
        let live = LIVE_BYTES.fetch_add(delta, Ordering::Relaxed) + delta;
        PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
    }

    fn shrink(delta: usize) {
        LIVE_BYTES.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Restart peak tracking and return the current live bytes.
    fn checkpoint() -> usize {
        let live = LIVE_BYTES.load(Ordering::Relaxed);
        PEAK_BYTES.store(live, Ordering::Relaxed);
        live
    }

    fn peak_since(baseline: usize) -> usize {
        PEAK_BYTES.load(Ordering::Relaxed).saturating_sub(baseline)
    }
}

unsafe impl GlobalAlloc for HeapTracker {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            Self::grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        Self::shrink(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            Self::shrink(layout.size());
            Self::grow(new_size);
        }
        new_ptr
    }
}

/// One measured operation on one scenario.
struct Sample {
    scenario: &'static str,
    case: &'static str,
    canvas: (u32, u32),
    commands: usize,
    /// Bytes produced by the case: surface bytes or encoded PNG size.
    output_bytes: usize,
    median_ns: u128,
    p90_ns: u128,
    max_ns: u128,
    median_peak_heap_bytes: usize,
}

fn nth<T: Copy>(sorted: &[T], fraction: f64) -> T {
    let idx = ((sorted.len().saturating_sub(1) as f64) * fraction).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Time `op` and record its peak heap use. `op` returns the output size.
fn measure<F>(iters: (usize, usize), mut op: F) -> (usize, [u128; 3], usize)
where
    F: FnMut() -> usize,
{
    let (warmup, runs) = iters;
    for _ in 0..warmup {
        black_box(op());
    }
    let mut output = 0;
    let mut times = Vec::with_capacity(runs);
    let mut peaks = Vec::with_capacity(runs);
    for _ in 0..runs.max(1) {
        let baseline = HeapTracker::checkpoint();
        let start = Instant::now();
        output = black_box(op());
        times.push(start.elapsed().as_nanos());
        peaks.push(HeapTracker::peak_since(baseline));
    }
    times.sort_unstable();
    peaks.sort_unstable();
    let timing = [nth(&times, 0.5), nth(&times, 0.9), nth(&times, 1.0)];
    (output, timing, nth(&peaks, 0.5))
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn sample(
    scenario: &'static str,
    case: &'static str,
    frame: &MemeFrame,
    measured: (usize, [u128; 3], usize),
) -> Sample {
    let (output_bytes, [median_ns, p90_ns, max_ns], median_peak_heap_bytes) = measured;
    Sample {
        scenario,
        case,
        canvas: (frame.width, frame.height),
        commands: frame.merged_commands_len(),
        output_bytes,
        median_ns,
        p90_ns,
        max_ns,
        median_peak_heap_bytes,
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let iters = if quick { (1, 3) } else { (3, 20) };

    println!("# meme-canvas benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        iters.0,
        iters.1
    );
    println!(
        "scenario,case,canvas,commands,output_bytes,median_ns,p90_ns,max_ns,median_peak_heap_bytes"
    );

    let layout = LayoutEngine::default().with_text_measurer(RasterTextMeasurer::shared());
    let renderer = RasterRenderer::default();

    let mut samples = Vec::new();
    for &(key, style, (width, height)) in SCENARIOS {
        let pixels = gradient(width, height);
        let size = ImageSize::new(width, height);
        let state = MemeState {
            image: Some("bench".to_string()),
            top_text: LONG_TOP.to_string(),
            bottom_text: LONG_BOTTOM.to_string(),
            style,
            ..MemeState::default()
        };
        let frame = layout.compose(size, &state, None);

        let measured = measure(iters, || {
            layout.compose(size, &state, None).merged_commands_len()
        });
        samples.push(sample(key, "compose", &frame, measured));

        let measured = measure(iters, || {
            renderer.rasterize(&frame, Some(&pixels)).pixels().as_raw().len()
        });
        samples.push(sample(key, "rasterize", &frame, measured));

        let measured = measure(iters, || {
            let frame = layout.compose(size, &state, None);
            let surface = renderer.rasterize(&frame, Some(&pixels));
            match encode_png(&surface) {
                Ok(png) => png.bytes.len(),
                Err(err) => {
                    eprintln!("{}: png encode failed: {}", key, err);
                    0
                }
            }
        });
        samples.push(sample(key, "compose_rasterize_png", &frame, measured));
    }

    for s in &samples {
        println!(
            "{},{},{}x{},{},{},{},{},{},{}",
            s.scenario,
            s.case,
            s.canvas.0,
            s.canvas.1,
            s.commands,
            s.output_bytes,
            s.median_ns,
            s.p90_ns,
            s.max_ns,
            s.median_peak_heap_bytes
        );
    }
}
