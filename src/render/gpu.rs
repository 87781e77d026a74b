//! GPU render strategy: a WGSL compute pipeline running a Lanczos-3
//! resampling kernel over the frame's BGRA pixels.
//!
//! Device, pipeline and the target-sized output buffers persist for the
//! whole session; the input buffer is reallocated only when the sampled
//! frame size changes (the ABR player honors the tier signal best-effort,
//! so incoming frames may be any size). Nothing accumulates per frame.
//!
//! Construction fails cleanly when no adapter exists, which the selection
//! policy treats as "GPU unavailable", not an error. Mid-session failures
//! (device loss, map failure) surface as render errors and demote the
//! chain to CPU for the rest of the session.

use std::sync::mpsc;

use sp_scale::tiers::Size;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::error::{EngineError, EngineResult};
use crate::host::VideoFrame;
use crate::render::{FrameRenderer, Strategy};

/// Lanczos-3 resampling over packed 32-bit pixels, one invocation per
/// output pixel. The kernel is the same windowed sinc the original WebGL
/// fragment shader used, evaluated separably per tap row.
const LANCZOS3_SHADER: &str = r#"
struct Dimensions {
    in_width: u32,
    in_height: u32,
    out_width: u32,
    out_height: u32,
}
@group(0) @binding(0) var<storage, read> input_img: array<u32>;
@group(0) @binding(1) var<storage, read_write> output_img: array<u32>;
@group(0) @binding(2) var<uniform> dims: Dimensions;

fn unpack_px(p: u32) -> vec4<f32> {
    return vec4<f32>(
        f32((p >> 0u) & 0xFFu),
        f32((p >> 8u) & 0xFFu),
        f32((p >> 16u) & 0xFFu),
        f32((p >> 24u) & 0xFFu)
    ) / 255.0;
}
fn pack_px(v: vec4<f32>) -> u32 {
    let c = clamp(v, vec4<f32>(0.0), vec4<f32>(1.0)) * 255.0;
    return (u32(c.w) << 24u) | (u32(c.z) << 16u) | (u32(c.y) << 8u) | u32(c.x);
}

fn lanczos3(x: f32) -> f32 {
    let ax = abs(x);
    if (ax < 1e-5) {
        return 1.0;
    }
    if (ax >= 3.0) {
        return 0.0;
    }
    let pix = 3.14159265359 * x;
    return 3.0 * sin(pix) * sin(pix / 3.0) / (pix * pix);
}

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= dims.out_width || gid.y >= dims.out_height) {
        return;
    }
    let sx = (f32(gid.x) + 0.5) * f32(dims.in_width) / f32(dims.out_width) - 0.5;
    let sy = (f32(gid.y) + 0.5) * f32(dims.in_height) / f32(dims.out_height) - 0.5;
    let x0 = i32(floor(sx));
    let y0 = i32(floor(sy));

    var sum = vec4<f32>(0.0);
    var wsum = 0.0;
    for (var j: i32 = -2; j <= 3; j = j + 1) {
        let ty = y0 + j;
        let py = u32(clamp(ty, 0, i32(dims.in_height) - 1));
        let wy = lanczos3(sy - f32(ty));
        for (var i: i32 = -2; i <= 3; i = i + 1) {
            let tx = x0 + i;
            let px = u32(clamp(tx, 0, i32(dims.in_width) - 1));
            let w = wy * lanczos3(sx - f32(tx));
            sum += unpack_px(input_img[py * dims.in_width + px]) * w;
            wsum += w;
        }
    }
    output_img[gid.y * dims.out_width + gid.x] = pack_px(sum / max(wsum, 1e-6));
}
"#;

pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    dims_buffer: wgpu::Buffer,
    output_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    target: Size,
    // Recreated only when the incoming frame size changes.
    input: Option<(Size, wgpu::Buffer, wgpu::BindGroup)>,
    // Scratch for compacting strided rows before upload.
    upload: Vec<u8>,
}

impl GpuRenderer {
    /// Acquire an adapter and build the session pipeline. `None`-adapter
    /// hosts (headless boxes, denied GPU access) get a clean error that the
    /// selection policy maps to "use the CPU strategy".
    pub async fn new(target: Size) -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::render("gpu", "no suitable GPU adapter found"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("smallpixel upscale device"),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| EngineError::render("gpu", format!("device request failed: {e}")))?;

        debug!(adapter = %adapter.get_info().name, "GPU upscaler initialized");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lanczos3 upscale shader"),
            source: wgpu::ShaderSource::Wgsl(LANCZOS3_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("upscale bind group layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("upscale pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("upscale pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: Default::default(),
            cache: None,
        });

        let out_bytes = (target.w as u64) * (target.h as u64) * 4;
        let dims_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dimensions buffer"),
            contents: bytemuck::cast_slice(&[0u32, 0, target.w, target.h]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output buffer"),
            size: out_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: out_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            dims_buffer,
            output_buffer,
            readback_buffer,
            target,
            input: None,
            upload: Vec::new(),
        })
    }

    fn ensure_input(&mut self, size: Size) {
        let needs_new = match &self.input {
            Some((cur, _, _)) => *cur != size,
            None => true,
        };
        if !needs_new {
            return;
        }
        let input_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("input buffer"),
            size: (size.w as u64) * (size.h as u64) * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("upscale bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.dims_buffer.as_entire_binding(),
                },
            ],
        });
        let dims = [size.w, size.h, self.target.w, self.target.h];
        self.queue
            .write_buffer(&self.dims_buffer, 0, bytemuck::cast_slice(&dims));
        self.input = Some((size, input_buffer, bind_group));
    }

}

impl FrameRenderer for GpuRenderer {
    fn strategy(&self) -> Strategy {
        Strategy::Gpu
    }

    fn render(&mut self, frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame> {
        if target != self.target {
            return Err(EngineError::render(
                "gpu",
                "target size differs from the session this renderer was built for",
            ));
        }
        if !frame.is_well_formed() {
            return Err(EngineError::frame("short or zero-sized input frame"));
        }

        self.ensure_input(frame.size());
        let Some((_, input_buffer, bind_group)) = self.input.as_ref() else {
            return Err(EngineError::render("gpu", "input buffer missing"));
        };

        let row_bytes = frame.width as usize * 4;
        if frame.stride == row_bytes {
            self.queue.write_buffer(
                input_buffer,
                0,
                &frame.data[..row_bytes * frame.height as usize],
            );
        } else {
            self.upload.clear();
            self.upload.reserve(row_bytes * frame.height as usize);
            for row in 0..frame.height as usize {
                let start = row * frame.stride;
                self.upload
                    .extend_from_slice(&frame.data[start..start + row_bytes]);
            }
            self.queue.write_buffer(input_buffer, 0, &self.upload);
        }

        let out_bytes = (target.w as u64) * (target.h as u64) * 4;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("upscale encoder"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("upscale compute pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, bind_group, &[]);
            cpass.dispatch_workgroups(target.w.div_ceil(8), target.h.div_ceil(8), 1);
        }
        encoder.copy_buffer_to_buffer(&self.output_buffer, 0, &self.readback_buffer, 0, out_bytes);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.readback_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| EngineError::render("gpu", "device dropped during readback"))?
            .map_err(|e| EngineError::render("gpu", format!("readback map failed: {e}")))?;

        let data = slice.get_mapped_range().to_vec();
        self.readback_buffer.unmap();

        let mut out = VideoFrame::tightly_packed(data, target.w, target.h);
        out.pts_ns = frame.pts_ns;
        Ok(out)
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
