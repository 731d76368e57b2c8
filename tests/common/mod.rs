//! Shared helpers for the GPU integration tests

#![allow(dead_code)]

use cgmath::{Deg, Point3};
use earth_cull::{CullView, CullingConfig, CullingContext, DepthInput, GpuContext};
use std::time::Duration;

pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 1000.0;
pub const WIDTH: u32 = 300;
pub const HEIGHT: u32 = 200;

/// Initialize GPU context for tests. Adapters that cannot build the culling
/// pipelines are treated like a missing GPU.
pub fn init_gpu() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let gpu = GpuContext::request_headless("Cull Test Device").ok()?;
    match CullingContext::new(gpu.clone(), CullingConfig::default()) {
        Ok(_) => Some(gpu),
        Err(e) => {
            eprintln!("Adapter cannot build culling pipelines: {}", e);
            None
        }
    }
}

/// Camera at `eye` looking at `target` with the shared test projection
pub fn camera(eye: Point3<f32>, target: Point3<f32>) -> CullView {
    CullView::look_at(eye, target, Deg(70.0), NEAR, FAR, (WIDTH, HEIGHT))
}

pub fn create_depth_texture(gpu: &GpuContext, width: u32, height: u32) -> wgpu::Texture {
    gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

/// Fill the whole depth texture with one raw depth value
pub fn clear_depth(gpu: &GpuContext, view: &wgpu::TextureView, depth: f32) {
    let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Depth Clear"),
    });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Depth Clear Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    gpu.queue().submit(Some(encoder.finish()));
}

/// Record, submit and finish one culling frame, then wait for the GPU so
/// map callbacks have fired before the next frame
pub fn run_frame(context: &mut CullingContext, view: CullView, depth: Option<DepthInput>) {
    run_frame_with_dt(context, view, depth, Duration::from_millis(16));
}

/// `run_frame` with an explicit previous-frame duration
pub fn run_frame_with_dt(context: &mut CullingContext, view: CullView, depth: Option<DepthInput>, frame_dt: Duration) {
    let gpu = context.gpu().clone();
    context.begin_frame(view, frame_dt);

    let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Frame Encoder"),
    });
    context.record_frame(&mut encoder, depth).expect("record frame");
    gpu.queue().submit(Some(encoder.finish()));
    context.end_frame().expect("end frame");

    gpu.device().poll(wgpu::Maintain::Wait);
}

/// Copy one R32Float texture to the CPU, dropping row padding
pub fn read_r32_texture(gpu: &GpuContext, texture: &wgpu::Texture, width: u32, height: u32) -> Vec<f32> {
    let unpadded = width * 4;
    let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Texture Readback"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Texture Copy"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue().submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.expect("map texture readback"));
    gpu.device().poll(wgpu::Maintain::Wait);

    let data = slice.get_mapped_range();
    let mut texels = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        let bytes = &data[start..start + unpadded as usize];
        texels.extend_from_slice(bytemuck::cast_slice::<u8, f32>(bytes));
    }
    drop(data);
    buffer.unmap();
    texels
}
