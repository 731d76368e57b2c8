/// Headless culling test
///
/// Drives a few frames of the full culling pipeline without a window: a depth
/// wall, a grid of objects in front of and behind it, and a row of populated
/// regions. Prints what was culled.

use anyhow::{Context, Result};
use cgmath::{Deg, Point3};
use earth_cull::hiz::depth_for_distance;
use earth_cull::{
    Aabb, Bounds, CullView, CullingConfig, CullingContext, DepthInput, GpuContext, ObjectHandle, ObjectKind,
    RegionId, RenderPass, SectionGeometry,
};
use std::time::{Duration, Instant};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;
const WALL_DISTANCE: f32 = 40.0;
const GRID: i32 = 16;
const FRAMES: u32 = 10;

fn main() -> Result<()> {
    env_logger::init();

    println!("Headless Culling Test");
    println!("=====================\n");

    let config = match std::env::args().nth(1) {
        Some(path) => CullingConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => CullingConfig::default(),
    };
    let gpu = GpuContext::request_headless("Headless Cull Device").context("no GPU adapter available")?;
    println!(
        "Indirect count: {}, multi draw: {}",
        gpu.supports_indirect_count(),
        gpu.supports_multi_draw()
    );

    let mut context = CullingContext::new(gpu.clone(), config.clone())?;

    let depth = create_depth_texture(&gpu);
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    clear_depth(
        &gpu,
        &depth_view,
        depth_for_distance(WALL_DISTANCE, NEAR, FAR, config.depth_convention),
    );

    let handles = object_grid();
    populate_regions(&mut context)?;

    let view = CullView::look_at(
        Point3::new(0.0, 8.0, 0.0),
        Point3::new(0.0, 8.0, -1.0),
        Deg(70.0),
        NEAR,
        FAR,
        (WIDTH, HEIGHT),
    );

    let start = Instant::now();
    for _ in 0..FRAMES {
        let visibility = context.visibility_mut()?;
        for (handle, bounds) in &handles {
            visibility.submit(*handle, ObjectKind::Transient, *bounds);
        }

        context.begin_frame(view, Duration::from_millis(16));
        let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Headless Frame Encoder"),
        });
        let input = DepthInput {
            view: &depth_view,
            width: WIDTH,
            height: HEIGHT,
        };
        context.record_frame(&mut encoder, Some(input))?;
        gpu.queue().submit(Some(encoder.finish()));
        context.end_frame()?;
        gpu.device().poll(wgpu::Maintain::Wait);
    }
    let elapsed = start.elapsed();

    let visible = handles.iter().filter(|(handle, _)| context.is_visible(*handle)).count();
    let stats = context.stats();

    println!("Frames: {}", FRAMES);
    println!("Time per frame: {:.2}ms", elapsed.as_secs_f64() * 1000.0 / FRAMES as f64);
    println!("Objects: {} submitted, {} visible", handles.len(), visible);
    println!(
        "Visibility buffers: {} slots tracked, capacity {}, {} readbacks pending, {} skipped",
        stats.visibility.tracked,
        stats.visibility.capacity,
        stats.visibility.pending_readbacks,
        stats.visibility.skipped_readbacks
    );
    println!(
        "Regions: {} ({} active), draws solid/cutout/translucent = {:?}, overflow {}",
        stats.regions.regions, stats.regions.active_regions, stats.regions.commands, stats.regions.overflow
    );

    context.teardown();
    Ok(())
}

/// Boxes on a grid from 10 to 160 units ahead; the wall hides everything past 40
fn object_grid() -> Vec<(ObjectHandle, Bounds)> {
    let mut objects = Vec::new();
    for row in 0..GRID {
        for column in 0..GRID {
            let x = (column - GRID / 2) as f32 * 4.0;
            let z = -10.0 - row as f32 * 10.0;
            let bounds = Bounds::Bounded(Aabb::new(Point3::new(x - 0.5, 7.5, z - 0.5), Point3::new(x + 0.5, 8.5, z + 0.5)));
            objects.push((ObjectHandle((row * GRID + column) as u64), bounds));
        }
    }
    objects
}

fn populate_regions(context: &mut CullingContext) -> Result<()> {
    let regions = context.regions_mut()?;
    let mut geometry = SectionGeometry::default();
    geometry.pass_mut(RenderPass::Solid).facing_quads = [8; 6];

    for x in -2..2 {
        for z in -3..1 {
            let id = RegionId::new(x, 0, z);
            regions.add_region(id, id.origin());
            for index in 0..64 {
                geometry.pass_mut(RenderPass::Solid).base_vertex = index as i32 * 192;
                regions.update_section(id, index, &geometry);
            }
        }
    }
    Ok(())
}

fn create_depth_texture(gpu: &GpuContext) -> wgpu::Texture {
    gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Headless Depth Texture"),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
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

fn clear_depth(gpu: &GpuContext, view: &wgpu::TextureView, depth: f32) {
    let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Headless Depth Clear"),
    });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Headless Depth Clear Pass"),
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
