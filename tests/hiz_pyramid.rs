//! Depth pyramid GPU tests
//!
//! Builds the pyramid from a cleared depth buffer and reads the levels back.

mod common;

use common::{clear_depth, create_depth_texture, init_gpu, read_r32_texture, FAR, HEIGHT, NEAR, WIDTH};
use earth_cull::hiz::{depth_for_distance, level_extents};
use earth_cull::{CullingConfig, DepthConvention, DepthInput, DepthPyramid};

const TOLERANCE: f32 = 0.05;

fn build_pyramid(convention: DepthConvention, distance: f32) {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let config = CullingConfig {
        depth_convention: convention,
        ..Default::default()
    };
    let mut pyramid = DepthPyramid::new(&gpu, &config).expect("create pyramid");
    assert!(!pyramid.is_built());

    let depth = create_depth_texture(&gpu, WIDTH, HEIGHT);
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    clear_depth(&gpu, &depth_view, depth_for_distance(distance, NEAR, FAR, convention));

    let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Pyramid Test Encoder"),
    });
    let input = DepthInput {
        view: &depth_view,
        width: WIDTH,
        height: HEIGHT,
    };
    pyramid.build(&mut encoder, &input, NEAR, FAR).expect("build pyramid");
    gpu.queue().submit(Some(encoder.finish()));

    assert!(pyramid.is_built());
    assert_eq!(pyramid.extent(), (WIDTH, HEIGHT));

    for (level, &(w, h)) in level_extents(WIDTH, HEIGHT).iter().enumerate() {
        assert_eq!(pyramid.level_extent(level), Some((w, h)));

        let texture = pyramid.level_texture(level).expect("level texture");
        let texels = read_r32_texture(&gpu, texture, w, h);
        assert_eq!(texels.len(), (w * h) as usize);
        for (i, value) in texels.iter().enumerate() {
            assert!(
                (value - distance).abs() < distance * TOLERANCE,
                "level {} texel {} = {}, expected ~{}",
                level,
                i,
                value,
                distance
            );
        }
    }
}

#[test]
fn test_pyramid_levels_hold_linear_distance() {
    build_pyramid(DepthConvention::Standard, 20.0);
}

#[test]
fn test_reversed_depth_linearizes_to_same_distance() {
    build_pyramid(DepthConvention::Reversed, 20.0);
}

#[test]
fn test_pyramid_reallocates_on_resize() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut pyramid = DepthPyramid::new(&gpu, &CullingConfig::default()).expect("create pyramid");
    let start_generation = pyramid.generation();

    for (width, height) in [(WIDTH, HEIGHT), (WIDTH, HEIGHT), (64, 48)] {
        let depth = create_depth_texture(&gpu, width, height);
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pyramid Resize Encoder"),
        });
        let input = DepthInput {
            view: &depth_view,
            width,
            height,
        };
        pyramid.build(&mut encoder, &input, NEAR, FAR).expect("build pyramid");
        gpu.queue().submit(Some(encoder.finish()));
        assert_eq!(pyramid.extent(), (width, height));
    }

    // Two distinct sizes, two reallocations; the repeated size reuses textures
    assert_eq!(pyramid.generation(), start_generation + 2);
    assert_eq!(pyramid.level_extent(7), Some((1, 1)));
}
