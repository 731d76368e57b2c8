//! Object visibility GPU tests
//!
//! A full-screen depth wall 20 units in front of the camera: objects in front
//! of it stay visible, objects behind it are occluded after the readback
//! delay, and objects behind the camera are frustum culled.

mod common;

use cgmath::Point3;
use common::{
    camera, clear_depth, create_depth_texture, init_gpu, run_frame, run_frame_with_dt, FAR, HEIGHT, NEAR, WIDTH,
};
use std::time::Duration;
use earth_cull::hiz::depth_for_distance;
use earth_cull::{Aabb, Bounds, Cullable, CullingConfig, CullingContext, DepthConvention, DepthInput, ObjectHandle, ObjectKind};

const FRAMES: usize = 8;
const WALL_DISTANCE: f32 = 20.0;

fn cube(center: Point3<f32>, half: f32) -> Bounds {
    Bounds::Bounded(Aabb::new(
        Point3::new(center.x - half, center.y - half, center.z - half),
        Point3::new(center.x + half, center.y + half, center.z + half),
    ))
}

struct ItemFrame {
    bounds: Bounds,
}

impl Cullable for ItemFrame {
    fn cull_bounds(&self) -> Bounds {
        self.bounds
    }

    fn cull_type(&self) -> &str {
        "item_frame"
    }
}

#[test]
fn test_occluded_and_visible_objects() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let config = CullingConfig {
        excluded_types: vec!["item_frame".to_string()],
        ..Default::default()
    };
    let mut context = CullingContext::new(gpu.clone(), config).expect("create context");

    let depth = create_depth_texture(&gpu, WIDTH, HEIGHT);
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    clear_depth(
        &gpu,
        &depth_view,
        depth_for_distance(WALL_DISTANCE, NEAR, FAR, DepthConvention::Standard),
    );

    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let front = ObjectHandle(1);
    let behind_wall = ObjectHandle(2);
    let behind_camera = ObjectHandle(3);
    let excluded = ObjectHandle(4);
    let never_tested = ObjectHandle(5);
    let excluded_object = ItemFrame {
        bounds: cube(Point3::new(0.0, 0.0, -60.0), 1.0),
    };

    for _ in 0..FRAMES {
        let visibility = context.visibility_mut().expect("live context");
        visibility.submit(front, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, -10.0), 1.0));
        visibility.submit(behind_wall, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, -50.0), 1.0));
        visibility.submit(behind_camera, ObjectKind::Persistent, cube(Point3::new(0.0, 0.0, 30.0), 1.0));
        visibility.submit_object(excluded, ObjectKind::Persistent, &excluded_object);

        let input = DepthInput {
            view: &depth_view,
            width: WIDTH,
            height: HEIGHT,
        };
        run_frame(&mut context, view, Some(input));
    }

    assert!(context.is_visible(front), "object in front of the wall must be visible");
    assert!(!context.is_visible(behind_wall), "object behind the wall must be occluded");
    assert!(!context.is_visible(behind_camera), "object behind the camera must be culled");
    assert!(context.is_visible(excluded), "excluded types are never culled");
    assert!(context.is_visible(never_tested), "unknown handles fail open");

    let stats = context.stats();
    assert!(stats.hiz_built);
    assert_eq!(stats.visibility.tracked, 3);
    assert_eq!(stats.visibility.visible, 1);
}

#[test]
fn test_frustum_only_without_depth() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut context = CullingContext::new(gpu, CullingConfig::default()).expect("create context");
    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let far_ahead = ObjectHandle(10);
    let behind = ObjectHandle(11);

    for _ in 0..FRAMES {
        let visibility = context.visibility_mut().expect("live context");
        visibility.submit(far_ahead, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, -500.0), 2.0));
        visibility.submit(behind, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, 50.0), 2.0));
        run_frame(&mut context, view, None);
    }

    assert!(context.is_visible(far_ahead));
    assert!(!context.is_visible(behind));
    assert!(!context.stats().hiz_built);
}

#[test]
fn test_disabled_culling_reports_everything_visible() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let config = CullingConfig {
        enabled: false,
        ..Default::default()
    };
    let mut context = CullingContext::new(gpu, config).expect("create context");
    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let behind = ObjectHandle(20);

    for _ in 0..FRAMES {
        context
            .visibility_mut()
            .expect("live context")
            .submit(behind, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, 50.0), 1.0));
        run_frame(&mut context, view, None);
    }

    assert!(context.is_visible(behind));
    assert_eq!(context.stats().visibility.tracked, 0);
}

#[test]
fn test_idle_objects_are_evicted() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let config = CullingConfig {
        transient_idle_ticks: 2,
        ..Default::default()
    };
    let mut context = CullingContext::new(gpu, config).expect("create context");
    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let handle = ObjectHandle(30);

    context
        .visibility_mut()
        .expect("live context")
        .submit(handle, ObjectKind::Transient, cube(Point3::new(0.0, 0.0, 50.0), 1.0));
    for _ in 0..FRAMES {
        run_frame(&mut context, view, None);
    }

    let visibility = context.visibility().expect("live context");
    assert!(!visibility.registry().contains(handle));
    assert!(context.is_visible(handle));
}

#[test]
fn test_capacity_grows_past_64_and_shrinks_when_idle() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut context = CullingContext::new(gpu, CullingConfig::default()).expect("create context");
    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let handles: Vec<ObjectHandle> = (0..200).map(ObjectHandle).collect();
    assert_eq!(context.visibility().expect("live context").capacity(), 64);

    for _ in 0..4 {
        let visibility = context.visibility_mut().expect("live context");
        for (i, handle) in handles.iter().enumerate() {
            let x = (i % 20) as f32 * 0.4 - 4.0;
            visibility.submit(*handle, ObjectKind::Persistent, cube(Point3::new(x, 0.0, -10.0), 0.1));
        }
        run_frame(&mut context, view, None);
    }

    assert_eq!(context.visibility().expect("live context").capacity(), 256);
    assert_eq!(context.stats().visibility.capacity, 256);
    assert_eq!(context.stats().visibility.tracked, 200);
    assert!(handles.iter().all(|handle| context.is_visible(*handle)));

    // Drop to 4 live slots, well under a quarter of 256
    let visibility = context.visibility_mut().expect("live context");
    for handle in &handles[4..] {
        visibility.forget(*handle);
    }
    for _ in 0..4 {
        let visibility = context.visibility_mut().expect("live context");
        for handle in &handles[..4] {
            visibility.submit(*handle, ObjectKind::Persistent, cube(Point3::new(0.0, 0.0, 50.0), 0.5));
        }
        run_frame(&mut context, view, None);
    }

    let visibility = context.visibility().expect("live context");
    assert_eq!(visibility.capacity(), 64);
    assert_eq!(visibility.registry().high_water(), 4);
    // Objects moved behind the camera after the shrink are still tested
    assert!(handles[..4].iter().all(|handle| !context.is_visible(*handle)));
}

#[test]
fn test_committed_set_is_stable_for_a_static_scene() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut context = CullingContext::new(gpu.clone(), CullingConfig::default()).expect("create context");
    let depth = create_depth_texture(&gpu, WIDTH, HEIGHT);
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    clear_depth(
        &gpu,
        &depth_view,
        depth_for_distance(WALL_DISTANCE, NEAR, FAR, DepthConvention::Standard),
    );

    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));
    let placements: Vec<(ObjectHandle, Point3<f32>)> = (0..40)
        .map(|i| {
            let x = (i % 20) as f32 * 0.4 - 4.0;
            let z = if i < 20 { -10.0 } else { -50.0 };
            (ObjectHandle(100 + i), Point3::new(x, 0.0, z))
        })
        .collect();

    let mut committed = Vec::new();
    for _ in 0..FRAMES {
        let visibility = context.visibility_mut().expect("live context");
        for (handle, center) in &placements {
            visibility.submit(*handle, ObjectKind::Transient, cube(*center, 0.1));
        }
        let input = DepthInput {
            view: &depth_view,
            width: WIDTH,
            height: HEIGHT,
        };
        run_frame(&mut context, view, Some(input));

        let set: Vec<bool> = placements.iter().map(|(handle, _)| context.is_visible(*handle)).collect();
        committed.push(set);
    }

    let expected: Vec<bool> = (0..40).map(|i| i < 20).collect();
    for set in &committed[4..] {
        assert_eq!(set, &expected);
    }
    assert_eq!(context.stats().visibility.visible, 20);
}

#[test]
fn test_readback_delay_follows_frame_rate() {
    let Some(gpu) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let config = CullingConfig::default();
    let mut context = CullingContext::new(gpu, config.clone()).expect("create context");
    let view = camera(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0));

    run_frame_with_dt(&mut context, view, None, Duration::from_millis(4));
    let fast = context.visibility().expect("live context").readback_delay();
    assert_eq!(fast, config.readback_delay(context.fps()));
    assert_eq!(fast, config.readback_delay_ticks + config.high_fps_extra_delay);

    run_frame_with_dt(&mut context, view, None, Duration::from_millis(16));
    let normal = context.visibility().expect("live context").readback_delay();
    assert_eq!(normal, config.readback_delay_ticks);
}
