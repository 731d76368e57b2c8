//! Macros for compute bind groups and layouts
//!
//! Every culling binding is compute-only, so the layout macro fixes the
//! shader stage and only varies the resource type.

/// Create a bind group with minimal boilerplate
///
/// ```ignore
/// let bind_group = create_bind_group!(
///     device,
///     "Visibility Bind Group",
///     &layout,
///     0 => view_buffer.as_entire_binding(),
///     1 => bounds_buffer.as_entire_binding(),
/// );
/// ```
#[macro_export]
macro_rules! create_bind_group {
    ($device:expr, $label:expr, $layout:expr, $($binding:expr => $resource:expr),+ $(,)?) => {
        $device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some($label),
            layout: $layout,
            entries: &[
                $(
                    wgpu::BindGroupEntry {
                        binding: $binding,
                        resource: $resource,
                    },
                )+
            ],
        })
    };
}

/// Create a compute-stage bind group layout
///
/// ```ignore
/// let layout = create_bind_group_layout!(
///     device,
///     "Region Cull Layout",
///     0 => buffer(uniform),
///     1 => buffer(storage_read),
///     2 => buffer(storage),
///     3 => texture(unfilterable),
///     4 => storage_texture(r32float),
/// );
/// ```
#[macro_export]
macro_rules! create_bind_group_layout {
    ($device:expr, $label:expr, $($binding:expr => $resource_type:ident($($args:tt)*)),+ $(,)?) => {
        $device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some($label),
            entries: &[
                $(
                    wgpu::BindGroupLayoutEntry {
                        binding: $binding,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: $crate::create_bind_group_layout!(@resource_type $resource_type($($args)*)),
                        count: None,
                    },
                )+
            ],
        })
    };

    (@resource_type buffer(storage)) => {
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    };

    (@resource_type buffer(storage_read)) => {
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    };

    (@resource_type buffer(uniform)) => {
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    };

    // R32Float levels and the Depth32Float source are read with textureLoad only
    (@resource_type texture(unfilterable)) => {
        wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        }
    };

    (@resource_type storage_texture(r32float)) => {
        wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::R32Float,
            view_dimension: wgpu::TextureViewDimension::D2,
        }
    };
}
