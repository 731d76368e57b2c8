//! Device and queue handles shared by the culling engines

use crate::error::{gpu_allocation_error, CullError, CullErrorContext, CullResult};
use std::sync::Arc;

/// Optional features the culling engines take advantage of when present
pub const OPTIONAL_FEATURES: wgpu::Features =
    wgpu::Features::MULTI_DRAW_INDIRECT.union(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT);

/// Backend sets tried in order by `request_headless`
const HEADLESS_BACKENDS: [wgpu::Backends; 2] = [wgpu::Backends::PRIMARY, wgpu::Backends::all()];

fn request_adapter(backends: wgpu::Backends) -> Option<wgpu::Adapter> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
}

/// Shared GPU handles plus the feature set the engines branch on
#[derive(Clone)]
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    features: wgpu::Features,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let features = device.features();
        Self {
            device,
            queue,
            features,
        }
    }

    /// Create a device without a surface (tests and the headless binary).
    /// Vulkan, Metal and DX12 adapters are preferred over GL.
    pub fn request_headless(label: &str) -> CullResult<Self> {
        let adapter = HEADLESS_BACKENDS
            .into_iter()
            .find_map(request_adapter)
            .ok_or_else(|| gpu_allocation_error(label, "no compatible adapter"))?;

        let info = adapter.get_info();
        log::info!(
            "[GpuContext] Using adapter {} ({:?})",
            info.name,
            info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: adapter.features() & OPTIONAL_FEATURES,
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .gpu_context(label)?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// `multi_draw_indexed_indirect_count` is available
    pub fn supports_indirect_count(&self) -> bool {
        self.features.contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT)
    }

    /// `multi_draw_indexed_indirect` is available
    pub fn supports_multi_draw(&self) -> bool {
        self.features.contains(wgpu::Features::MULTI_DRAW_INDIRECT)
    }

    /// Run a resource constructor inside OOM and validation error scopes
    pub fn checked<T>(&self, resource: &str, create: impl FnOnce(&wgpu::Device) -> T) -> CullResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let value = create(&self.device);

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match out_of_memory.or(validation) {
            Some(error) => {
                log::error!("[GpuContext] Failed to create {}: {}", resource, error);
                Err(gpu_allocation_error(resource, error))
            }
            None => Ok(value),
        }
    }

    pub fn create_buffer(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
        usage: wgpu::BufferUsages,
    ) -> CullResult<wgpu::Buffer> {
        self.checked(label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        })
    }

    /// Compile a WGSL module, reporting validation failures as shader errors
    pub fn create_shader(&self, label: &str, source: &str) -> CullResult<wgpu::ShaderModule> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(CullError::ShaderCompilation {
                shader: label.to_string(),
                error: error.to_string(),
            }),
            None => Ok(module),
        }
    }

    /// Compute pipeline with an explicit layout and a `main` entry point
    pub fn create_compute_pipeline(
        &self,
        label: &str,
        module: &wgpu::ShaderModule,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> CullResult<wgpu::ComputePipeline> {
        self.checked(label, |device| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts,
                push_constant_ranges: &[],
            });

            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module,
                entry_point: "main",
            })
        })
    }
}
