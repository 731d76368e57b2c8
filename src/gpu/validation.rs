//! Compile-time and runtime validation for GPU struct layouts

use crate::gpu::layouts::*;

/// Compile-time size check for a GPU struct
///
/// Usage: `validate_gpu_size!(GpuAabb, 32);`
#[macro_export]
macro_rules! validate_gpu_size {
    ($type:ty, $size:expr) => {
        const _: () = assert!(
            std::mem::size_of::<$type>() == $size,
            concat!("GPU layout of ", stringify!($type), " does not match its WGSL declaration")
        );
    };
}

validate_gpu_size!(GpuCullView, 208);
validate_gpu_size!(GpuAabb, 32);
validate_gpu_size!(VisibilityParams, 16);
validate_gpu_size!(GpuRegion, 64);
validate_gpu_size!(GpuSectionPass, 32);
validate_gpu_size!(GpuSection, 96);
validate_gpu_size!(RegionCullParams, 16);
validate_gpu_size!(DrawIndexedIndirectArgs, 20);
validate_gpu_size!(PyramidParams, 32);

/// Log the layout of every shared struct (debug builds only)
#[cfg(debug_assertions)]
pub fn log_gpu_layouts() {
    fn entry<T>() {
        log::debug!(
            "[GPU Validation] {} = {} bytes (align {})",
            std::any::type_name::<T>(),
            std::mem::size_of::<T>(),
            std::mem::align_of::<T>()
        );
    }

    entry::<GpuCullView>();
    entry::<GpuAabb>();
    entry::<GpuRegion>();
    entry::<GpuSection>();
    entry::<DrawIndexedIndirectArgs>();
}

/// Runtime size checker for structs uploaded as uniforms
pub fn check_uniform_size<T>() -> Result<(), String> {
    let size = std::mem::size_of::<T>();
    if size % 16 != 0 {
        Err(format!(
            "Uniform {} is {} bytes; uniform blocks must be a multiple of 16",
            std::any::type_name::<T>(),
            size
        ))
    } else {
        Ok(())
    }
}
