use crate::error::{RenderError, Result};
use crate::types::GpuPowerPreference;

/// Summary of the adapter backing a context, kept for logging.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

/// Device and queue for offscreen rendering.
///
/// Cloning is cheap and shares the underlying device, which is how a
/// throwaway surface borrows the registry's context instead of acquiring a
/// new adapter.
#[derive(Clone)]
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    profile: AdapterProfile,
}

impl GpuContext {
    /// Acquires a headless adapter and device.
    ///
    /// Falls back to a software adapter when no hardware adapter matches the
    /// requested power preference.
    pub fn headless(power: GpuPowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let power_preference = match power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = match pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        )) {
            Ok(adapter) => adapter,
            Err(err) => {
                tracing::warn!(error = %err, "no hardware adapter; trying fallback adapter");
                pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                }))
                .map_err(|err| RenderError::Context(format!("no suitable GPU adapter: {err}")))?
            }
        };

        let info = adapter.get_info();
        let limits = adapter.limits();
        let profile = AdapterProfile::from_wgpu(&info, &limits);
        tracing::debug!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("reel device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(limits),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| RenderError::Context(format!("failed to create GPU device: {err}")))?;

        Ok(Self {
            device,
            queue,
            profile,
        })
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    /// Rejects sizes the device cannot allocate.
    pub(crate) fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        let max = self.profile.max_texture_dimension;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "render size must be non-zero, got {width}x{height}"
            )));
        }
        if width > max || height > max {
            return Err(RenderError::InvalidConfig(format!(
                "GPU max texture dimension is {max}, requested {width}x{height}"
            )));
        }
        Ok(())
    }

    /// Blocks until all submitted work has finished.
    pub(crate) fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| RenderError::Readback(format!("device poll failed: {err}")))
    }
}
