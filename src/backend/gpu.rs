//! wgpu device layer
//!
//! Owns the instance, device and queue used for compute. Buffers readable by
//! the host carry a persistent staging buffer so read-back never allocates.
//! Device errors are caught with error scopes and turned into [`LifeError`]s
//! instead of reaching wgpu's default panicking handler.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::{BufferUsage, ComputeBackend, KernelArgs};
use crate::error::{LifeError, Result};
use crate::kernel::WORKGROUP_SIZE;

pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    staging: Option<wgpu::Buffer>,
}

pub struct GpuProgram {
    pipeline: Arc<wgpu::ComputePipeline>,
    layout: wgpu::BindGroupLayout,
    _module: wgpu::ShaderModule,
}

pub struct GpuKernel {
    label: String,
    bind_group: wgpu::BindGroup,
    pipeline: Arc<wgpu::ComputePipeline>,
}

/// Compute device backed by wgpu
pub struct GpuBackend {
    // Dropped in declaration order: queue before device.
    queue: wgpu::Queue,
    device: wgpu::Device,
    adapter_info: wgpu::AdapterInfo,
    _instance: wgpu::Instance,
}

impl GpuBackend {
    /// Picks an adapter and opens a device on it
    ///
    /// Hardware adapters are preferred; when none is present the software
    /// fallback adapter is tried before giving up.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) => {
                log::warn!("No hardware adapter ({}), trying the fallback adapter", e);
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::default(),
                        compatible_surface: None,
                        force_fallback_adapter: true,
                    })
                    .await
                    .map_err(|e| LifeError::PlatformUnavailable(e.to_string()))?
            }
        };

        let adapter_info = adapter.get_info();
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(LifeError::PlatformUnavailable(format!(
                "{} does not support compute shaders",
                adapter_info.name
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gridlife compute device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| LifeError::PlatformUnavailable(e.to_string()))?;

        log::info!(
            "Compute adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            queue,
            device,
            adapter_info,
            _instance: instance,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn check_size(&self, label: &str, usage: BufferUsage, size: u64) -> Result<()> {
        let limits = self.device.limits();
        let max = match usage {
            BufferUsage::Cells | BufferUsage::Pixels => limits
                .max_buffer_size
                .min(limits.max_storage_buffer_binding_size as u64),
            BufferUsage::Scalar => limits.max_uniform_buffer_binding_size as u64,
        };
        if size > max {
            return Err(LifeError::allocation(
                label,
                size,
                format!("exceeds the device limit of {} bytes", max),
            ));
        }
        Ok(())
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

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn format_compilation_info(info: &wgpu::CompilationInfo) -> String {
    info.messages
        .iter()
        .map(|message| match &message.location {
            Some(location) => format!(
                "{}:{}: {:?}: {}",
                location.line_number, location.line_position, message.message_type, message.message
            ),
            None => format!("{:?}: {}", message.message_type, message.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ComputeBackend for GpuBackend {
    type Buffer = GpuBuffer;
    type Program = GpuProgram;
    type Kernel = GpuKernel;

    fn describe(&self) -> String {
        format!("{} ({:?})", self.adapter_info.name, self.adapter_info.backend)
    }

    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> Result<GpuBuffer> {
        let size = contents.len() as u64;
        self.check_size(label, usage, size)?;

        let flags = match usage {
            BufferUsage::Cells | BufferUsage::Pixels => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST
            }
            BufferUsage::Scalar => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: flags,
            });
        let staging = match usage {
            BufferUsage::Scalar => None,
            BufferUsage::Cells | BufferUsage::Pixels => {
                Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{} staging", label)),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }))
            }
        };
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(LifeError::allocation(label, size, error));
        }

        log::debug!("Allocated {} ({} bytes)", label, size);
        Ok(GpuBuffer { buffer, staging })
    }

    fn build_program(&self, source: &str, entry_point: &str) -> Result<GpuProgram> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Conway Compute Shader"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Conway Bind Group Layout"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, false),
                    storage_entry(2, false),
                    uniform_entry(3),
                    uniform_entry(4),
                    uniform_entry(5),
                ],
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Conway Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Conway Compute Pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        let info = pollster::block_on(module.get_compilation_info());
        let scope_error = pollster::block_on(self.device.pop_error_scope());

        let has_errors = info
            .messages
            .iter()
            .any(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error));
        if has_errors || scope_error.is_some() {
            let mut log = format_compilation_info(&info);
            if let Some(error) = scope_error {
                if !log.is_empty() {
                    log.push('\n');
                }
                log.push_str(&error.to_string());
            }
            return Err(LifeError::Compile { log });
        }

        if !info.messages.is_empty() {
            log::warn!("Kernel build messages:\n{}", format_compilation_info(&info));
        }
        log::info!("Built transition kernel `{}`", entry_point);

        Ok(GpuProgram {
            pipeline: Arc::new(pipeline),
            layout,
            _module: module,
        })
    }

    fn bind_kernel(
        &self,
        program: &GpuProgram,
        label: &str,
        args: KernelArgs<'_, GpuBuffer>,
    ) -> Result<GpuKernel> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &program.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: args.source.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: args.destination.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: args.pixels.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: args.worker_count.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: args.width.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: args.height.buffer.as_entire_binding(),
                },
            ],
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(LifeError::Dispatch(format!("binding {}: {}", label, error)));
        }

        Ok(GpuKernel {
            label: label.to_string(),
            bind_group,
            pipeline: Arc::clone(&program.pipeline),
        })
    }

    fn enqueue(&self, kernel: &GpuKernel, worker_count: u32) -> Result<()> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Conway Compute Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&kernel.label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&kernel.pipeline);
            compute_pass.set_bind_group(0, &kernel.bind_group, &[]);
            compute_pass.dispatch_workgroups(worker_count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(LifeError::Dispatch(format!("{}: {}", kernel.label, error)));
        }
        log::trace!("Enqueued {} over {} workers", kernel.label, worker_count);
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer, dst: &mut [u8]) -> Result<()> {
        let staging = buffer
            .staging
            .as_ref()
            .ok_or(LifeError::InvalidState("buffer is not readable by the host"))?;
        let size = buffer.buffer.size();
        if dst.len() as u64 != size {
            return Err(LifeError::Dispatch(format!(
                "read-back of {} bytes into a {} byte destination",
                size,
                dst.len()
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Conway Read-back Encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let polled = self.device.poll(wgpu::PollType::Wait);
        let scope_error = pollster::block_on(self.device.pop_error_scope());
        let mapped = futures::executor::block_on(rx);

        if let Some(error) = scope_error {
            if matches!(mapped, Ok(Ok(()))) {
                staging.unmap();
            }
            return Err(LifeError::Dispatch(format!("read-back: {}", error)));
        }
        polled.map_err(|e| LifeError::Dispatch(format!("device poll failed: {}", e)))?;

        match mapped {
            Ok(Ok(())) => {
                {
                    let view = slice.get_mapped_range();
                    dst.copy_from_slice(&view);
                }
                staging.unmap();
                Ok(())
            }
            Ok(Err(e)) => Err(LifeError::Dispatch(format!("mapping read-back: {}", e))),
            Err(_) => Err(LifeError::Dispatch(
                "read-back callback dropped before completion".to_string(),
            )),
        }
    }
}
