//! Compiled kernels bound to concrete resources.
//!
//! An [`Algorithm`] owns one parsed kernel plus the device objects that make
//! it dispatchable: pipeline, bind group, workgroup counts, push-constant
//! bytes, and pipeline-overridable constant values. Construction is detached
//! like [`Resource`]: parsing and binding validation run host-side against
//! the kernel's introspected interface, so mismatches surface as
//! [`SurgeError::Compile`] with the offending binding named instead of as
//! raw driver errors. The pipeline itself is built when a manager factory or
//! a recorded create-algorithm operation initializes the object.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::SurgeError;
use crate::gpu::binding;
use crate::gpu::context::ComputeContext;
use crate::kernel::{BindingKind, Kernel, KernelSource};
use crate::resource::{BindTarget, Resource, ResourceUsage};
use crate::util::{lock, next_label};

/// Validated build inputs, retained across destroy/initialize cycles.
#[derive(Clone)]
struct BuildParams {
    resources: Vec<Arc<Resource>>,
    workgroup: [u32; 3],
    spec_constants: Vec<f32>,
    push: Vec<u8>,
}

struct AlgoState {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    workgroup: [u32; 3],
    push: Vec<u8>,
}

/// A compute kernel compiled for a fixed set of resources.
///
/// Shared as `Arc<Algorithm>`; sequences recording a dispatch co-own it.
/// [`rebuild`](Algorithm::rebuild) swaps the bound resources and constants
/// in place, so every recorded reference picks up the new pipeline on its
/// next replay.
pub struct Algorithm {
    label: String,
    kernel: Kernel,
    params: Mutex<BuildParams>,
    inner: Mutex<Option<AlgoState>>,
    ctx: Mutex<Option<Arc<ComputeContext>>>,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Algorithm")
            .field("label", &self.label)
            .field("entry_point", &self.kernel.entry_point())
            .field("workgroup", &self.workgroup())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Algorithm {
    /// Parse `source` and validate it against `resources` without touching
    /// the device. `workgroup` is the dispatch grid in workgroups; `None`
    /// derives it from the first resource. `spec_constants` map positionally
    /// onto the kernel's pipeline-overridable constants. `push` seeds the
    /// push-constant block and may be empty to zero-fill it.
    ///
    /// The pipeline is built later, by a manager factory or by recording a
    /// create-algorithm operation.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Compile`] for malformed kernels and for any
    /// mismatch between the kernel interface and the supplied bindings or
    /// constants.
    pub fn new(
        source: &KernelSource<'_>,
        resources: Vec<Arc<Resource>>,
        workgroup: Option<[u32; 3]>,
        spec_constants: &[f32],
        push: &[u8],
    ) -> Result<Arc<Self>, SurgeError> {
        let kernel = Kernel::parse(source)?;
        let params =
            validate(&kernel, resources, workgroup, spec_constants, push)?;
        Ok(Arc::new(Self {
            label: next_label("algorithm"),
            kernel,
            params: Mutex::new(params),
            inner: Mutex::new(None),
            ctx: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }))
    }

    /// Debug label, also used in error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Dispatch grid in workgroups, after defaulting.
    #[must_use]
    pub fn workgroup(&self) -> [u32; 3] {
        lock(&self.params).workgroup
    }

    /// Size in bytes of the kernel's push-constant block.
    #[must_use]
    pub const fn push_constant_size(&self) -> u32 {
        self.kernel.push_constant_size()
    }

    /// Resources bound at the last build or rebuild, in binding order.
    #[must_use]
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        lock(&self.params).resources.clone()
    }

    /// `true` between pipeline build and destruction.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Replace the push-constant block. The value persists and is consumed
    /// by every subsequent dispatch until overwritten again. `values` is
    /// any `Pod` layout, typically one `#[repr(C)]` struct matching the
    /// kernel's block or a slice of scalars.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::SizeMismatch`] when the byte width differs
    /// from the kernel's block size, [`SurgeError::UseAfterDestroy`] after
    /// teardown.
    pub fn set_push_constants<T: bytemuck::Pod>(
        &self,
        values: &[T],
    ) -> Result<(), SurgeError> {
        self.set_push_bytes(bytemuck::cast_slice(values))
    }

    pub(crate) fn set_push_bytes(
        &self,
        bytes: &[u8],
    ) -> Result<(), SurgeError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(SurgeError::UseAfterDestroy(self.label.clone()));
        }
        let expected = self.kernel.push_constant_size() as usize;
        if bytes.len() != expected {
            return Err(SurgeError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        lock(&self.params).push = bytes.to_vec();
        if let Some(state) = lock(&self.inner).as_mut() {
            state.push = bytes.to_vec();
        }
        Ok(())
    }

    /// Re-validate against a new set of resources and constants and, if the
    /// pipeline was ever built, build the replacement immediately. The
    /// kernel itself is not re-parsed. Holders keep their reference;
    /// re-recording or replay dispatches the rebuilt pipeline. Also
    /// resurrects a destroyed algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Compile`] for any mismatch between the kernel
    /// interface and the new bindings or constants, or if the replacement
    /// pipeline fails device validation.
    pub fn rebuild(
        &self,
        resources: Vec<Arc<Resource>>,
        workgroup: Option<[u32; 3]>,
        spec_constants: &[f32],
        push: &[u8],
    ) -> Result<(), SurgeError> {
        let params = validate(
            &self.kernel,
            resources,
            workgroup,
            spec_constants,
            push,
        )?;
        let ctx = lock(&self.ctx).clone();
        match ctx {
            Some(ctx) => {
                let state = build_state(
                    &self.label,
                    &ctx,
                    &self.kernel,
                    &params,
                )?;
                *lock(&self.params) = params;
                *lock(&self.inner) = Some(state);
                self.destroyed.store(false, Ordering::Release);
                log::debug!("{}: pipeline rebuilt", self.label);
            }
            None => {
                *lock(&self.params) = params;
                self.destroyed.store(false, Ordering::Release);
            }
        }
        Ok(())
    }

    /// Drop the pipeline. Recorded dispatches that still reference this
    /// algorithm fail on replay until a rebuild or re-initialization.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::AlreadyDestroyed`] on a second teardown.
    pub fn destroy(&self) -> Result<(), SurgeError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(SurgeError::AlreadyDestroyed(self.label.clone()));
        }
        drop(lock(&self.inner).take());
        log::debug!("{}: pipeline released", self.label);
        Ok(())
    }

    /// Build the pipeline and bind group. Clears a prior destroy tombstone.
    pub(crate) fn initialize(
        &self,
        ctx: &Arc<ComputeContext>,
    ) -> Result<(), SurgeError> {
        if lock(&self.inner).is_some() {
            return Err(SurgeError::AlreadyInitialized(self.label.clone()));
        }
        let params = lock(&self.params).clone();
        let state = build_state(&self.label, ctx, &self.kernel, &params)?;
        log::debug!(
            "{}: pipeline built, entry '{}', workgroup {:?}",
            self.label,
            self.kernel.entry_point(),
            state.workgroup
        );
        *lock(&self.inner) = Some(state);
        *lock(&self.ctx) = Some(Arc::clone(ctx));
        self.destroyed.store(false, Ordering::Release);
        Ok(())
    }

    /// Encode one dispatch into an open compute pass. A push override, when
    /// given, is used for this dispatch only; its size was validated when
    /// the recording operation accepted it.
    pub(crate) fn encode_dispatch(
        &self,
        pass: &mut wgpu::ComputePass<'_>,
        push_override: Option<&[u8]>,
    ) -> Result<(), SurgeError> {
        let inner = lock(&self.inner);
        let Some(state) = inner.as_ref() else {
            return Err(self.uninit_error());
        };
        pass.set_pipeline(&state.pipeline);
        pass.set_bind_group(0, &state.bind_group, &[]);
        let push = push_override.unwrap_or(&state.push);
        if !push.is_empty() {
            pass.set_push_constants(0, push);
        }
        let [x, y, z] = state.workgroup;
        pass.dispatch_workgroups(x, y, z);
        Ok(())
    }

    fn uninit_error(&self) -> SurgeError {
        if self.destroyed.load(Ordering::Acquire) {
            SurgeError::UseAfterDestroy(self.label.clone())
        } else {
            SurgeError::InvalidState {
                expected: "a built algorithm",
                actual: "unbuilt",
            }
        }
    }
}

/// Host-side validation of one build request.
fn validate(
    kernel: &Kernel,
    resources: Vec<Arc<Resource>>,
    workgroup: Option<[u32; 3]>,
    spec_constants: &[f32],
    push: &[u8],
) -> Result<BuildParams, SurgeError> {
    check_resources(kernel, &resources)?;
    check_spec_constants(kernel, spec_constants)?;
    let workgroup = resolve_workgroup(workgroup, &resources)?;
    let push = normalize_push(push, kernel.push_constant_size())?;
    Ok(BuildParams {
        resources,
        workgroup,
        spec_constants: spec_constants.to_vec(),
        push,
    })
}

/// Device-side build of pipeline and bind group from validated params.
fn build_state(
    label: &str,
    ctx: &ComputeContext,
    kernel: &Kernel,
    params: &BuildParams,
) -> Result<AlgoState, SurgeError> {
    if kernel.push_constant_size() > ctx.max_push_constant_size() {
        return Err(SurgeError::Compile(format!(
            "kernel needs {} bytes of push constants, device supports {}",
            kernel.push_constant_size(),
            ctx.max_push_constant_size()
        )));
    }
    let targets = params
        .resources
        .iter()
        .map(|r| r.bind_target())
        .collect::<Result<Vec<_>, _>>()?;

    let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = kernel
        .bindings()
        .iter()
        .map(|decl| match decl.kind {
            BindingKind::StorageBuffer { read_only } => {
                binding::storage_buffer(decl.binding, read_only)
            }
            BindingKind::StorageTexture { format, access } => {
                binding::storage_texture(decl.binding, format, access)
            }
        })
        .collect();

    let constants: Vec<(&str, f64)> = kernel
        .override_keys()
        .iter()
        .map(String::as_str)
        .zip(params.spec_constants.iter().map(|v| f64::from(*v)))
        .collect();

    let (pipeline, bind_group) = ctx.validation_scope(|device| {
        let bind_layout = device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} Bind Layout")),
                entries: &layout_entries,
            },
        );
        let mut push_ranges = Vec::new();
        if kernel.push_constant_size() > 0 {
            push_ranges.push(wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: 0..kernel.push_constant_size(),
            });
        }
        let pipeline_layout = device.create_pipeline_layout(
            &wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label} Layout")),
                bind_group_layouts: &[&bind_layout],
                push_constant_ranges: &push_ranges,
            },
        );
        let module =
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(
                    kernel.ir().clone(),
                )),
            });
        let pipeline = device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(kernel.entry_point()),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    ..Default::default()
                },
                cache: None,
            },
        );

        let bind_entries: Vec<wgpu::BindGroupEntry> = kernel
            .bindings()
            .iter()
            .zip(&targets)
            .map(|(decl, target)| wgpu::BindGroupEntry {
                binding: decl.binding,
                resource: match target {
                    BindTarget::Buffer(buffer) => {
                        buffer.as_entire_binding()
                    }
                    BindTarget::Texture(view) => {
                        wgpu::BindingResource::TextureView(view)
                    }
                },
            })
            .collect();
        let bind_group =
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label} Bind Group")),
                layout: &bind_layout,
                entries: &bind_entries,
            });
        (pipeline, bind_group)
    })?;

    Ok(AlgoState {
        pipeline,
        bind_group,
        workgroup: params.workgroup,
        push: params.push.clone(),
    })
}

fn check_resources(
    kernel: &Kernel,
    resources: &[Arc<Resource>],
) -> Result<(), SurgeError> {
    let decls = kernel.bindings();
    if decls.len() != resources.len() {
        return Err(SurgeError::Compile(format!(
            "kernel declares {} bindings, {} resources supplied",
            decls.len(),
            resources.len()
        )));
    }
    for (decl, resource) in decls.iter().zip(resources) {
        match (&decl.kind, resource.usage()) {
            (
                BindingKind::StorageBuffer { .. },
                ResourceUsage::StorageBuffer,
            ) => {}
            (
                BindingKind::StorageTexture { format, .. },
                ResourceUsage::StorageImage,
            ) => {
                // layout() is Some for every image resource.
                if resource.layout().map(|l| l.format) != Some(*format) {
                    return Err(SurgeError::Compile(format!(
                        "binding {}: kernel expects {:?}, resource '{}' \
                         provides {:?}",
                        decl.binding,
                        format,
                        resource.label(),
                        resource.layout().map(|l| l.format)
                    )));
                }
            }
            (BindingKind::StorageBuffer { .. }, _) => {
                return Err(SurgeError::Compile(format!(
                    "binding {}: kernel expects a storage buffer, \
                     resource '{}' is an image",
                    decl.binding,
                    resource.label()
                )));
            }
            (BindingKind::StorageTexture { .. }, _) => {
                return Err(SurgeError::Compile(format!(
                    "binding {}: kernel expects a storage texture, \
                     resource '{}' is a buffer",
                    decl.binding,
                    resource.label()
                )));
            }
        }
    }
    Ok(())
}

fn check_spec_constants(
    kernel: &Kernel,
    values: &[f32],
) -> Result<(), SurgeError> {
    let keys = kernel.override_keys();
    if keys.len() != values.len() {
        return Err(SurgeError::Compile(format!(
            "kernel declares {} overridable constants, {} values supplied",
            keys.len(),
            values.len()
        )));
    }
    Ok(())
}

fn resolve_workgroup(
    requested: Option<[u32; 3]>,
    resources: &[Arc<Resource>],
) -> Result<[u32; 3], SurgeError> {
    match requested {
        Some(counts) => {
            if counts.contains(&0) {
                return Err(SurgeError::Compile(format!(
                    "workgroup counts must be non-zero, got {counts:?}"
                )));
            }
            Ok(counts)
        }
        None => Ok(resources.first().map_or([1, 1, 1], |first| {
            match first.layout() {
                Some(layout) => [layout.width, layout.height, 1],
                None => [first.size() as u32, 1, 1],
            }
        })),
    }
}

fn normalize_push(push: &[u8], size: u32) -> Result<Vec<u8>, SurgeError> {
    let size = size as usize;
    if push.is_empty() {
        return Ok(vec![0; size]);
    }
    if push.len() != size {
        return Err(SurgeError::Compile(format!(
            "push constant block is {size} bytes, {} supplied",
            push.len()
        )));
    }
    Ok(push.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BUFFERS: &str = "
        @group(0) @binding(0) var<storage, read> a: array<f32>;
        @group(0) @binding(1) var<storage, read_write> b: array<f32>;
        @compute @workgroup_size(1)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            b[id.x] = a[id.x];
        }
    ";

    const PUSH_SCALE: &str = "
        struct Push { scale: f32, bias: f32 }
        var<push_constant> push: Push;
        @group(0) @binding(0) var<storage, read_write> a: array<f32>;
        @compute @workgroup_size(1)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            a[id.x] = a[id.x] * push.scale + push.bias;
        }
    ";

    fn parse(wgsl: &str) -> Kernel {
        Kernel::parse(&KernelSource::Wgsl(wgsl.into())).unwrap()
    }

    #[test]
    fn test_resource_count_must_match_bindings() {
        let k = parse(TWO_BUFFERS);
        let a = Resource::tensor(&[1.0_f32]).unwrap();
        let err = check_resources(&k, &[a]).unwrap_err();
        assert!(matches!(err, SurgeError::Compile(_)), "got: {err}");
    }

    #[test]
    fn test_buffer_binding_rejects_image_resource() {
        let k = parse(TWO_BUFFERS);
        let a = Resource::tensor(&[1.0_f32]).unwrap();
        let img = Resource::image(&[1.0_f32], 1, 1, 1).unwrap();
        let err = check_resources(&k, &[a, img]).unwrap_err();
        match err {
            SurgeError::Compile(msg) => {
                assert!(msg.contains("binding 1"), "got: {msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_image_binding_checks_format() {
        let wgsl = "
            @group(0) @binding(0)
            var img: texture_storage_2d<rgba32float, write>;
            @compute @workgroup_size(1)
            fn main() {
                textureStore(img, vec2<i32>(0, 0), vec4<f32>(0.0));
            }
        ";
        let k = parse(wgsl);
        // Single-channel image where the kernel wants rgba32float.
        let img = Resource::image(&[1.0_f32], 1, 1, 1).unwrap();
        assert!(check_resources(&k, &[img]).is_err());
        let rgba = Resource::image(&[1.0_f32; 4], 1, 1, 4).unwrap();
        assert!(check_resources(&k, &[rgba]).is_ok());
    }

    #[test]
    fn test_spec_constant_count_must_match() {
        let wgsl = "
            override scale: f32 = 1.0;
            @group(0) @binding(0) var<storage, read_write> a: array<f32>;
            @compute @workgroup_size(1)
            fn main(@builtin(global_invocation_id) id: vec3<u32>) {
                a[id.x] = a[id.x] * scale;
            }
        ";
        let k = parse(wgsl);
        assert!(check_spec_constants(&k, &[2.0]).is_ok());
        assert!(check_spec_constants(&k, &[]).is_err());
        assert!(check_spec_constants(&k, &[2.0, 3.0]).is_err());
    }

    #[test]
    fn test_workgroup_defaults_follow_first_resource() {
        let tensor = Resource::tensor(&[0.0_f32; 12]).unwrap();
        let image = Resource::image(&[0.0_f32; 6], 3, 2, 1).unwrap();
        assert_eq!(
            resolve_workgroup(None, &[Arc::clone(&tensor)]).unwrap(),
            [12, 1, 1]
        );
        assert_eq!(
            resolve_workgroup(None, &[Arc::clone(&image), tensor]).unwrap(),
            [3, 2, 1]
        );
        assert_eq!(resolve_workgroup(None, &[]).unwrap(), [1, 1, 1]);
        assert_eq!(
            resolve_workgroup(Some([4, 5, 6]), &[image]).unwrap(),
            [4, 5, 6]
        );
        assert!(resolve_workgroup(Some([0, 1, 1]), &[]).is_err());
    }

    #[test]
    fn test_push_seed_is_normalized() {
        assert_eq!(normalize_push(&[], 8).unwrap(), vec![0; 8]);
        assert_eq!(
            normalize_push(&[1, 2, 3, 4], 4).unwrap(),
            vec![1, 2, 3, 4]
        );
        assert!(normalize_push(&[1, 2], 4).is_err());
        assert_eq!(normalize_push(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_detached_construction_is_device_free() {
        let a = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let b = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let algo = Algorithm::new(
            &KernelSource::Wgsl(TWO_BUFFERS.into()),
            vec![a, b],
            None,
            &[],
            &[],
        )
        .unwrap();
        assert!(!algo.is_initialized());
        assert_eq!(algo.workgroup(), [8, 1, 1]);
        assert_eq!(algo.push_constant_size(), 0);
        assert_eq!(algo.resources().len(), 2);
        let printed = format!("{algo:?}");
        assert!(printed.contains("algorithm-"), "got: {printed}");
    }

    #[test]
    fn test_push_updates_are_size_checked_before_build() {
        let a = Resource::tensor(&[0.0_f32; 4]).unwrap();
        let algo = Algorithm::new(
            &KernelSource::Wgsl(PUSH_SCALE.into()),
            vec![a],
            None,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(algo.push_constant_size(), 8);
        algo.set_push_constants(&[2.0_f32, 0.5]).unwrap();
        let err = algo.set_push_constants(&[2.0_f32]).unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 8, actual: 4 }),
            "got: {err}"
        );
    }

    #[test]
    fn test_rebuild_swaps_bindings_before_build() {
        let a = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let b = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let algo = Algorithm::new(
            &KernelSource::Wgsl(TWO_BUFFERS.into()),
            vec![Arc::clone(&a), Arc::clone(&b)],
            None,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(algo.workgroup(), [8, 1, 1]);

        // Unbuilt algorithms re-validate and store the new params only.
        let c = Resource::tensor(&[0.0_f32; 4]).unwrap();
        let d = Resource::tensor(&[0.0_f32; 4]).unwrap();
        algo.rebuild(vec![Arc::clone(&c), d], None, &[], &[]).unwrap();
        assert_eq!(algo.workgroup(), [4, 1, 1]);
        assert!(Arc::ptr_eq(&algo.resources()[0], &c));
        assert!(!algo.is_initialized());

        // A mismatched binding count is rejected without touching state.
        let err = algo.rebuild(vec![c], None, &[], &[]).unwrap_err();
        assert!(matches!(err, SurgeError::Compile(_)), "got: {err}");
        assert_eq!(algo.workgroup(), [4, 1, 1]);
    }

    #[test]
    fn test_rebuild_resurrects_a_destroyed_algorithm() {
        let a = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let b = Resource::tensor(&[0.0_f32; 8]).unwrap();
        let algo = Algorithm::new(
            &KernelSource::Wgsl(TWO_BUFFERS.into()),
            vec![Arc::clone(&a), Arc::clone(&b)],
            None,
            &[],
            &[],
        )
        .unwrap();
        algo.destroy().unwrap();
        assert!(matches!(
            algo.set_push_bytes(&[]),
            Err(SurgeError::UseAfterDestroy(_))
        ));

        // Rebuild clears the tombstone even before the first pipeline
        // build, so the algorithm is usable again.
        algo.rebuild(vec![a, b], None, &[], &[]).unwrap();
        algo.set_push_bytes(&[]).unwrap();
        assert!(!algo.is_initialized());
        algo.destroy().unwrap();
    }

    #[test]
    fn test_destroy_before_build_tombstones_push_access() {
        let a = Resource::tensor(&[0.0_f32; 4]).unwrap();
        let algo = Algorithm::new(
            &KernelSource::Wgsl(TWO_BUFFERS.into()),
            vec![Arc::clone(&a), a],
            None,
            &[],
            &[],
        )
        .unwrap();
        algo.destroy().unwrap();
        assert!(matches!(
            algo.destroy(),
            Err(SurgeError::AlreadyDestroyed(_))
        ));
        assert!(matches!(
            algo.set_push_bytes(&[]),
            Err(SurgeError::UseAfterDestroy(_))
        ));
    }
}
