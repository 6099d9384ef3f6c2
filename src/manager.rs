//! Device ownership, object registries, and convenience evaluation.
//!
//! The [`Manager`] owns the GPU context and is the factory for everything
//! else. It holds named sequences strongly and tracks the resources and
//! algorithms it created through `Weak` references only, so user code and
//! recording sequences stay the owners; [`gc`](Manager::gc) prunes registry
//! entries whose objects are gone. Dropping the manager tears down every
//! object it still knows about.
//!
//! One thread is expected to drive a manager; sharing objects across queues
//! without an await in between is a caller error, not a detected hazard.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::algorithm::Algorithm;
use crate::element::Element;
use crate::error::SurgeError;
use crate::gpu::context::ComputeContext;
use crate::kernel::KernelSource;
use crate::operation::Operation;
use crate::options::EngineOptions;
use crate::resource::Resource;
use crate::sequence::{Sequence, SubmitHandle};
use crate::util::{lock, next_label};

/// Owner of the device context and registry of engine objects.
pub struct Manager {
    ctx: Arc<ComputeContext>,
    options: EngineOptions,
    sequences: Mutex<FxHashMap<String, Arc<Sequence>>>,
    resources: Mutex<Vec<Weak<Resource>>>,
    algorithms: Mutex<Vec<Weak<Algorithm>>>,
}

impl Manager {
    /// Acquire the default adapter and device.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Context`] when no usable adapter or device is
    /// available.
    pub fn new() -> Result<Self, SurgeError> {
        Self::with_options(&EngineOptions::default())
    }

    /// Acquire a device per `options`: adapter pinning or power preference,
    /// logical queue count, await tuning.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Context`] when the requested adapter or device
    /// cannot be acquired.
    pub fn with_options(options: &EngineOptions) -> Result<Self, SurgeError> {
        let ctx = pollster::block_on(ComputeContext::new(options))?;
        Ok(Self::wrap(ctx, options.clone()))
    }

    /// Wrap an externally created device and queue, for embedding into an
    /// application that already drives wgpu. `options.device` is ignored;
    /// `options.execution` still applies.
    #[must_use]
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        options: &EngineOptions,
    ) -> Self {
        let ctx = ComputeContext::from_device(
            device,
            queue,
            options.execution.queue_count,
        );
        Self::wrap(ctx, options.clone())
    }

    fn wrap(ctx: ComputeContext, options: EngineOptions) -> Self {
        Self {
            ctx: Arc::new(ctx),
            options,
            sequences: Mutex::new(FxHashMap::default()),
            resources: Mutex::new(Vec::new()),
            algorithms: Mutex::new(Vec::new()),
        }
    }

    /// Adapters visible to the backend, without acquiring any of them.
    #[must_use]
    pub fn list_devices() -> Vec<wgpu::AdapterInfo> {
        ComputeContext::list_adapters()
    }

    /// Adapter the manager is running on; `None` for wrapped external
    /// devices.
    #[must_use]
    pub fn device_properties(&self) -> Option<&wgpu::AdapterInfo> {
        self.ctx.adapter_info()
    }

    /// Number of logical queues sequences may bind to.
    #[must_use]
    pub fn queue_count(&self) -> u32 {
        self.ctx.queue_count()
    }

    /// Create a tensor resource and allocate its device and staging memory.
    /// Device contents are undefined until a sync-to-device runs.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] when the size is zero, exceeds
    /// device limits, or memory is exhausted.
    pub fn tensor<T: Element>(
        &self,
        values: &[T],
    ) -> Result<Arc<Resource>, SurgeError> {
        let resource = Resource::tensor(values)?;
        resource.initialize(&self.ctx)?;
        self.register_resource(&resource);
        Ok(resource)
    }

    /// Create an image resource and allocate its device and staging memory.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] when the element/channel pair has
    /// no storage format, a dimension is zero or exceeds device limits, or
    /// memory is exhausted, and [`SurgeError::SizeMismatch`] when the slice
    /// length is not `width * height * channels`.
    pub fn image<T: Element>(
        &self,
        values: &[T],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<Arc<Resource>, SurgeError> {
        let resource = Resource::image(values, width, height, channels)?;
        resource.initialize(&self.ctx)?;
        self.register_resource(&resource);
        Ok(resource)
    }

    /// Parse the kernel, validate it against `resources`, and build the
    /// pipeline immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Compile`] for malformed kernels or any
    /// interface mismatch.
    pub fn algorithm(
        &self,
        resources: Vec<Arc<Resource>>,
        source: &KernelSource<'_>,
        workgroup: Option<[u32; 3]>,
        spec_constants: &[f32],
        push: &[u8],
    ) -> Result<Arc<Algorithm>, SurgeError> {
        let algorithm =
            Algorithm::new(source, resources, workgroup, spec_constants, push)?;
        algorithm.initialize(&self.ctx)?;
        self.register_algorithm(&algorithm);
        Ok(algorithm)
    }

    /// Track a detached resource so `gc` and manager teardown cover it.
    /// Resources built through the factories are registered automatically.
    pub fn register_resource(&self, resource: &Arc<Resource>) {
        lock(&self.resources).push(Arc::downgrade(resource));
    }

    /// Track a detached algorithm, as with
    /// [`register_resource`](Self::register_resource).
    pub fn register_algorithm(&self, algorithm: &Arc<Algorithm>) {
        lock(&self.algorithms).push(Arc::downgrade(algorithm));
    }

    /// Return the named sequence, creating it bound to `queue_index` when
    /// absent; `name` of `None` creates an anonymous, unregistered sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::InvalidQueue`] when the index is out of range.
    pub fn sequence(
        &self,
        name: Option<&str>,
        queue_index: u32,
    ) -> Result<Arc<Sequence>, SurgeError> {
        let available = self.ctx.queue_count();
        if queue_index >= available {
            return Err(SurgeError::InvalidQueue {
                index: queue_index,
                available,
            });
        }
        match name {
            Some(name) => {
                let mut sequences = lock(&self.sequences);
                if let Some(existing) = sequences.get(name) {
                    return Ok(Arc::clone(existing));
                }
                let sequence = Sequence::new(
                    Arc::clone(&self.ctx),
                    name.to_owned(),
                    queue_index,
                    &self.options.execution,
                );
                let _ = sequences
                    .insert(name.to_owned(), Arc::clone(&sequence));
                Ok(sequence)
            }
            None => Ok(Sequence::new(
                Arc::clone(&self.ctx),
                next_label("sequence"),
                queue_index,
                &self.options.execution,
            )),
        }
    }

    /// Record `ops` into an anonymous sequence on queue 0, evaluate
    /// synchronously, and discard the sequence.
    ///
    /// # Errors
    ///
    /// Anything recording or evaluation can return; see
    /// [`Sequence::record`] and [`Sequence::eval`].
    pub fn eval_default(
        &self,
        ops: Vec<Operation>,
    ) -> Result<(), SurgeError> {
        let sequence = self.sequence(None, 0)?;
        sequence.begin()?;
        for op in ops {
            sequence.record(op)?;
        }
        sequence.end()?;
        sequence.eval()
    }

    /// Submit on the named sequence without blocking. Non-empty `ops`
    /// re-record the sequence first; empty `ops` replay what it already
    /// holds. The sequence is created on queue 0 when absent.
    ///
    /// # Errors
    ///
    /// Anything recording or submission can return; see
    /// [`Sequence::record`] and [`Sequence::eval_async`]. An empty `ops`
    /// list on a freshly created sequence fails with
    /// [`SurgeError::InvalidState`], there is nothing recorded to replay.
    pub fn eval_async(
        &self,
        name: &str,
        ops: Vec<Operation>,
    ) -> Result<SubmitHandle, SurgeError> {
        let sequence = self.sequence(Some(name), 0)?;
        if !ops.is_empty() {
            sequence.begin()?;
            for op in ops {
                sequence.record(op)?;
            }
            sequence.end()?;
        }
        sequence.eval_async()
    }

    /// Await the submission identified by `handle` on its named sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::NotFound`] when the handle's sequence is not
    /// registered here or the submission is no longer in flight,
    /// [`SurgeError::Timeout`] when the deadline passes first.
    pub fn eval_await(
        &self,
        handle: &SubmitHandle,
        timeout: Option<Duration>,
    ) -> Result<(), SurgeError> {
        let sequence = {
            let sequences = lock(&self.sequences);
            match sequences.get(handle.sequence()) {
                Some(sequence) => Arc::clone(sequence),
                None => {
                    return Err(SurgeError::NotFound(format!(
                        "unknown sequence '{}'",
                        handle.sequence()
                    )))
                }
            }
        };
        sequence.eval_await(handle, timeout)
    }

    /// Tear down a resource, algorithm, or sequence. Accepts `Arc`
    /// references, a sequence name, or a slice of any of these.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::AlreadyDestroyed`] on double destruction and
    /// [`SurgeError::NotFound`] for an unknown sequence name.
    pub fn destroy<T: DestroyTarget + ?Sized>(
        &self,
        target: &T,
    ) -> Result<(), SurgeError> {
        target.destroy_with(self)
    }

    /// One garbage-collection sweep: drop registry entries whose object has
    /// no strong owner left. Returns the number of entries pruned; running
    /// it again without new allocations prunes nothing.
    pub fn gc(&self) -> usize {
        let mut pruned = 0_usize;
        lock(&self.resources).retain(|weak| {
            let live = weak.strong_count() > 0;
            if !live {
                pruned += 1;
            }
            live
        });
        lock(&self.algorithms).retain(|weak| {
            let live = weak.strong_count() > 0;
            if !live {
                pruned += 1;
            }
            live
        });
        if pruned > 0 {
            log::debug!("gc: pruned {pruned} dead registrations");
        }
        pruned
    }

    fn destroy_resource(
        &self,
        resource: &Arc<Resource>,
    ) -> Result<(), SurgeError> {
        resource.destroy()?;
        lock(&self.resources).retain(|weak| {
            weak.upgrade()
                .is_some_and(|live| !Arc::ptr_eq(&live, resource))
        });
        Ok(())
    }

    fn destroy_algorithm(
        &self,
        algorithm: &Arc<Algorithm>,
    ) -> Result<(), SurgeError> {
        algorithm.destroy()?;
        lock(&self.algorithms).retain(|weak| {
            weak.upgrade()
                .is_some_and(|live| !Arc::ptr_eq(&live, algorithm))
        });
        Ok(())
    }

    fn destroy_sequence(
        &self,
        sequence: &Arc<Sequence>,
    ) -> Result<(), SurgeError> {
        sequence.destroy()?;
        let mut sequences = lock(&self.sequences);
        let registered = sequences
            .get(sequence.name())
            .is_some_and(|held| Arc::ptr_eq(held, sequence));
        if registered {
            let _ = sequences.remove(sequence.name());
        }
        Ok(())
    }

    fn destroy_named(&self, name: &str) -> Result<(), SurgeError> {
        let removed = lock(&self.sequences).remove(name);
        match removed {
            Some(sequence) => sequence.destroy(),
            None => Err(SurgeError::NotFound(format!(
                "unknown sequence '{name}'"
            ))),
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        let sequences: Vec<Arc<Sequence>> =
            lock(&self.sequences).drain().map(|(_, s)| s).collect();
        for sequence in sequences {
            if sequence.is_initialized() {
                if let Err(e) = sequence.destroy() {
                    log::warn!("teardown of '{}': {e}", sequence.name());
                }
            }
        }
        for weak in lock(&self.algorithms).drain(..) {
            if let Some(algorithm) = weak.upgrade() {
                if algorithm.is_initialized() {
                    if let Err(e) = algorithm.destroy() {
                        log::warn!(
                            "teardown of '{}': {e}",
                            algorithm.label()
                        );
                    }
                }
            }
        }
        for weak in lock(&self.resources).drain(..) {
            if let Some(resource) = weak.upgrade() {
                if resource.is_initialized() {
                    if let Err(e) = resource.destroy() {
                        log::warn!(
                            "teardown of '{}': {e}",
                            resource.label()
                        );
                    }
                }
            }
        }
        log::debug!("manager: torn down");
    }
}

/// Anything [`Manager::destroy`] can tear down.
pub trait DestroyTarget {
    /// Destroy `self` through the manager, dropping its registrations.
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError>;
}

impl DestroyTarget for Arc<Resource> {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        manager.destroy_resource(self)
    }
}

impl DestroyTarget for Arc<Algorithm> {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        manager.destroy_algorithm(self)
    }
}

impl DestroyTarget for Arc<Sequence> {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        manager.destroy_sequence(self)
    }
}

impl DestroyTarget for str {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        manager.destroy_named(self)
    }
}

impl DestroyTarget for String {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        manager.destroy_named(self)
    }
}

impl<T: DestroyTarget> DestroyTarget for [T] {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        for target in self {
            target.destroy_with(manager)?;
        }
        Ok(())
    }
}

impl<T: DestroyTarget + ?Sized> DestroyTarget for &T {
    fn destroy_with(&self, manager: &Manager) -> Result<(), SurgeError> {
        (**self).destroy_with(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceState;
    use std::time::Instant;

    const MULTIPLY: &str = "
        @group(0) @binding(0) var<storage, read> a: array<f32>;
        @group(0) @binding(1) var<storage, read> b: array<f32>;
        @group(0) @binding(2) var<storage, read_write> out: array<f32>;
        @compute @workgroup_size(1)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            out[id.x] = a[id.x] * b[id.x];
        }
    ";

    fn manager() -> Option<Manager> {
        let _ = env_logger::builder().is_test(true).try_init();
        match Manager::new() {
            Ok(m) => Some(m),
            Err(e) => {
                eprintln!("skipping, no usable adapter: {e}");
                None
            }
        }
    }

    fn wgsl(source: &str) -> KernelSource<'_> {
        KernelSource::Wgsl(source.into())
    }

    #[test]
    fn test_device_listing_does_not_panic() {
        let _ = Manager::list_devices();
    }

    #[test]
    fn test_queue_index_is_validated() {
        let Some(mgr) = manager() else { return };
        let err = mgr.sequence(Some("oob"), 99).unwrap_err();
        assert!(
            matches!(err, SurgeError::InvalidQueue { index: 99, .. }),
            "got: {err}"
        );
    }

    #[test]
    fn test_named_sequences_are_create_or_get() {
        let Some(mgr) = manager() else { return };
        let first = mgr.sequence(Some("shared"), 0).unwrap();
        let second = mgr.sequence(Some("shared"), 0).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let anon_a = mgr.sequence(None, 0).unwrap();
        let anon_b = mgr.sequence(None, 0).unwrap();
        assert!(!Arc::ptr_eq(&anon_a, &anon_b));
    }

    #[test]
    fn test_elementwise_multiply_via_eval_default() {
        let Some(mgr) = manager() else { return };
        let a = mgr.tensor(&[2.0_f32, 2.0, 2.0]).unwrap();
        let b = mgr.tensor(&[1.0_f32, 2.0, 3.0]).unwrap();
        let out = mgr.tensor(&[0.0_f32, 0.0, 0.0]).unwrap();
        let algo = mgr
            .algorithm(
                vec![
                    Arc::clone(&a),
                    Arc::clone(&b),
                    Arc::clone(&out),
                ],
                &wgsl(MULTIPLY),
                None,
                &[],
                &[],
            )
            .unwrap();
        assert_eq!(algo.workgroup(), [3, 1, 1]);

        mgr.eval_default(vec![
            Operation::sync_to_device([a, b, Arc::clone(&out)]),
            Operation::dispatch(algo),
            Operation::sync_to_host([Arc::clone(&out)]),
        ])
        .unwrap();
        assert_eq!(out.data::<f32>().unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_detached_objects_build_at_record_time() {
        let Some(mgr) = manager() else { return };
        let a = Resource::tensor(&[2.0_f32, 2.0, 2.0]).unwrap();
        let b = Resource::tensor(&[1.0_f32, 2.0, 3.0]).unwrap();
        let out = Resource::tensor(&[0.0_f32, 0.0, 0.0]).unwrap();
        let algo = Algorithm::new(
            &wgsl(MULTIPLY),
            vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&out)],
            None,
            &[],
            &[],
        )
        .unwrap();
        mgr.register_resource(&a);
        mgr.register_resource(&b);
        mgr.register_resource(&out);
        mgr.register_algorithm(&algo);
        assert!(!a.is_initialized());
        assert!(!algo.is_initialized());

        let seq = mgr.sequence(Some("detached"), 0).unwrap();
        seq.begin().unwrap();
        seq.record(Operation::create_resources([
            Arc::clone(&a),
            Arc::clone(&b),
            Arc::clone(&out),
        ]))
        .unwrap();
        seq.record(Operation::create_algorithm(Arc::clone(&algo)))
            .unwrap();
        seq.record(Operation::dispatch(Arc::clone(&algo))).unwrap();
        seq.record(Operation::sync_to_host([Arc::clone(&out)]))
            .unwrap();
        seq.end().unwrap();
        seq.eval().unwrap();

        assert!(a.is_initialized());
        assert!(algo.is_initialized());
        assert_eq!(out.data::<f32>().unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_push_constants_accumulate_across_dispatches() {
        let Some(mgr) = manager() else { return };
        let src = "
            struct Push { x: f32, y: f32, z: f32 }
            var<push_constant> push: Push;
            @group(0) @binding(0) var<storage, read_write> out: array<f32>;
            @compute @workgroup_size(1)
            fn main(@builtin(global_invocation_id) id: vec3<u32>) {
                if (id.x == 0u) {
                    out[0] = out[0] + push.x;
                } else if (id.x == 1u) {
                    out[1] = out[1] + push.y;
                } else {
                    out[2] = out[2] + push.z;
                }
            }
        ";
        let out = mgr.tensor(&[0.0_f32, 0.0, 0.0]).unwrap();
        let algo = match mgr.algorithm(
            vec![Arc::clone(&out)],
            &wgsl(src),
            None,
            &[],
            &[],
        ) {
            Ok(algo) => algo,
            Err(SurgeError::Compile(msg)) if msg.contains("push") => {
                eprintln!("skipping, no push-constant support: {msg}");
                return;
            }
            Err(e) => panic!("unexpected error: {e}"),
        };

        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&out)]),
            Operation::dispatch_with_push(
                Arc::clone(&algo),
                &[0.1_f32, 0.2, 0.3],
            ),
            Operation::dispatch_with_push(algo, &[0.3_f32, 0.2, 0.1]),
            Operation::sync_to_host([Arc::clone(&out)]),
        ])
        .unwrap();

        for value in out.data::<f32>().unwrap() {
            assert!((value - 0.4).abs() < 1e-6, "got: {value}");
        }
    }

    #[test]
    fn test_grid_indices_land_in_both_buffers() {
        let Some(mgr) = manager() else { return };
        let src = "
            @group(0) @binding(0) var<storage, read_write> xs: array<u32>;
            @group(0) @binding(1) var<storage, read_write> ys: array<u32>;
            @compute @workgroup_size(1)
            fn main(@builtin(workgroup_id) wid: vec3<u32>) {
                let idx = wid.y * 16u + wid.x;
                xs[idx] = wid.x;
                ys[idx] = wid.y;
            }
        ";
        let xs = mgr.tensor(&[0_u32; 128]).unwrap();
        let ys = mgr.tensor(&[0_u32; 128]).unwrap();
        let algo = mgr
            .algorithm(
                vec![Arc::clone(&xs), Arc::clone(&ys)],
                &wgsl(src),
                Some([16, 8, 1]),
                &[],
                &[],
            )
            .unwrap();

        mgr.eval_default(vec![
            Operation::dispatch(algo),
            Operation::sync_to_host([Arc::clone(&xs), Arc::clone(&ys)]),
        ])
        .unwrap();

        let expect_x: Vec<u32> =
            (0..8).flat_map(|_| 0..16_u32).collect();
        let expect_y: Vec<u32> = (0..8_u32)
            .flat_map(|y| std::iter::repeat(y).take(16))
            .collect();
        assert_eq!(xs.data::<u32>().unwrap(), expect_x);
        assert_eq!(ys.data::<u32>().unwrap(), expect_y);
    }

    #[test]
    fn test_device_copy_moves_data_between_tensors() {
        let Some(mgr) = manager() else { return };
        let src = mgr.tensor(&[1_u32, 2, 3, 4]).unwrap();
        let dst = mgr.tensor(&[0_u32; 4]).unwrap();
        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&src), Arc::clone(&dst)]),
            Operation::copy(Arc::clone(&src), [Arc::clone(&dst)]),
            Operation::sync_to_host([Arc::clone(&dst)]),
        ])
        .unwrap();
        assert_eq!(dst.data::<u32>().unwrap(), vec![1, 2, 3, 4]);

        // Destination mirrors follow the copy even without a readback.
        let mirror = mgr.tensor(&[9_u32; 4]).unwrap();
        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&src)]),
            Operation::copy(Arc::clone(&src), [Arc::clone(&mirror)]),
        ])
        .unwrap();
        assert_eq!(mirror.data::<u32>().unwrap(), vec![1, 2, 3, 4]);

        // Self-copies and size mismatches are refused at record time.
        let seq = mgr.sequence(Some("copy-checks"), 0).unwrap();
        seq.begin().unwrap();
        let err = seq
            .record(Operation::copy(Arc::clone(&src), [Arc::clone(&src)]))
            .unwrap_err();
        assert!(matches!(err, SurgeError::InvalidState { .. }), "got: {err}");
        let short = mgr.tensor(&[0_u32; 2]).unwrap();
        let err = seq
            .record(Operation::copy(Arc::clone(&src), [short]))
            .unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 4, actual: 2 }),
            "got: {err}"
        );
        let err = seq.record(Operation::copy(src, [])).unwrap_err();
        assert!(matches!(err, SurgeError::InvalidState { .. }), "got: {err}");
        assert_eq!(seq.state(), SequenceState::Recording);
    }

    #[test]
    fn test_device_copy_moves_data_between_images() {
        let Some(mgr) = manager() else { return };
        let src = mgr.image(&[1_u32, 2, 3, 4, 5, 6], 3, 2, 1).unwrap();
        let dst = mgr.image(&[0_u32; 6], 3, 2, 1).unwrap();
        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&src)]),
            Operation::copy(Arc::clone(&src), [Arc::clone(&dst)]),
            Operation::sync_to_host([Arc::clone(&dst)]),
        ])
        .unwrap();
        assert_eq!(dst.data::<u32>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_identity_round_trip_preserves_data() {
        let Some(mgr) = manager() else { return };
        let src = "
            @group(0) @binding(0) var<storage, read_write> data: array<u32>;
            @compute @workgroup_size(1)
            fn main(@builtin(global_invocation_id) id: vec3<u32>) {
                data[id.x] = data[id.x];
            }
        ";
        let input: Vec<u32> = (1..=64).collect();
        let r = mgr.tensor(&input).unwrap();
        let algo = mgr
            .algorithm(vec![Arc::clone(&r)], &wgsl(src), None, &[], &[])
            .unwrap();
        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&r)]),
            Operation::dispatch(algo),
            Operation::sync_to_host([Arc::clone(&r)]),
        ])
        .unwrap();
        assert_eq!(r.data::<u32>().unwrap(), input);
    }

    #[test]
    fn test_image_round_trip_increments_texels() {
        let Some(mgr) = manager() else { return };
        let src = "
            @group(0) @binding(0)
            var img: texture_storage_2d<r32uint, read_write>;
            @compute @workgroup_size(1)
            fn main(@builtin(workgroup_id) wid: vec3<u32>) {
                let p = vec2<i32>(i32(wid.x), i32(wid.y));
                let v = textureLoad(img, p);
                textureStore(img, p, vec4<u32>(v.x + 1u, 0u, 0u, 0u));
            }
        ";
        let img = mgr.image(&[1_u32, 2, 3, 4, 5, 6], 3, 2, 1).unwrap();
        let algo = mgr
            .algorithm(vec![Arc::clone(&img)], &wgsl(src), None, &[], &[])
            .unwrap();
        assert_eq!(algo.workgroup(), [3, 2, 1]);
        mgr.eval_default(vec![
            Operation::sync_to_device([Arc::clone(&img)]),
            Operation::dispatch(algo),
            Operation::sync_to_host([Arc::clone(&img)]),
        ])
        .unwrap();
        assert_eq!(img.data::<u32>().unwrap(), vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_async_submissions_overlap_across_queues() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut options = EngineOptions::default();
        options.execution.queue_count = 2;
        let mgr = match Manager::with_options(&options) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("skipping, no usable adapter: {e}");
                return;
            }
        };
        let src = "
            @group(0) @binding(0) var<storage, read_write> data: array<u32>;
            @compute @workgroup_size(64)
            fn main(@builtin(global_invocation_id) id: vec3<u32>) {
                var v = data[id.x];
                for (var i = 0u; i < 256u; i = i + 1u) {
                    v = v * 1664525u + 1013904223u;
                }
                data[id.x] = v;
            }
        ";
        let mut seqs = Vec::new();
        for queue in 0..2_u32 {
            let data = mgr.tensor(&vec![1_u32; 1 << 16]).unwrap();
            let algo = mgr
                .algorithm(
                    vec![Arc::clone(&data)],
                    &wgsl(src),
                    Some([1 << 10, 1, 1]),
                    &[],
                    &[],
                )
                .unwrap();
            let seq = mgr
                .sequence(Some(&format!("queue-{queue}")), queue)
                .unwrap();
            seq.begin().unwrap();
            seq.record(Operation::sync_to_device([Arc::clone(&data)]))
                .unwrap();
            seq.record(Operation::dispatch(algo)).unwrap();
            seq.record(Operation::sync_to_host([data])).unwrap();
            seq.end().unwrap();
            seqs.push(seq);
        }

        let serial_start = Instant::now();
        for seq in &seqs {
            seq.eval().unwrap();
        }
        let serial = serial_start.elapsed();

        let overlap_start = Instant::now();
        let handles: Vec<_> =
            seqs.iter().map(|s| s.eval_async().unwrap()).collect();
        for (seq, handle) in seqs.iter().zip(&handles) {
            seq.eval_await(handle, None).unwrap();
        }
        let overlapped = overlap_start.elapsed();

        // Overlapped submission must not be slower than strictly serial
        // evaluation by more than scheduling noise.
        assert!(
            overlapped <= serial + Duration::from_millis(250),
            "overlapped {overlapped:?} vs serial {serial:?}"
        );
    }

    #[test]
    fn test_manager_eval_helpers_run_by_name() {
        let Some(mgr) = manager() else { return };
        let r = mgr.tensor(&[7_u32, 8]).unwrap();
        let handle = mgr
            .eval_async(
                "named",
                vec![
                    Operation::sync_to_device([Arc::clone(&r)]),
                    Operation::sync_to_host([Arc::clone(&r)]),
                ],
            )
            .unwrap();
        mgr.eval_await(&handle, None).unwrap();
        assert_eq!(r.data::<u32>().unwrap(), vec![7, 8]);

        // Replay without re-recording.
        let handle = mgr.eval_async("named", Vec::new()).unwrap();
        mgr.eval_await(&handle, None).unwrap();

        mgr.destroy("named").unwrap();
        let err = mgr.eval_async("gone-check", Vec::new()).unwrap_err();
        // A fresh sequence holds no recorded ops to replay.
        assert!(matches!(err, SurgeError::InvalidState { .. }), "got: {err}");
    }

    #[test]
    fn test_destroy_accepts_refs_names_and_slices() {
        let Some(mgr) = manager() else { return };
        let r = mgr.tensor(&[1.0_f32]).unwrap();
        mgr.destroy(&r).unwrap();
        assert!(!r.is_initialized());
        assert!(matches!(
            mgr.destroy(&r),
            Err(SurgeError::AlreadyDestroyed(_))
        ));

        let seq = mgr.sequence(Some("by-name"), 0).unwrap();
        mgr.destroy("by-name").unwrap();
        assert!(!seq.is_initialized());
        assert!(matches!(
            mgr.destroy("by-name"),
            Err(SurgeError::NotFound(_))
        ));

        let a = mgr.tensor(&[1_u32]).unwrap();
        let b = mgr.tensor(&[2_u32]).unwrap();
        mgr.destroy(&[Arc::clone(&a), Arc::clone(&b)][..]).unwrap();
        assert!(!a.is_initialized());
        assert!(!b.is_initialized());
    }

    #[test]
    fn test_gc_prunes_dead_registrations_once() {
        let Some(mgr) = manager() else { return };
        let keep = mgr.tensor(&[1.0_f32]).unwrap();
        let dropped = mgr.tensor(&[2.0_f32]).unwrap();
        drop(dropped);
        assert_eq!(mgr.gc(), 1);
        assert_eq!(mgr.gc(), 0);
        assert!(keep.is_initialized());
    }
}
