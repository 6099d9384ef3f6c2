//! Recorded units of work.
//!
//! Every command a sequence can carry is one [`Operation`] variant holding
//! `Arc` references to its targets. An operation passes through up to four
//! phases, all driven by the owning sequence:
//!
//! 1. **record**: create-class ops allocate or build their targets, a
//!    dispatch validates and persists its push override;
//! 2. **encode**: translation into native commands (copies, compute pass);
//! 3. **pre-submit**: upload staging is refreshed from the host mirror so
//!    replays observe current host data;
//! 4. **post-eval**: after the fence, readback staging is folded back into
//!    the host mirror and copy destinations take their source's mirror.

use std::sync::Arc;

use crate::algorithm::Algorithm;
use crate::error::SurgeError;
use crate::gpu::context::ComputeContext;
use crate::resource::Resource;

/// One recorded command.
pub enum Operation {
    /// Allocate device memory for detached resources and upload their host
    /// data. Single-shot per target.
    CreateResources(Vec<Arc<Resource>>),
    /// Copy host-mirror data into device memory.
    SyncToDevice(Vec<Arc<Resource>>),
    /// Copy device memory back into the host mirrors.
    SyncToHost(Vec<Arc<Resource>>),
    /// Copy the source's device contents into every destination without a
    /// round trip through the host. Destination host mirrors take the
    /// source's mirror after the fence.
    Copy {
        /// Resource whose device contents are copied.
        source: Arc<Resource>,
        /// Resources receiving the copy; each must match the source's
        /// element width, count, and geometry.
        destinations: Vec<Arc<Resource>>,
    },
    /// Build the pipeline of a detached algorithm. Single-shot per target.
    CreateAlgorithm(Arc<Algorithm>),
    /// Run the algorithm over its workgroup grid, optionally overriding the
    /// push-constant block for this dispatch.
    Dispatch {
        /// Algorithm to dispatch.
        algorithm: Arc<Algorithm>,
        /// Push-constant bytes for this dispatch; `None` uses the bytes
        /// stored on the algorithm at encode time.
        push: Option<Vec<u8>>,
    },
}

impl Operation {
    /// Allocate-and-upload for a batch of detached resources.
    #[must_use]
    pub fn create_resources(
        resources: impl IntoIterator<Item = Arc<Resource>>,
    ) -> Self {
        Self::CreateResources(resources.into_iter().collect())
    }

    /// Host-to-device sync for a batch of resources.
    #[must_use]
    pub fn sync_to_device(
        resources: impl IntoIterator<Item = Arc<Resource>>,
    ) -> Self {
        Self::SyncToDevice(resources.into_iter().collect())
    }

    /// Device-to-host sync for a batch of resources.
    #[must_use]
    pub fn sync_to_host(
        resources: impl IntoIterator<Item = Arc<Resource>>,
    ) -> Self {
        Self::SyncToHost(resources.into_iter().collect())
    }

    /// Device-to-device copy of `source` into each destination.
    #[must_use]
    pub fn copy(
        source: Arc<Resource>,
        destinations: impl IntoIterator<Item = Arc<Resource>>,
    ) -> Self {
        Self::Copy {
            source,
            destinations: destinations.into_iter().collect(),
        }
    }

    /// Pipeline build for a detached algorithm.
    #[must_use]
    pub fn create_algorithm(algorithm: Arc<Algorithm>) -> Self {
        Self::CreateAlgorithm(algorithm)
    }

    /// Dispatch with the algorithm's stored push constants.
    #[must_use]
    pub fn dispatch(algorithm: Arc<Algorithm>) -> Self {
        Self::Dispatch {
            algorithm,
            push: None,
        }
    }

    /// Dispatch overriding the push-constant block. The override also
    /// becomes the algorithm's stored push state when recorded.
    #[must_use]
    pub fn dispatch_with_push<T: bytemuck::Pod>(
        algorithm: Arc<Algorithm>,
        values: &[T],
    ) -> Self {
        Self::Dispatch {
            algorithm,
            push: Some(bytemuck::cast_slice(values).to_vec()),
        }
    }

    /// Single-shot ops carry a consumed flag in the sequence; replaying one
    /// is refused there.
    #[must_use]
    pub(crate) const fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateResources(_) | Self::CreateAlgorithm(_)
        )
    }

    /// Label of the first create-class target, for replay errors.
    pub(crate) fn create_target(&self) -> Option<&str> {
        match self {
            Self::CreateResources(resources) => {
                resources.first().map(|r| r.label())
            }
            Self::CreateAlgorithm(algorithm) => Some(algorithm.label()),
            Self::SyncToDevice(_)
            | Self::SyncToHost(_)
            | Self::Copy { .. }
            | Self::Dispatch { .. } => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::CreateResources(_) => "create-resources",
            Self::SyncToDevice(_) => "sync-to-device",
            Self::SyncToHost(_) => "sync-to-host",
            Self::Copy { .. } => "copy",
            Self::CreateAlgorithm(_) => "create-algorithm",
            Self::Dispatch { .. } => "dispatch",
        }
    }

    /// Record-time phase. Create-class ops allocate or build here, so a
    /// target that is already initialized fails with
    /// [`SurgeError::AlreadyInitialized`] at record time.
    pub(crate) fn record(
        &self,
        ctx: &Arc<ComputeContext>,
    ) -> Result<(), SurgeError> {
        match self {
            Self::CreateResources(resources) => {
                for resource in resources {
                    resource.initialize(ctx)?;
                }
                Ok(())
            }
            Self::CreateAlgorithm(algorithm) => algorithm.initialize(ctx),
            Self::Copy {
                source,
                destinations,
            } => {
                if destinations.is_empty() {
                    return Err(SurgeError::InvalidState {
                        expected: "at least one copy destination",
                        actual: "an empty destination list",
                    });
                }
                for destination in destinations {
                    if Arc::ptr_eq(source, destination) {
                        return Err(SurgeError::InvalidState {
                            expected:
                                "a copy destination distinct from the source",
                            actual: "the source resource",
                        });
                    }
                    source.check_copy_compatible(destination)?;
                }
                Ok(())
            }
            Self::Dispatch {
                algorithm,
                push: Some(bytes),
            } => algorithm.set_push_bytes(bytes),
            Self::SyncToDevice(_)
            | Self::SyncToHost(_)
            | Self::Dispatch { push: None, .. } => Ok(()),
        }
    }

    /// Translate into native commands.
    pub(crate) fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), SurgeError> {
        match self {
            Self::CreateResources(resources)
            | Self::SyncToDevice(resources) => {
                for resource in resources {
                    resource.record_upload(encoder)?;
                }
                Ok(())
            }
            Self::SyncToHost(resources) => {
                for resource in resources {
                    resource.record_download(encoder)?;
                }
                Ok(())
            }
            Self::Copy {
                source,
                destinations,
            } => {
                for destination in destinations {
                    source.record_copy_into(destination, encoder)?;
                }
                Ok(())
            }
            Self::CreateAlgorithm(_) => Ok(()),
            Self::Dispatch { algorithm, push } => {
                let mut pass = encoder.begin_compute_pass(
                    &wgpu::ComputePassDescriptor {
                        label: Some(algorithm.label()),
                        timestamp_writes: None,
                    },
                );
                algorithm.encode_dispatch(&mut pass, push.as_deref())
            }
        }
    }

    /// Pre-submit phase: refresh upload staging from the host mirrors.
    pub(crate) fn pre_submit(
        &self,
        ctx: &ComputeContext,
    ) -> Result<(), SurgeError> {
        match self {
            Self::CreateResources(resources)
            | Self::SyncToDevice(resources) => {
                for resource in resources {
                    resource.refresh_upload(ctx)?;
                }
                Ok(())
            }
            Self::SyncToHost(_)
            | Self::Copy { .. }
            | Self::CreateAlgorithm(_)
            | Self::Dispatch { .. } => Ok(()),
        }
    }

    /// Post-eval phase: fold readback staging into the host mirrors, and
    /// propagate copy sources into their destinations' mirrors. Call only
    /// after the submission's fence signalled.
    pub(crate) fn post_eval(
        &self,
        ctx: &ComputeContext,
    ) -> Result<(), SurgeError> {
        match self {
            Self::SyncToHost(resources) => {
                for resource in resources {
                    resource.fold_readback(ctx)?;
                }
                Ok(())
            }
            Self::Copy {
                source,
                destinations,
            } => {
                for destination in destinations {
                    source.mirror_host_into(destination);
                }
                Ok(())
            }
            Self::CreateResources(_)
            | Self::SyncToDevice(_)
            | Self::CreateAlgorithm(_)
            | Self::Dispatch { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_class_ops_are_flagged() {
        let r = Resource::tensor(&[1.0_f32]).unwrap();
        assert!(Operation::create_resources([Arc::clone(&r)]).is_create());
        assert!(!Operation::sync_to_device([Arc::clone(&r)]).is_create());
        assert!(!Operation::sync_to_host([r]).is_create());
    }

    #[test]
    fn test_kinds_name_the_command() {
        let r = Resource::tensor(&[1.0_f32]).unwrap();
        let other = Resource::tensor(&[0.0_f32]).unwrap();
        assert_eq!(
            Operation::create_resources([Arc::clone(&r)]).kind(),
            "create-resources"
        );
        let copy = Operation::copy(r, [other]);
        assert_eq!(copy.kind(), "copy");
        assert!(!copy.is_create());
    }

    #[test]
    fn test_dispatch_override_captures_bytes() {
        let wgsl = "
            struct Push { scale: f32 }
            var<push_constant> push: Push;
            @group(0) @binding(0) var<storage, read_write> a: array<f32>;
            @compute @workgroup_size(1)
            fn main(@builtin(global_invocation_id) id: vec3<u32>) {
                a[id.x] = a[id.x] * push.scale;
            }
        ";
        let r = Resource::tensor(&[1.0_f32; 4]).unwrap();
        let algo = Algorithm::new(
            &crate::kernel::KernelSource::Wgsl(wgsl.into()),
            vec![r],
            None,
            &[],
            &[],
        )
        .unwrap();
        let op = Operation::dispatch_with_push(algo, &[3.0_f32]);
        match &op {
            Operation::Dispatch {
                push: Some(bytes), ..
            } => {
                assert_eq!(bytes.len(), 4);
                let word: [u8; 4] = bytes[..4].try_into().unwrap();
                assert_eq!(f32::from_ne_bytes(word), 3.0);
            }
            _ => panic!("expected a dispatch with a push override"),
        }
    }
}
