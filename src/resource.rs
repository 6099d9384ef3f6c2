//! GPU-backed typed arrays with a host staging mirror.
//!
//! A [`Resource`] is one logically-typed array living in up to three places:
//! a host byte mirror (always present), an upload staging buffer, and the
//! device-side storage buffer or storage texture kernels bind. The staging
//! pair and the device allocation are created together and destroyed
//! together; a resource is never partially initialized. Contents move only
//! through recorded sync operations or the host-side
//! [`set_data`](Resource::set_data)/[`data`](Resource::data) calls.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::element::{storage_format, Element, ElementType};
use crate::error::SurgeError;
use crate::gpu::binding;
use crate::gpu::context::{ComputeContext, ContextError};
use crate::util::{lock, next_label};

/// How a resource binds to kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// 1-D array bound as a storage buffer.
    StorageBuffer,
    /// 2-D array bound as a storage texture.
    StorageImage,
}

/// Geometry of the storage-image variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Texel width.
    pub width: u32,
    /// Texel height.
    pub height: u32,
    /// Channels per texel (1, 2, or 4).
    pub channels: u32,
    /// Storage-texture format the (element type, channels) pair maps to.
    pub format: wgpu::TextureFormat,
}

#[derive(Clone, Copy)]
enum Shape {
    Buffer,
    Image(ImageLayout),
}

enum DeviceState {
    Buffer {
        device: wgpu::Buffer,
        upload: wgpu::Buffer,
        readback: wgpu::Buffer,
    },
    Image {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        upload: wgpu::Buffer,
        readback: wgpu::Buffer,
        layout: ImageLayout,
        unpadded_row: usize,
        padded_row: usize,
    },
}

impl DeviceState {
    fn release(self) {
        match self {
            Self::Buffer {
                device,
                upload,
                readback,
            } => {
                device.destroy();
                upload.destroy();
                readback.destroy();
            }
            Self::Image {
                texture,
                upload,
                readback,
                ..
            } => {
                texture.destroy();
                upload.destroy();
                readback.destroy();
            }
        }
    }
}

/// What an algorithm binds for one resource slot.
pub(crate) enum BindTarget {
    Buffer(wgpu::Buffer),
    Texture(wgpu::TextureView),
}

/// One typed array mirrored between host staging memory and device memory.
///
/// Shared as `Arc<Resource>`: operations and sequences referencing it are
/// co-owners, the manager tracks it weakly. Interior mutability keeps the
/// host mirror and device state consistent behind `&self` so shared holders
/// can drive syncs.
pub struct Resource {
    label: String,
    element: ElementType,
    count: usize,
    shape: Shape,
    host: Mutex<Vec<u8>>,
    state: Mutex<Option<DeviceState>>,
    destroyed: AtomicBool,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("label", &self.label)
            .field("element", &self.element)
            .field("count", &self.count)
            .field("usage", &self.usage())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Resource {
    /// Build a detached tensor resource from host data. No device memory is
    /// touched; a recorded create operation (or a manager factory) performs
    /// the allocation.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] for an empty slice.
    pub fn tensor<T: Element>(values: &[T]) -> Result<Arc<Self>, SurgeError> {
        if values.is_empty() {
            return Err(SurgeError::Allocation(
                "cannot create a zero-length resource".to_owned(),
            ));
        }
        Ok(Arc::new(Self {
            label: next_label("tensor"),
            element: T::TYPE,
            count: values.len(),
            shape: Shape::Buffer,
            host: Mutex::new(bytemuck::cast_slice(values).to_vec()),
            state: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }))
    }

    /// Build a detached image resource from host data laid out row-major,
    /// `channels` interleaved values per texel.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] when the (element type, channels)
    /// pair has no storage-texture format or a dimension is zero, and
    /// [`SurgeError::SizeMismatch`] when the slice length is not
    /// `width * height * channels`.
    pub fn image<T: Element>(
        values: &[T],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<Arc<Self>, SurgeError> {
        let format = storage_format(T::TYPE, channels)?;
        if width == 0 || height == 0 {
            return Err(SurgeError::Allocation(format!(
                "image dimensions {width}x{height} are empty"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if values.len() != expected {
            return Err(SurgeError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Arc::new(Self {
            label: next_label("image"),
            element: T::TYPE,
            count: expected,
            shape: Shape::Image(ImageLayout {
                width,
                height,
                channels,
                format,
            }),
            host: Mutex::new(bytemuck::cast_slice(values).to_vec()),
            state: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }))
    }

    /// Debug label, also used in error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of elements.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.count
    }

    /// Element type resolved at creation.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.element
    }

    /// Whether kernels see this resource as a buffer or an image.
    #[must_use]
    pub const fn usage(&self) -> ResourceUsage {
        match self.shape {
            Shape::Buffer => ResourceUsage::StorageBuffer,
            Shape::Image(_) => ResourceUsage::StorageImage,
        }
    }

    /// Image geometry, `None` for tensors.
    #[must_use]
    pub const fn layout(&self) -> Option<ImageLayout> {
        match self.shape {
            Shape::Buffer => None,
            Shape::Image(layout) => Some(layout),
        }
    }

    /// Texel width, `None` for tensors.
    #[must_use]
    pub const fn width(&self) -> Option<u32> {
        match self.shape {
            Shape::Buffer => None,
            Shape::Image(layout) => Some(layout.width),
        }
    }

    /// Texel height, `None` for tensors.
    #[must_use]
    pub const fn height(&self) -> Option<u32> {
        match self.shape {
            Shape::Buffer => None,
            Shape::Image(layout) => Some(layout.height),
        }
    }

    /// Channels per texel, `None` for tensors.
    #[must_use]
    pub const fn channels(&self) -> Option<u32> {
        match self.shape {
            Shape::Buffer => None,
            Shape::Image(layout) => Some(layout.channels),
        }
    }

    /// `true` between allocation and destruction.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).is_some()
    }

    /// Overwrite the host mirror. Device memory is untouched until a
    /// sync-to-device operation runs.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::UseAfterDestroy`] after teardown and
    /// [`SurgeError::SizeMismatch`] when the element width or length
    /// differs from the resource's.
    pub fn set_data<T: Element>(
        &self,
        values: &[T],
    ) -> Result<(), SurgeError> {
        self.guard_live()?;
        self.check_element::<T>()?;
        if values.len() != self.count {
            return Err(SurgeError::SizeMismatch {
                expected: self.count,
                actual: values.len(),
            });
        }
        lock(&self.host).copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Copy the host mirror out. Reflects device results only after a
    /// sync-to-host operation has run.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::UseAfterDestroy`] after teardown and
    /// [`SurgeError::SizeMismatch`] when the element width differs from the
    /// resource's.
    pub fn data<T: Element>(&self) -> Result<Vec<T>, SurgeError> {
        self.guard_live()?;
        self.check_element::<T>()?;
        let host = lock(&self.host);
        let mut out = vec![T::zeroed(); self.count];
        bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&host);
        Ok(out)
    }

    /// Release device and staging memory. Every subsequent call on this
    /// resource fails until a recorded create operation resurrects it by
    /// re-allocating from the retained host mirror.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::AlreadyDestroyed`] on a second teardown.
    pub fn destroy(&self) -> Result<(), SurgeError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(SurgeError::AlreadyDestroyed(self.label.clone()));
        }
        if let Some(state) = lock(&self.state).take() {
            state.release();
            log::debug!("{}: device memory released", self.label);
        }
        Ok(())
    }

    /// Allocate the staging pair and device storage, then stream the host
    /// mirror into upload staging. Clears a prior destroy tombstone.
    pub(crate) fn initialize(
        &self,
        ctx: &ComputeContext,
    ) -> Result<(), SurgeError> {
        {
            let mut state = lock(&self.state);
            if state.is_some() {
                return Err(SurgeError::AlreadyInitialized(
                    self.label.clone(),
                ));
            }
            let new_state = match self.shape {
                Shape::Buffer => self.allocate_buffers(ctx)?,
                Shape::Image(layout) => self.allocate_image(ctx, layout)?,
            };
            *state = Some(new_state);
        }
        self.destroyed.store(false, Ordering::Release);
        self.refresh_upload(ctx)?;
        log::debug!(
            "{}: allocated {} x {}",
            self.label,
            self.count,
            self.element
        );
        Ok(())
    }

    /// Stream the current host mirror into the upload staging buffer. The
    /// write lands before the next queue submission.
    pub(crate) fn refresh_upload(
        &self,
        ctx: &ComputeContext,
    ) -> Result<(), SurgeError> {
        let state = lock(&self.state);
        let host = lock(&self.host);
        match state.as_ref() {
            None => Err(self.uninit_error()),
            Some(DeviceState::Buffer { upload, .. }) => {
                let padded =
                    binding::padded_copy_size(host.len() as u64) as usize;
                if padded == host.len() {
                    ctx.queue.write_buffer(upload, 0, &host);
                } else {
                    let mut bytes = host.clone();
                    bytes.resize(padded, 0);
                    ctx.queue.write_buffer(upload, 0, &bytes);
                }
                Ok(())
            }
            Some(DeviceState::Image {
                upload,
                layout,
                unpadded_row,
                padded_row,
                ..
            }) => {
                let packed = binding::pack_padded_rows(
                    &host,
                    *unpadded_row,
                    *padded_row,
                    layout.height as usize,
                );
                ctx.queue.write_buffer(upload, 0, &packed);
                Ok(())
            }
        }
    }

    /// Record the upload-staging to device copy.
    pub(crate) fn record_upload(
        &self,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), SurgeError> {
        let state = lock(&self.state);
        match state.as_ref() {
            None => Err(self.uninit_error()),
            Some(DeviceState::Buffer { device, upload, .. }) => {
                encoder.copy_buffer_to_buffer(
                    upload,
                    0,
                    device,
                    0,
                    upload.size(),
                );
                Ok(())
            }
            Some(DeviceState::Image {
                texture,
                upload,
                layout,
                padded_row,
                ..
            }) => {
                encoder.copy_buffer_to_texture(
                    buffer_copy(upload, *padded_row, layout.height),
                    texture_copy(texture),
                    extent(layout),
                );
                Ok(())
            }
        }
    }

    /// Record the device to readback-staging copy.
    pub(crate) fn record_download(
        &self,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), SurgeError> {
        let state = lock(&self.state);
        match state.as_ref() {
            None => Err(self.uninit_error()),
            Some(DeviceState::Buffer {
                device, readback, ..
            }) => {
                encoder.copy_buffer_to_buffer(
                    device,
                    0,
                    readback,
                    0,
                    readback.size(),
                );
                Ok(())
            }
            Some(DeviceState::Image {
                texture,
                readback,
                layout,
                padded_row,
                ..
            }) => {
                encoder.copy_texture_to_buffer(
                    texture_copy(texture),
                    buffer_copy(readback, *padded_row, layout.height),
                    extent(layout),
                );
                Ok(())
            }
        }
    }

    /// Map the readback staging buffer and fold its bytes into the host
    /// mirror. Call only after the recording submission's fence signalled.
    pub(crate) fn fold_readback(
        &self,
        ctx: &ComputeContext,
    ) -> Result<(), SurgeError> {
        let state = lock(&self.state);
        let (readback, rows) = match state.as_ref() {
            None => return Err(self.uninit_error()),
            Some(DeviceState::Buffer { readback, .. }) => (readback, None),
            Some(DeviceState::Image {
                readback,
                layout,
                unpadded_row,
                padded_row,
                ..
            }) => (
                readback,
                Some((*unpadded_row, *padded_row, layout.height as usize)),
            ),
        };

        let slice = readback.slice(..);
        let done = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(Mutex::new(None::<String>));
        let (done_cb, failed_cb) = (Arc::clone(&done), Arc::clone(&failed));
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if let Err(e) = result {
                *lock(&failed_cb) = Some(e.to_string());
            }
            done_cb.store(true, Ordering::Release);
        });
        while !done.load(Ordering::Acquire) {
            ctx.device
                .poll(wgpu::PollType::Wait)
                .map(|_| ())
                .map_err(|e| {
                    SurgeError::Context(ContextError::Poll(e.to_string()))
                })?;
        }
        if let Some(msg) = lock(&failed).take() {
            return Err(SurgeError::Context(ContextError::Poll(format!(
                "readback map failed: {msg}"
            ))));
        }

        {
            let mapped = slice.get_mapped_range();
            let mut host = lock(&self.host);
            match rows {
                None => {
                    let len = host.len();
                    host.copy_from_slice(&mapped[..len]);
                }
                Some((unpadded, padded, height)) => {
                    let bytes = binding::strip_padded_rows(
                        &mapped, unpadded, padded, height,
                    );
                    host.copy_from_slice(&bytes);
                }
            }
        }
        readback.unmap();
        Ok(())
    }

    /// Validate that `dst` can receive this resource's device contents:
    /// same element width, same element count, matching geometry.
    pub(crate) fn check_copy_compatible(
        &self,
        dst: &Self,
    ) -> Result<(), SurgeError> {
        let expected = self.element.size_of();
        let actual = dst.element.size_of();
        if expected != actual {
            return Err(SurgeError::SizeMismatch { expected, actual });
        }
        if self.count != dst.count {
            return Err(SurgeError::SizeMismatch {
                expected: self.count,
                actual: dst.count,
            });
        }
        match (self.shape, dst.shape) {
            (Shape::Buffer, Shape::Buffer) => Ok(()),
            (Shape::Image(from), Shape::Image(to)) if from == to => Ok(()),
            _ => Err(SurgeError::InvalidState {
                expected: "a copy destination shaped like the source",
                actual: "a mismatched resource",
            }),
        }
    }

    /// Record a device-to-device copy of this resource into `dst`. Shape
    /// and size were validated when the copy operation was recorded.
    pub(crate) fn record_copy_into(
        &self,
        dst: &Self,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), SurgeError> {
        let src_state = lock(&self.state);
        let dst_state = lock(&dst.state);
        match (src_state.as_ref(), dst_state.as_ref()) {
            (None, _) => Err(self.uninit_error()),
            (_, None) => Err(dst.uninit_error()),
            (
                Some(DeviceState::Buffer { device: from, .. }),
                Some(DeviceState::Buffer { device: to, .. }),
            ) => {
                encoder.copy_buffer_to_buffer(from, 0, to, 0, from.size());
                Ok(())
            }
            (
                Some(DeviceState::Image {
                    texture: from,
                    layout,
                    ..
                }),
                Some(DeviceState::Image { texture: to, .. }),
            ) => {
                encoder.copy_texture_to_texture(
                    texture_copy(from),
                    texture_copy(to),
                    extent(layout),
                );
                Ok(())
            }
            _ => Err(SurgeError::InvalidState {
                expected: "a copy destination shaped like the source",
                actual: "a mismatched resource",
            }),
        }
    }

    /// Overwrite `dst`'s host mirror with this resource's, after a device
    /// copy completed, so mirrors track device contents without a readback.
    pub(crate) fn mirror_host_into(&self, dst: &Self) {
        let bytes = lock(&self.host).clone();
        *lock(&dst.host) = bytes;
    }

    /// Device-side handle an algorithm binds for this resource.
    pub(crate) fn bind_target(&self) -> Result<BindTarget, SurgeError> {
        let state = lock(&self.state);
        match state.as_ref() {
            None => Err(self.uninit_error()),
            Some(DeviceState::Buffer { device, .. }) => {
                Ok(BindTarget::Buffer(device.clone()))
            }
            Some(DeviceState::Image { view, .. }) => {
                Ok(BindTarget::Texture(view.clone()))
            }
        }
    }

    fn allocate_buffers(
        &self,
        ctx: &ComputeContext,
    ) -> Result<DeviceState, SurgeError> {
        let bytes = self.byte_len() as u64;
        let limits = ctx.limits();
        if bytes > limits.max_buffer_size
            || bytes > u64::from(limits.max_storage_buffer_binding_size)
        {
            return Err(SurgeError::Allocation(format!(
                "{}: {bytes} bytes exceeds device storage buffer limits",
                self.label
            )));
        }
        let size = binding::padded_copy_size(bytes);
        let device = ctx.create_buffer_checked(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Device", self.label)),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        let upload = ctx.create_buffer_checked(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Upload Staging", self.label)),
            size,
            usage: wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        let readback = ctx.create_buffer_checked(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Readback Staging", self.label)),
            size,
            usage: wgpu::BufferUsages::MAP_READ
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        Ok(DeviceState::Buffer {
            device,
            upload,
            readback,
        })
    }

    fn allocate_image(
        &self,
        ctx: &ComputeContext,
        layout: ImageLayout,
    ) -> Result<DeviceState, SurgeError> {
        let max_dim = ctx.limits().max_texture_dimension_2d;
        if layout.width > max_dim || layout.height > max_dim {
            return Err(SurgeError::Allocation(format!(
                "{}: {}x{} exceeds the device texture dimension limit \
                 ({max_dim})",
                self.label, layout.width, layout.height
            )));
        }
        let texture = ctx.create_texture_checked(&wgpu::TextureDescriptor {
            label: Some(&format!("{} Texture", self.label)),
            size: extent(&layout),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: layout.format,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })?;
        let view =
            texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_row = layout.width as usize
            * layout.channels as usize
            * self.element.size_of();
        let padded_row =
            binding::padded_bytes_per_row(unpadded_row as u32) as usize;
        let staging_size = padded_row as u64 * u64::from(layout.height);
        let upload = ctx.create_buffer_checked(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Upload Staging", self.label)),
            size: staging_size,
            usage: wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        let readback = ctx.create_buffer_checked(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Readback Staging", self.label)),
            size: staging_size,
            usage: wgpu::BufferUsages::MAP_READ
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        Ok(DeviceState::Image {
            texture,
            view,
            upload,
            readback,
            layout,
            unpadded_row,
            padded_row,
        })
    }

    fn byte_len(&self) -> usize {
        self.count * self.element.size_of()
    }

    fn guard_live(&self) -> Result<(), SurgeError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(SurgeError::UseAfterDestroy(self.label.clone()));
        }
        Ok(())
    }

    // Same-width reinterpretation is allowed (f32 data read as u32 bit
    // patterns); only the element width is pinned.
    fn check_element<T: Element>(&self) -> Result<(), SurgeError> {
        let expected = self.element.size_of();
        let actual = T::TYPE.size_of();
        if actual == expected {
            Ok(())
        } else {
            Err(SurgeError::SizeMismatch { expected, actual })
        }
    }

    fn uninit_error(&self) -> SurgeError {
        if self.destroyed.load(Ordering::Acquire) {
            SurgeError::UseAfterDestroy(self.label.clone())
        } else {
            SurgeError::InvalidState {
                expected: "an initialized resource",
                actual: "uninitialized",
            }
        }
    }
}

const fn extent(layout: &ImageLayout) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: layout.width,
        height: layout.height,
        depth_or_array_layers: 1,
    }
}

fn buffer_copy<'a>(
    buffer: &'a wgpu::Buffer,
    padded_row: usize,
    height: u32,
) -> wgpu::TexelCopyBufferInfo<'a> {
    wgpu::TexelCopyBufferInfo {
        buffer,
        layout: wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(padded_row as u32),
            rows_per_image: Some(height),
        },
    }
}

fn texture_copy(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_rejects_empty_input() {
        let empty: &[f32] = &[];
        assert!(matches!(
            Resource::tensor(empty),
            Err(SurgeError::Allocation(_))
        ));
    }

    #[test]
    fn test_tensor_metadata() {
        let t = Resource::tensor(&[1.0_f32, 2.0, 3.0]).unwrap();
        assert_eq!(t.size(), 3);
        assert_eq!(t.element_type(), ElementType::F32);
        assert_eq!(t.usage(), ResourceUsage::StorageBuffer);
        assert_eq!(t.layout(), None);
        assert!(!t.is_initialized());
        let printed = format!("{t:?}");
        assert!(printed.contains("tensor-"), "got: {printed}");
    }

    #[test]
    fn test_image_validates_shape() {
        // Wrong length: 2x2x1 needs 4 values.
        let err = Resource::image(&[1.0_f32, 2.0, 3.0], 2, 2, 1).unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 4, actual: 3 }),
            "got: {err}"
        );
        // Unsupported channel layout for u8.
        assert!(Resource::image(&[0_u8; 4], 2, 2, 1).is_err());
        // Zero dimension.
        assert!(Resource::image(&[1.0_f32; 0], 0, 1, 1).is_err());
        // Valid 2x2 single-channel float image.
        let img = Resource::image(&[1.0_f32, 2.0, 3.0, 4.0], 2, 2, 1).unwrap();
        assert_eq!(img.usage(), ResourceUsage::StorageImage);
        let layout = img.layout().unwrap();
        assert_eq!((layout.width, layout.height, layout.channels), (2, 2, 1));
        assert_eq!(layout.format, wgpu::TextureFormat::R32Float);
    }

    #[test]
    fn test_host_data_round_trip() {
        let t = Resource::tensor(&[1_u32, 2, 3, 4]).unwrap();
        assert_eq!(t.data::<u32>().unwrap(), vec![1, 2, 3, 4]);
        t.set_data(&[9_u32, 8, 7, 6]).unwrap();
        assert_eq!(t.data::<u32>().unwrap(), vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_same_width_reinterpret_is_permitted() {
        // Raw views at matching element width mirror the untyped access
        // the data-exchange layer allows.
        let t = Resource::tensor(&[1.0_f32, 2.0]).unwrap();
        let raw = t.data::<u32>().unwrap();
        assert_eq!(raw, vec![1.0_f32.to_bits(), 2.0_f32.to_bits()]);
    }

    #[test]
    fn test_mismatched_element_width_fails() {
        let t = Resource::tensor(&[1.0_f32, 2.0]).unwrap();
        let err = t.data::<u8>().unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 4, actual: 1 }),
            "got: {err}"
        );
        let err = t.set_data(&[1_u16, 2]).unwrap_err();
        assert!(matches!(err, SurgeError::SizeMismatch { .. }));
    }

    #[test]
    fn test_wrong_length_set_data_fails() {
        let t = Resource::tensor(&[1.0_f32, 2.0, 3.0]).unwrap();
        let err = t.set_data(&[1.0_f32]).unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 3, actual: 1 }),
            "got: {err}"
        );
    }

    #[test]
    fn test_copy_compatibility_is_structural() {
        let a = Resource::tensor(&[1_u32, 2, 3, 4]).unwrap();
        let b = Resource::tensor(&[0_u32; 4]).unwrap();
        a.check_copy_compatible(&b).unwrap();
        // Same width, so bit-pattern copies between integer and float
        // tensors are permitted.
        let f = Resource::tensor(&[0.0_f32; 4]).unwrap();
        a.check_copy_compatible(&f).unwrap();

        let short = Resource::tensor(&[0_u32; 2]).unwrap();
        let err = a.check_copy_compatible(&short).unwrap_err();
        assert!(
            matches!(err, SurgeError::SizeMismatch { expected: 4, actual: 2 }),
            "got: {err}"
        );
        let narrow = Resource::tensor(&[0_u16; 4]).unwrap();
        assert!(matches!(
            a.check_copy_compatible(&narrow),
            Err(SurgeError::SizeMismatch { expected: 4, actual: 2 })
        ));

        // Geometry must match: no buffer/image mixing, no reshapes.
        let img = Resource::image(&[0_u32; 4], 2, 2, 1).unwrap();
        assert!(matches!(
            a.check_copy_compatible(&img),
            Err(SurgeError::InvalidState { .. })
        ));
        let wide = Resource::image(&[0_u32; 4], 4, 1, 1).unwrap();
        assert!(matches!(
            img.check_copy_compatible(&wide),
            Err(SurgeError::InvalidState { .. })
        ));
        let same = Resource::image(&[7_u32; 4], 2, 2, 1).unwrap();
        img.check_copy_compatible(&same).unwrap();
    }

    #[test]
    fn test_destroy_tombstones_host_access() {
        let t = Resource::tensor(&[1.0_f32]).unwrap();
        t.destroy().unwrap();
        assert!(!t.is_initialized());
        assert!(matches!(
            t.data::<f32>(),
            Err(SurgeError::UseAfterDestroy(_))
        ));
        assert!(matches!(
            t.set_data(&[2.0_f32]),
            Err(SurgeError::UseAfterDestroy(_))
        ));
        assert!(matches!(
            t.destroy(),
            Err(SurgeError::AlreadyDestroyed(_))
        ));
    }
}
