//! Shared wgpu boilerplate for compute bind groups and aligned copies.

/// Compute-visible storage buffer binding.
#[must_use]
pub fn storage_buffer(
    binding: u32,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
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

/// Compute-visible 2D storage texture binding.
#[must_use]
pub fn storage_texture(
    binding: u32,
    format: wgpu::TextureFormat,
    access: wgpu::StorageTextureAccess,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// Round a row byte length up to the texture-copy row alignment (256).
#[must_use]
pub const fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Round a buffer byte length up to the buffer-copy alignment (4).
#[must_use]
pub const fn padded_copy_size(bytes: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    bytes.div_ceil(align) * align
}

/// Re-lay contiguous host rows into a row-aligned staging layout.
#[must_use]
pub fn pack_padded_rows(
    src: &[u8],
    unpadded_row: usize,
    padded_row: usize,
    rows: usize,
) -> Vec<u8> {
    let mut packed = vec![0_u8; padded_row * rows];
    for row in 0..rows {
        let from = row * unpadded_row;
        let to = row * padded_row;
        packed[to..to + unpadded_row]
            .copy_from_slice(&src[from..from + unpadded_row]);
    }
    packed
}

/// Strip row alignment padding back out of a mapped staging layout.
#[must_use]
pub fn strip_padded_rows(
    src: &[u8],
    unpadded_row: usize,
    padded_row: usize,
    rows: usize,
) -> Vec<u8> {
    let mut stripped = vec![0_u8; unpadded_row * rows];
    for row in 0..rows {
        let from = row * padded_row;
        let to = row * unpadded_row;
        stripped[to..to + unpadded_row]
            .copy_from_slice(&src[from..from + unpadded_row]);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        assert_eq!(padded_bytes_per_row(64), 256);
    }

    #[test]
    fn test_copy_size_alignment() {
        assert_eq!(padded_copy_size(1), 4);
        assert_eq!(padded_copy_size(3), 4);
        assert_eq!(padded_copy_size(4), 4);
        assert_eq!(padded_copy_size(6), 8);
    }

    #[test]
    fn test_pack_and_strip_rows_invert() {
        // 3 rows of 5 bytes padded out to 8-byte rows.
        let src: Vec<u8> = (0..15).collect();
        let packed = pack_padded_rows(&src, 5, 8, 3);
        assert_eq!(packed.len(), 24);
        assert_eq!(&packed[0..5], &src[0..5]);
        assert_eq!(&packed[5..8], &[0, 0, 0]);
        assert_eq!(&packed[8..13], &src[5..10]);
        let stripped = strip_padded_rows(&packed, 5, 8, 3);
        assert_eq!(stripped, src);
    }
}
