//! Kernel byte-code ingestion and introspection.
//!
//! Kernels arrive as precompiled SPIR-V (words, bytes, or a file) or as raw
//! WGSL text routed through the in-process front end. Either way the code is
//! parsed once into `naga` IR, validated, and introspected for exactly what
//! call validation needs: the set-0 binding declarations, the push-constant
//! block size, the entry point's workgroup size, and the specialization
//! override keys. Pipelines are later created straight from the IR
//! ([`wgpu::ShaderSource::Naga`]), so nothing is re-parsed at dispatch time.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use crate::error::SurgeError;

/// Where kernel code comes from.
#[derive(Debug, Clone)]
pub enum KernelSource<'a> {
    /// Precompiled byte-code, little-endian SPIR-V.
    SpirV(Cow<'a, [u8]>),
    /// Raw kernel text, compiled by the in-process front end.
    Wgsl(Cow<'a, str>),
}

impl<'a> KernelSource<'a> {
    /// Byte-code supplied as 32-bit words (the embedded-header form).
    #[must_use]
    pub fn spirv_words(words: &'a [u32]) -> Self {
        Self::SpirV(Cow::Borrowed(bytemuck::cast_slice(words)))
    }

    /// Byte-code supplied as raw bytes.
    #[must_use]
    pub fn spirv_bytes(bytes: &'a [u8]) -> Self {
        Self::SpirV(Cow::Borrowed(bytes))
    }

    /// Raw kernel text for the in-process compiler front end.
    #[must_use]
    pub fn wgsl(text: &'a str) -> Self {
        Self::Wgsl(Cow::Borrowed(text))
    }

    /// Load kernel code from a file; `.wgsl` files are treated as text,
    /// anything else as SPIR-V byte-code.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Io`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<KernelSource<'static>, SurgeError> {
        let is_wgsl = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"));
        if is_wgsl {
            let text = std::fs::read_to_string(path)?;
            Ok(KernelSource::Wgsl(Cow::Owned(text)))
        } else {
            let bytes = std::fs::read(path)?;
            Ok(KernelSource::SpirV(Cow::Owned(bytes)))
        }
    }
}

/// Declared kind of one kernel binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Storage buffer; `read_only` when the kernel never writes it.
    StorageBuffer {
        /// Whether the kernel declares the buffer read-only.
        read_only: bool,
    },
    /// 2D storage texture.
    StorageTexture {
        /// Texel format the kernel declares.
        format: wgpu::TextureFormat,
        /// Access the kernel declares.
        access: wgpu::StorageTextureAccess,
    },
}

/// One binding declaration recovered from the kernel, set 0 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDecl {
    /// Binding index within set 0.
    pub binding: u32,
    /// Declared binding kind.
    pub kind: BindingKind,
}

/// A parsed, validated compute kernel.
///
/// Owns the `naga` IR plus the introspected facts the engine validates
/// against. Cheap to share behind the owning algorithm; the IR is cloned
/// only when a pipeline is (re)built from it.
pub struct Kernel {
    module: naga::Module,
    entry_point: String,
    bindings: Vec<BindingDecl>,
    push_constant_size: u32,
    workgroup_size: [u32; 3],
    override_keys: Vec<String>,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("entry_point", &self.entry_point)
            .field("bindings", &self.bindings)
            .field("push_constant_size", &self.push_constant_size)
            .field("workgroup_size", &self.workgroup_size)
            .finish()
    }
}

impl Kernel {
    /// Parse and validate kernel code, then introspect its interface.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Compile`] if the byte-code or text is
    /// malformed, fails validation, has no compute entry point, or declares
    /// bindings the engine cannot service (sets other than 0, uniform
    /// buffers, samplers, non-2D or unknown-format storage images,
    /// duplicate binding indices).
    pub fn parse(source: &KernelSource<'_>) -> Result<Self, SurgeError> {
        let module = match source {
            KernelSource::SpirV(bytes) => naga::front::spv::parse_u8_slice(
                bytes,
                &naga::front::spv::Options::default(),
            )
            .map_err(|e| SurgeError::Compile(e.to_string()))?,
            KernelSource::Wgsl(text) => naga::front::wgsl::parse_str(text)
                .map_err(|e| SurgeError::Compile(e.emit_to_string(text)))?,
        };

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        let _ = validator
            .validate(&module)
            .map_err(|e| SurgeError::Compile(e.to_string()))?;

        Self::introspect(module)
    }

    fn introspect(module: naga::Module) -> Result<Self, SurgeError> {
        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Compute)
            .ok_or_else(|| {
                SurgeError::Compile(
                    "kernel has no compute entry point".to_owned(),
                )
            })?;
        let entry_point = entry.name.clone();
        let workgroup_size = entry.workgroup_size;

        let mut bindings = Vec::new();
        let mut push_constant_size = 0_u32;
        for (_, var) in module.global_variables.iter() {
            let name = var.name.as_deref().unwrap_or("<unnamed>");
            match var.space {
                naga::AddressSpace::Storage { access } => {
                    let decl = resource_binding(var, name)?;
                    let read_only =
                        !access.contains(naga::StorageAccess::STORE);
                    bindings.push(BindingDecl {
                        binding: decl,
                        kind: BindingKind::StorageBuffer { read_only },
                    });
                }
                naga::AddressSpace::Handle => {
                    let kind =
                        image_binding(&module.types[var.ty].inner, name)?;
                    bindings.push(BindingDecl {
                        binding: resource_binding(var, name)?,
                        kind,
                    });
                }
                naga::AddressSpace::PushConstant => {
                    push_constant_size =
                        module.types[var.ty].inner.size(module.to_ctx());
                }
                naga::AddressSpace::Uniform => {
                    return Err(SurgeError::Compile(format!(
                        "binding '{name}' is a uniform buffer; only \
                         storage buffers and storage images are supported"
                    )));
                }
                _ => {}
            }
        }
        bindings.sort_by_key(|decl| decl.binding);
        if let Some(pair) =
            bindings.windows(2).find(|pair| pair[0].binding == pair[1].binding)
        {
            return Err(SurgeError::Compile(format!(
                "duplicate binding index {}",
                pair[0].binding
            )));
        }

        // wgpu keys pipeline constants by numeric id when one is declared,
        // otherwise by name; positional spec-constant lists pair against
        // this order.
        let mut keyed: Vec<(Option<u16>, String)> = Vec::new();
        for (_, ov) in module.overrides.iter() {
            let key = match (ov.id, &ov.name) {
                (Some(id), _) => id.to_string(),
                (None, Some(name)) => name.clone(),
                (None, None) => {
                    return Err(SurgeError::Compile(
                        "specialization override with neither id nor name"
                            .to_owned(),
                    ));
                }
            };
            keyed.push((ov.id, key));
        }
        keyed.sort_by_key(|(id, _)| id.unwrap_or(u16::MAX));
        let override_keys = keyed.into_iter().map(|(_, key)| key).collect();

        log::debug!(
            "kernel '{entry_point}': {} bindings, {push_constant_size} push \
             bytes, workgroup {workgroup_size:?}",
            bindings.len()
        );

        Ok(Self {
            module,
            entry_point,
            bindings,
            push_constant_size,
            workgroup_size,
            override_keys,
        })
    }

    /// Entry point name.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Set-0 binding declarations, sorted by binding index.
    #[must_use]
    pub fn bindings(&self) -> &[BindingDecl] {
        &self.bindings
    }

    /// Declared push-constant block size in bytes (0 when absent).
    #[must_use]
    pub const fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    /// Workgroup (local) size declared on the entry point.
    #[must_use]
    pub const fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Pipeline-constant keys in the order positional specialization lists
    /// pair against.
    #[must_use]
    pub fn override_keys(&self) -> &[String] {
        &self.override_keys
    }

    /// The validated IR, cloned per pipeline build.
    pub(crate) fn ir(&self) -> &naga::Module {
        &self.module
    }
}

fn resource_binding(
    var: &naga::GlobalVariable,
    name: &str,
) -> Result<u32, SurgeError> {
    let Some(ref binding) = var.binding else {
        return Err(SurgeError::Compile(format!(
            "binding '{name}' has no resource binding decoration"
        )));
    };
    if binding.group != 0 {
        return Err(SurgeError::Compile(format!(
            "binding '{name}' uses descriptor set {}; only set 0 is \
             supported",
            binding.group
        )));
    }
    Ok(binding.binding)
}

fn image_binding(
    inner: &naga::TypeInner,
    name: &str,
) -> Result<BindingKind, SurgeError> {
    let naga::TypeInner::Image { dim, class, .. } = *inner else {
        return Err(SurgeError::Compile(format!(
            "binding '{name}' is not a storage buffer or storage image"
        )));
    };
    let naga::ImageClass::Storage { format, access } = class else {
        return Err(SurgeError::Compile(format!(
            "image binding '{name}' is sampled; only storage images are \
             supported"
        )));
    };
    if dim != naga::ImageDimension::D2 {
        return Err(SurgeError::Compile(format!(
            "storage image '{name}' is not 2D"
        )));
    }
    Ok(BindingKind::StorageTexture {
        format: storage_texture_format(format, name)?,
        access: storage_texture_access(access),
    })
}

fn storage_texture_format(
    format: naga::StorageFormat,
    name: &str,
) -> Result<wgpu::TextureFormat, SurgeError> {
    use naga::StorageFormat as Sf;
    use wgpu::TextureFormat as Tf;
    let mapped = match format {
        Sf::R32Float => Tf::R32Float,
        Sf::Rg32Float => Tf::Rg32Float,
        Sf::Rgba32Float => Tf::Rgba32Float,
        Sf::R32Uint => Tf::R32Uint,
        Sf::Rg32Uint => Tf::Rg32Uint,
        Sf::Rgba32Uint => Tf::Rgba32Uint,
        Sf::R32Sint => Tf::R32Sint,
        Sf::Rg32Sint => Tf::Rg32Sint,
        Sf::Rgba32Sint => Tf::Rgba32Sint,
        Sf::Rgba8Uint => Tf::Rgba8Uint,
        Sf::Rgba8Sint => Tf::Rgba8Sint,
        Sf::Rgba16Uint => Tf::Rgba16Uint,
        Sf::Rgba16Sint => Tf::Rgba16Sint,
        other => {
            return Err(SurgeError::Compile(format!(
                "storage image '{name}' uses format {other:?}, which no \
                 resource element layout maps to"
            )));
        }
    };
    Ok(mapped)
}

const fn storage_texture_access(
    access: naga::StorageAccess,
) -> wgpu::StorageTextureAccess {
    let load = access.contains(naga::StorageAccess::LOAD);
    let store = access.contains(naga::StorageAccess::STORE);
    match (load, store) {
        (true, true) => wgpu::StorageTextureAccess::ReadWrite,
        (false, true) => wgpu::StorageTextureAccess::WriteOnly,
        _ => wgpu::StorageTextureAccess::ReadOnly,
    }
}
