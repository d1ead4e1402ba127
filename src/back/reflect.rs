use std::collections::HashMap;

use spirv_cross::spirv::{Ast, Compile, Decoration, ExecutionModel, Parse, Target, Type};
use spirv_cross::ErrorCode;
use thiserror::Error;

use crate::back::spirv::ENTRY_POINT;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VS",
            ShaderStage::Fragment => "FS",
        }
    }

    fn execution_model(self) -> ExecutionModel {
        match self {
            ShaderStage::Vertex => ExecutionModel::Vertex,
            ShaderStage::Fragment => ExecutionModel::Fragment,
        }
    }
}

/// A stage input. Slots are dense from 0; the HLSL semantic is always the
/// synthesized `TEXCOORD{slot}` pair.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Attr {
    pub slot: u32,
    pub name: String,
    pub sem_name: String,
    pub sem_index: u32,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum UniformKind {
    Float,
    Float2,
    Float3,
    Float4,
    Mat4,
}

impl UniformKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UniformKind::Float => "FLOAT",
            UniformKind::Float2 => "FLOAT2",
            UniformKind::Float3 => "FLOAT3",
            UniformKind::Float4 => "FLOAT4",
            UniformKind::Mat4 => "MAT4",
        }
    }

    pub fn glsl_str(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Float2 => "vec2",
            UniformKind::Float3 => "vec3",
            UniformKind::Float4 => "vec4",
            UniformKind::Mat4 => "mat4",
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            UniformKind::Float => 4,
            UniformKind::Float2 => 8,
            UniformKind::Float3 => 12,
            UniformKind::Float4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Uniform {
    pub name: String,
    pub kind: UniformKind,
    pub array_count: usize,
    pub offset: usize,
}

impl Uniform {
    /// std140 footprint: array elements are padded to 16-byte strides.
    pub fn byte_size(&self) -> usize {
        if self.array_count > 1 {
            round16(self.kind.size_bytes()) * self.array_count
        } else {
            self.kind.size_bytes()
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct UniformBlock {
    pub slot: u32,
    pub byte_size: usize,
    pub name: String,
    pub uniforms: Vec<Uniform>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ImageKind {
    Tex2D,
    Cube,
    Tex3D,
    Array,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Tex2D => "IMAGE_2D",
            ImageKind::Cube => "IMAGE_CUBE",
            ImageKind::Tex3D => "IMAGE_3D",
            ImageKind::Array => "IMAGE_ARRAY",
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Image {
    pub slot: u32,
    pub name: String,
    pub kind: ImageKind,
}

/// Reflection of one translated shader.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Reflection {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub attrs: Vec<Attr>,
    pub uniform_blocks: Vec<UniformBlock>,
    pub images: Vec<Image>,
}

impl Reflection {
    /// First section that differs between two translations of the same
    /// snippet. The entry point is excluded: MSL legitimately renames it.
    pub fn mismatch(&self, other: &Reflection) -> Option<&'static str> {
        if self.attrs != other.attrs {
            return Some("vertex attributes");
        }
        if self.uniform_blocks != other.uniform_blocks {
            return Some("uniform blocks");
        }
        if self.images != other.images {
            return Some("images");
        }
        None
    }
}

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("spirv-cross reflection query failed: {0:?}")]
    Query(ErrorCode),
    #[error("uniform block member '{0}' has an unsupported type (use float, vec2..vec4 or mat4)")]
    UnsupportedUniformType(String),
    #[error("uniform '{0}' has a multi-dimensional array type")]
    MultiDimensionalArray(String),
    #[error("image '{0}' is multisampled, which is not supported")]
    MultisampledImage(String),
    #[error("image '{0}' has an unsupported dimension")]
    UnsupportedImageDim(String),
    #[error("image '{0}' has no type information in the SPIR-V blob")]
    MissingImageType(String),
    #[error("attribute slots do not form a dense sequence starting at 0")]
    SparseAttrSlots,
    #[error("failed to parse SPIR-V for image reflection: {0}")]
    SpirvParse(String),
}

impl From<ErrorCode> for ReflectError {
    fn from(code: ErrorCode) -> ReflectError {
        ReflectError::Query(code)
    }
}

pub fn round16(value: usize) -> usize {
    (value + 15) & !15
}

#[derive(Debug, Clone, Copy)]
struct ImageTypeInfo {
    dim: rspirv::spirv::Dim,
    arrayed: bool,
    multisampled: bool,
}

/// Image view dimensions per SPIR-V type id.
///
/// The `spirv_cross` binding does not expose image dimensionality, so the
/// blob is walked once for `OpTypeImage`/`OpTypeSampledImage` and the
/// resource's `base_type_id` is resolved against this table.
pub struct ImageTypeScan {
    infos: HashMap<u32, ImageTypeInfo>,
}

impl ImageTypeScan {
    pub fn scan(words: &[u32]) -> Result<ImageTypeScan, ReflectError> {
        let module = rspirv::dr::load_words(words)
            .map_err(|err| ReflectError::SpirvParse(format!("{:?}", err)))?;
        let mut infos: HashMap<u32, ImageTypeInfo> = HashMap::new();
        let mut sampled: Vec<(u32, u32)> = Vec::new();
        for inst in &module.types_global_values {
            match inst.class.opcode {
                rspirv::spirv::Op::TypeImage => {
                    // operands: sampled type, dim, depth, arrayed, ms, sampled, format
                    let result_id = match inst.result_id {
                        Some(id) => id,
                        None => continue,
                    };
                    let dim = match inst.operands.get(1) {
                        Some(rspirv::dr::Operand::Dim(dim)) => *dim,
                        _ => continue,
                    };
                    let arrayed =
                        matches!(inst.operands.get(3), Some(rspirv::dr::Operand::LiteralInt32(1)));
                    let multisampled =
                        matches!(inst.operands.get(4), Some(rspirv::dr::Operand::LiteralInt32(1)));
                    infos.insert(
                        result_id,
                        ImageTypeInfo {
                            dim,
                            arrayed,
                            multisampled,
                        },
                    );
                }
                rspirv::spirv::Op::TypeSampledImage => {
                    if let (Some(id), Some(rspirv::dr::Operand::IdRef(image_type))) =
                        (inst.result_id, inst.operands.first())
                    {
                        sampled.push((id, *image_type));
                    }
                }
                _ => {}
            }
        }
        for (sampled_id, image_type) in sampled {
            if let Some(info) = infos.get(&image_type).copied() {
                infos.insert(sampled_id, info);
            }
        }
        Ok(ImageTypeScan { infos })
    }

    fn lookup(&self, type_id: u32) -> Option<ImageTypeInfo> {
        self.infos.get(&type_id).copied()
    }
}

/// Extract the reflection for one translated shader from its cross-compiler
/// AST. Querying the same AST that generates the source keeps bindings
/// consistent with the emitted code.
pub fn reflect<T: Target>(
    ast: &mut Ast<T>,
    image_types: &ImageTypeScan,
    stage: ShaderStage,
) -> Result<Reflection, ReflectError>
where
    Ast<T>: Parse<T> + Compile<T>,
{
    let entry_point = ast.get_cleansed_entry_point_name(ENTRY_POINT, stage.execution_model())?;
    let resources = ast.get_shader_resources()?;

    let mut attrs = Vec::new();
    for resource in &resources.stage_inputs {
        let slot = ast.get_decoration(resource.id, Decoration::Location)?;
        attrs.push(Attr {
            slot,
            name: resource.name.clone(),
            sem_name: "TEXCOORD".to_string(),
            sem_index: slot,
        });
    }
    attrs.sort_by_key(|attr| attr.slot);
    for (index, attr) in attrs.iter().enumerate() {
        if attr.slot as usize != index {
            return Err(ReflectError::SparseAttrSlots);
        }
    }

    let mut uniform_blocks = Vec::new();
    for resource in &resources.uniform_buffers {
        let slot = ast.get_decoration(resource.id, Decoration::Binding)?;
        let declared_size = ast.get_declared_struct_size(resource.base_type_id)? as usize;
        let block_type = ast.get_type(resource.base_type_id)?;
        let member_types = match block_type {
            Type::Struct { member_types, .. } => member_types,
            _ => return Err(ReflectError::UnsupportedUniformType(resource.name.clone())),
        };
        let mut uniforms = Vec::new();
        for (member_index, member_type_id) in member_types.iter().enumerate() {
            let name = ast.get_member_name(resource.base_type_id, member_index as u32)?;
            let offset = ast.get_member_decoration(
                resource.base_type_id,
                member_index as u32,
                Decoration::Offset,
            )? as usize;
            let member_type = ast.get_type(*member_type_id)?;
            let (kind, array_count) = classify_member(&name, &member_type)?;
            uniforms.push(Uniform {
                name,
                kind,
                array_count,
                offset,
            });
        }
        uniform_blocks.push(UniformBlock {
            slot,
            byte_size: round16(declared_size),
            name: resource.name.clone(),
            uniforms,
        });
    }
    uniform_blocks.sort_by_key(|block| block.slot);

    let mut images = Vec::new();
    for resource in &resources.sampled_images {
        let slot = ast.get_decoration(resource.id, Decoration::Binding)?;
        let info = image_types
            .lookup(resource.base_type_id)
            .ok_or_else(|| ReflectError::MissingImageType(resource.name.clone()))?;
        if info.multisampled {
            return Err(ReflectError::MultisampledImage(resource.name.clone()));
        }
        let kind = match (info.dim, info.arrayed) {
            (rspirv::spirv::Dim::Dim2D, false) => ImageKind::Tex2D,
            (rspirv::spirv::Dim::Dim2D, true) => ImageKind::Array,
            (rspirv::spirv::Dim::Dim3D, false) => ImageKind::Tex3D,
            (rspirv::spirv::Dim::DimCube, false) => ImageKind::Cube,
            _ => return Err(ReflectError::UnsupportedImageDim(resource.name.clone())),
        };
        images.push(Image {
            slot,
            name: resource.name.clone(),
            kind,
        });
    }
    images.sort_by_key(|image| image.slot);

    Ok(Reflection {
        stage,
        entry_point,
        attrs,
        uniform_blocks,
        images,
    })
}

fn classify_member(name: &str, member_type: &Type) -> Result<(UniformKind, usize), ReflectError> {
    match member_type {
        Type::Float {
            vecsize,
            columns,
            array,
        } => {
            let array_count = match array.len() {
                0 => 1,
                1 => array[0] as usize,
                _ => return Err(ReflectError::MultiDimensionalArray(name.to_string())),
            };
            let kind = match (*columns, *vecsize) {
                (1, 1) => UniformKind::Float,
                (1, 2) => UniformKind::Float2,
                (1, 3) => UniformKind::Float3,
                (1, 4) => UniformKind::Float4,
                (4, 4) => UniformKind::Mat4,
                _ => return Err(ReflectError::UnsupportedUniformType(name.to_string())),
            };
            Ok((kind, array_count))
        }
        _ => Err(ReflectError::UnsupportedUniformType(name.to_string())),
    }
}
