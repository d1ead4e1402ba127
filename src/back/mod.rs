//! Back-end stages: GLSL to SPIR-V compilation, translation to the target
//! shading languages with reflection, optional native bytecode, and the
//! generated C header.

pub mod bytecode;
pub mod cross;
pub mod header;
pub mod reflect;
pub mod spirv;

pub use bytecode::{BytecodeBlob, BytecodeOutput};
pub use cross::{CrossOutput, CrossSource};
pub use reflect::{Attr, Image, ImageKind, Reflection, ShaderStage, Uniform, UniformBlock, UniformKind};
pub use spirv::{SpirvBlob, SpirvOutput};
