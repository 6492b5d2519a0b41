pub mod framebuffer;
/// Software rasterization pipeline: clip-space clipping, perspective
/// division, depth-tested barycentric rasterization, textured shading.
pub mod renderer;
pub mod texture;

pub use framebuffer::{rgb_to_argb, rgba_to_argb, Framebuffer};
pub use renderer::{PreparedMesh, Renderer};
pub use texture::{checkerboard, solid, Texture};
