pub mod anim;
pub mod assets;
pub mod camera;
pub mod physics;
/// Mesh Engine - software renderer and collision core for a
/// third-person platformer. No GPU, no external rasterizer.
pub mod rendering;

pub use anim::{AnimationClip, Joint, Skeleton, SkinInfluence, SkinnedModel, Trs};
pub use assets::{AlphaMode, Material, Mesh, Model, Primitive};
pub use camera::{Camera, Frustum};
pub use physics::{BuildOptions, Contact, RayHit, SphereResolve, TriangleMeshCollider};
pub use rendering::{Framebuffer, PreparedMesh, Renderer, Texture};
