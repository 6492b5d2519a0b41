/// Collision queries against static level geometry.
pub mod collider;

pub use collider::{BuildOptions, Contact, RayHit, SphereResolve, TriangleMeshCollider};
