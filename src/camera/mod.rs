/// Camera and view-frustum types.
/// The camera is transient: game code rebuilds it every frame from player
/// state, and the renderer derives view/projection matrices from it.
use glam::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60.0f32.to_radians(),
            z_near: 0.1,
            z_far: 200.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection with the GL clip convention: NDC z in [-1, 1],
    /// smaller is nearer. The clipper and depth test assume this.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, aspect, self.z_near, self.z_far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// View frustum as 6 planes in Hessian normal form (xyz = normal, w = d).
/// A point p is inside a plane when dot(n, p) + d >= 0.
/// Used only for coarse whole-object culling; pixel-accurate clipping
/// happens in clip space inside the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Order: left, right, bottom, top, near, far.
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix
    /// (Gribb-Hartmann). Inside is -w<=x<=w, -w<=y<=w, -w<=z<=w.
    pub fn from_view_proj(vp: &Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let planes = [
            Self::normalize_plane(row3 + row0), // left:   x + w >= 0
            Self::normalize_plane(row3 - row0), // right: -x + w >= 0
            Self::normalize_plane(row3 + row1), // bottom: y + w >= 0
            Self::normalize_plane(row3 - row1), // top:   -y + w >= 0
            Self::normalize_plane(row3 + row2), // near:   z + w >= 0
            Self::normalize_plane(row3 - row2), // far:   -z + w >= 0
        ];

        Self { planes }
    }

    #[inline]
    fn normalize_plane(plane: Vec4) -> Vec4 {
        let normal_length = plane.truncate().length();
        if normal_length > 1e-4 {
            plane / normal_length
        } else {
            plane
        }
    }

    /// Test a bounding sphere against all 6 planes.
    /// Returns true if the sphere is at least partially inside.
    pub fn sphere_visible(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            let dist = plane.truncate().dot(center) + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        // Default camera at (0,0,3) looking down -Z toward the origin.
        Camera::default()
    }

    #[test]
    fn frustum_culls_sphere_behind_camera() {
        let camera = test_camera();
        let frustum = Frustum::from_view_proj(&camera.view_projection(16.0 / 9.0));

        assert!(
            frustum.sphere_visible(Vec3::new(0.0, 0.0, -5.0), 1.0),
            "sphere in front of camera should be visible"
        );
        assert!(
            !frustum.sphere_visible(Vec3::new(0.0, 0.0, 20.0), 1.0),
            "sphere behind camera should be culled"
        );
    }

    #[test]
    fn frustum_keeps_sphere_straddling_a_plane() {
        let camera = test_camera();
        let frustum = Frustum::from_view_proj(&camera.view_projection(1.0));

        // Far off to the left, but with a radius large enough to poke
        // back into the frustum.
        let center = Vec3::new(-30.0, 0.0, -10.0);
        assert!(!frustum.sphere_visible(center, 0.5));
        assert!(frustum.sphere_visible(center, 40.0));
    }

    #[test]
    fn projection_uses_gl_depth_range() {
        let camera = test_camera();
        let proj = camera.projection_matrix(1.0);

        // A point on the near plane maps to NDC z = -1, far plane to +1.
        let near = proj * Vec3::new(0.0, 0.0, -camera.z_near).extend(1.0);
        let far = proj * Vec3::new(0.0, 0.0, -camera.z_far).extend(1.0);
        assert!((near.z / near.w + 1.0).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-3);
    }
}
