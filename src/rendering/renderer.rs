/// Mesh-to-framebuffer pipeline: clip-space triangle clipping against the
/// six view-volume planes, perspective division, screen-space barycentric
/// rasterization with a depth test, and perspective-correct texture
/// sampling with cutout/blend alpha handling.
use glam::{Mat4, Vec2, Vec4};

use crate::assets::{AlphaMode, Mesh};
use crate::camera::Camera;

use super::framebuffer::Framebuffer;
use super::texture::Texture;

// Each of the 6 clip planes can add at most one vertex to the polygon,
// so a clipped triangle never exceeds 9 vertices. 12 leaves headroom.
const MAX_POLY_VERTS: usize = 12;

/// Clip-space vertex carried through polygon clipping. UV is interpolated
/// alongside the position so attributes stay consistent across cuts.
#[derive(Copy, Clone, Default)]
struct ClipVert {
    clip: Vec4,
    uv: Vec2,
}

/// Post-divide vertex in screen space with pre-multiplied attributes
/// (`u/w`, `v/w`, `1/w`) for perspective-correct interpolation.
#[derive(Copy, Clone)]
struct ScreenVert {
    x: f32,
    y: f32,
    /// NDC z in [-1, 1], smaller = nearer.
    z: f32,
    u_over_w: f32,
    v_over_w: f32,
    inv_w: f32,
}

/// Signed-distance functions for the canonical clip volume
/// (-w<=x<=w, -w<=y<=w, -w<=z<=w); >= 0 is inside.
const CLIP_PLANES: [fn(Vec4) -> f32; 6] = [
    |c| c.x + c.w,
    |c| c.w - c.x,
    |c| c.y + c.w,
    |c| c.w - c.y,
    |c| c.z + c.w,
    |c| c.w - c.z,
];

/// Sutherland-Hodgman: clip a convex polygon against one plane.
/// Returns the number of vertices written to `output`.
fn clip_polygon_against_plane(
    input: &[ClipVert],
    dist_fn: fn(Vec4) -> f32,
    output: &mut [ClipVert; MAX_POLY_VERTS],
) -> usize {
    if input.is_empty() {
        return 0;
    }

    let mut out_len = 0usize;
    let mut prev = *input.last().unwrap();
    let mut prev_d = dist_fn(prev.clip);

    for &curr in input {
        let curr_d = dist_fn(curr.clip);
        let prev_in = prev_d >= 0.0;
        let curr_in = curr_d >= 0.0;

        if prev_in != curr_in {
            // Edge crosses the plane: emit the intersection point,
            // interpolating position and UV by the distance ratio.
            let denom = prev_d - curr_d;
            if denom != 0.0 {
                let t = prev_d / denom;
                output[out_len] = ClipVert {
                    clip: prev.clip + (curr.clip - prev.clip) * t,
                    uv: prev.uv + (curr.uv - prev.uv) * t,
                };
                out_len += 1;
            }
        }
        if curr_in {
            output[out_len] = curr;
            out_len += 1;
        }

        prev = curr;
        prev_d = curr_d;
    }

    out_len
}

/// Clip a triangle against all six view-volume planes.
/// Returns the clipped polygon and its vertex count (0 if fully outside).
fn clip_triangle(tri: [ClipVert; 3]) -> ([ClipVert; MAX_POLY_VERTS], usize) {
    let mut buf_a = [ClipVert::default(); MAX_POLY_VERTS];
    let mut buf_b = [ClipVert::default(); MAX_POLY_VERTS];
    buf_a[..3].copy_from_slice(&tri);
    let mut len = 3usize;

    let mut src = &mut buf_a;
    let mut dst = &mut buf_b;
    for dist_fn in CLIP_PLANES {
        len = clip_polygon_against_plane(&src[..len], dist_fn, dst);
        if len < 3 {
            return (*dst, 0);
        }
        std::mem::swap(&mut src, &mut dst);
    }

    (*src, len)
}

#[inline]
fn edge_fn(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (px - ax) * (by - ay) - (py - ay) * (bx - ax)
}

/// Source-over compositing of two packed ARGB colors using the source
/// alpha. The result is written back fully opaque.
#[inline]
fn blend_over(src: u32, dst: u32) -> u32 {
    let a = (src >> 24) & 0xFF;
    let inv = 255 - a;

    let r = (((src >> 16) & 0xFF) * a + ((dst >> 16) & 0xFF) * inv) / 255;
    let g = (((src >> 8) & 0xFF) * a + ((dst >> 8) & 0xFF) * inv) / 255;
    let b = ((src & 0xFF) * a + (dst & 0xFF) * inv) / 255;

    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/// Clip-space vertex cache produced by `Renderer::prepare_mesh` and
/// reused across the per-material draws of one mesh, so shared vertices
/// are transformed once per frame rather than once per primitive.
pub struct PreparedMesh<'m> {
    mesh: &'m Mesh,
    clip_positions: Vec<Vec4>,
    has_uv: bool,
}

/// Rasterizing renderer. Owns no geometry; borrows the render target
/// (color + depth pair) exclusively for the duration of a frame.
pub struct Renderer<'a> {
    fb: &'a mut Framebuffer,
}

impl<'a> Renderer<'a> {
    pub fn new(fb: &'a mut Framebuffer) -> Self {
        Self { fb }
    }

    /// Fill the color buffer and reset depth to +infinity. Call once
    /// before the first draw of a frame.
    pub fn clear(&mut self, argb: u32) {
        self.fb.clear(argb);
    }

    pub fn clear_with_depth(&mut self, argb: u32, z: f32) {
        self.fb.clear_with_depth(argb, z);
    }

    /// Transform every mesh position into clip space through
    /// `proj * view * model`. Pure; no buffer is touched.
    pub fn prepare_mesh<'m>(&self, mesh: &'m Mesh, model: &Mat4, camera: &Camera) -> PreparedMesh<'m> {
        let aspect = self.fb.width as f32 / self.fb.height as f32;
        let mvp = camera.projection_matrix(aspect) * camera.view_matrix() * *model;

        let clip_positions = mesh
            .positions
            .iter()
            .map(|p| mvp * p.extend(1.0))
            .collect();
        let has_uv = !mesh.uvs.is_empty() && mesh.uvs.len() == mesh.positions.len();

        PreparedMesh {
            mesh,
            clip_positions,
            has_uv,
        }
    }

    /// Prepare and draw in one call. Prefer `prepare_mesh` +
    /// `draw_textured_mesh_prepared` when a mesh is drawn with several
    /// materials.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_textured_mesh(
        &mut self,
        mesh: &Mesh,
        tex: &Texture,
        model: &Mat4,
        camera: &Camera,
        index_offset: u32,
        index_count: u32,
        double_sided: bool,
        front_face_ccw: bool,
        alpha_mode: AlphaMode,
        alpha_cutoff: f32,
    ) {
        let prepared = self.prepare_mesh(mesh, model, camera);
        self.draw_textured_mesh_prepared(
            &prepared,
            tex,
            index_offset,
            index_count,
            double_sided,
            front_face_ccw,
            alpha_mode,
            alpha_cutoff,
        );
    }

    /// Clip, cull, rasterize and composite one index range of a prepared
    /// mesh. `index_count == 0` means "the rest of the index buffer".
    /// Triangles with out-of-range indices are skipped, not an error.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_textured_mesh_prepared(
        &mut self,
        prepared: &PreparedMesh<'_>,
        tex: &Texture,
        index_offset: u32,
        index_count: u32,
        double_sided: bool,
        front_face_ccw: bool,
        alpha_mode: AlphaMode,
        alpha_cutoff: f32,
    ) {
        let mesh = prepared.mesh;
        let clip_pos = &prepared.clip_positions;

        let idx_base = index_offset as usize;
        if idx_base >= mesh.indices.len() {
            return;
        }
        let count = if index_count == 0 {
            mesh.indices.len() - idx_base
        } else {
            index_count as usize
        };
        let end = mesh.indices.len().min(idx_base + count);

        let mut i = idx_base;
        while i + 2 < end {
            let i0 = mesh.indices[i] as usize;
            let i1 = mesh.indices[i + 1] as usize;
            let i2 = mesh.indices[i + 2] as usize;
            i += 3;

            if i0 >= clip_pos.len() || i1 >= clip_pos.len() || i2 >= clip_pos.len() {
                continue;
            }

            let uv_of = |idx: usize| {
                if prepared.has_uv {
                    mesh.uvs[idx]
                } else {
                    Vec2::ZERO
                }
            };

            let tri = [
                ClipVert {
                    clip: clip_pos[i0],
                    uv: uv_of(i0),
                },
                ClipVert {
                    clip: clip_pos[i1],
                    uv: uv_of(i1),
                },
                ClipVert {
                    clip: clip_pos[i2],
                    uv: uv_of(i2),
                },
            ];

            let (poly, len) = clip_triangle(tri);
            if len < 3 {
                continue;
            }

            // Fan-triangulate the clipped polygon.
            for k in 1..len - 1 {
                self.raster_clipped_triangle(
                    poly[0],
                    poly[k],
                    poly[k + 1],
                    tex,
                    double_sided,
                    front_face_ccw,
                    alpha_mode,
                    alpha_cutoff,
                );
            }
        }
    }

    /// Perspective-divide, cull and rasterize one triangle whose vertices
    /// all lie inside the clip volume.
    #[allow(clippy::too_many_arguments)]
    fn raster_clipped_triangle(
        &mut self,
        a: ClipVert,
        b: ClipVert,
        c: ClipVert,
        tex: &Texture,
        double_sided: bool,
        front_face_ccw: bool,
        alpha_mode: AlphaMode,
        alpha_cutoff: f32,
    ) {
        if a.clip.w == 0.0 || b.clip.w == 0.0 || c.clip.w == 0.0 {
            return;
        }
        let inv_wa = 1.0 / a.clip.w;
        let inv_wb = 1.0 / b.clip.w;
        let inv_wc = 1.0 / c.clip.w;

        let ndc_a = a.clip.truncate() * inv_wa;
        let ndc_b = b.clip.truncate() * inv_wb;
        let ndc_c = c.clip.truncate() * inv_wc;

        // Backface cull by NDC signed area (y up). Positive area is CCW.
        if !double_sided {
            let area_ndc = (ndc_b.x - ndc_a.x) * (ndc_c.y - ndc_a.y)
                - (ndc_b.y - ndc_a.y) * (ndc_c.x - ndc_a.x);
            if front_face_ccw {
                if area_ndc <= 0.0 {
                    return;
                }
            } else if area_ndc >= 0.0 {
                return;
            }
        }

        let width = self.fb.width as f32;
        let height = self.fb.height as f32;
        let to_screen = |ndc: glam::Vec3, inv_w: f32, uv: Vec2| ScreenVert {
            // Pixel coordinates: origin top-left, y flipped.
            x: (ndc.x + 1.0) * 0.5 * width,
            y: (1.0 - ndc.y) * 0.5 * height,
            z: ndc.z,
            u_over_w: uv.x * inv_w,
            v_over_w: uv.y * inv_w,
            inv_w,
        };

        let sa = to_screen(ndc_a, inv_wa, a.uv);
        let sb = to_screen(ndc_b, inv_wb, b.uv);
        let sc = to_screen(ndc_c, inv_wc, c.uv);

        self.raster_triangle_textured(sa, sb, sc, tex, alpha_mode, alpha_cutoff);
    }

    fn raster_triangle_textured(
        &mut self,
        a: ScreenVert,
        b: ScreenVert,
        c: ScreenVert,
        tex: &Texture,
        alpha_mode: AlphaMode,
        alpha_cutoff: f32,
    ) {
        // Screen-space bounding box, clamped to the framebuffer.
        let min_x = (a.x.min(b.x).min(c.x).floor() as i32).max(0);
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i32).min(self.fb.width as i32 - 1);
        let min_y = (a.y.min(b.y).min(c.y).floor() as i32).max(0);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i32).min(self.fb.height as i32 - 1);
        if min_x > max_x || min_y > max_y {
            return;
        }

        let area = edge_fn(a.x, a.y, b.x, b.y, c.x, c.y);
        if area.abs() < f32::EPSILON {
            return;
        }
        let inv_area = 1.0 / area;

        // Edge-function deltas for incremental stepping across the box.
        let e0_dx = c.y - b.y;
        let e0_dy = b.x - c.x;
        let e1_dx = a.y - c.y;
        let e1_dy = c.x - a.x;
        let e2_dx = b.y - a.y;
        let e2_dy = a.x - b.x;

        let start_x = min_x as f32 + 0.5;
        let start_y = min_y as f32 + 0.5;
        let mut w0_row = edge_fn(b.x, b.y, c.x, c.y, start_x, start_y);
        let mut w1_row = edge_fn(c.x, c.y, a.x, a.y, start_x, start_y);
        let mut w2_row = edge_fn(a.x, a.y, b.x, b.y, start_x, start_y);

        for y in min_y..=max_y {
            let mut w0 = w0_row;
            let mut w1 = w1_row;
            let mut w2 = w2_row;

            for x in min_x..=max_x {
                // A pixel is inside when all edge functions share the
                // sign of the total area; this covers both windings
                // without a per-orientation branch.
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };

                if inside {
                    let alpha = w0 * inv_area;
                    let beta = w1 * inv_area;
                    let gamma = w2 * inv_area;

                    let z = alpha * a.z + beta * b.z + gamma * c.z;
                    let index = y as usize * self.fb.width + x as usize;

                    // Strictly-nearer depth test against the pair buffer.
                    if z < self.fb.depth[index] {
                        let inv_w =
                            alpha * a.inv_w + beta * b.inv_w + gamma * c.inv_w;
                        if inv_w != 0.0 {
                            let u = (alpha * a.u_over_w
                                + beta * b.u_over_w
                                + gamma * c.u_over_w)
                                / inv_w;
                            let v = (alpha * a.v_over_w
                                + beta * b.v_over_w
                                + gamma * c.v_over_w)
                                / inv_w;

                            let argb = tex.sample_repeat(u, v);
                            match alpha_mode {
                                AlphaMode::Opaque => {
                                    self.fb.color[index] = argb;
                                    self.fb.depth[index] = z;
                                }
                                AlphaMode::Mask => {
                                    let texel_alpha = ((argb >> 24) & 0xFF) as f32 / 255.0;
                                    if texel_alpha >= alpha_cutoff {
                                        self.fb.color[index] = argb;
                                        self.fb.depth[index] = z;
                                    }
                                }
                                AlphaMode::Blend => {
                                    self.fb.color[index] =
                                        blend_over(argb, self.fb.color[index]);
                                    self.fb.depth[index] = z;
                                }
                            }
                        }
                    }
                }

                w0 += e0_dx;
                w1 += e1_dx;
                w2 += e2_dx;
            }

            w0_row += e0_dy;
            w1_row += e1_dy;
            w2_row += e2_dy;
        }
    }
}
