/// Static triangle-mesh collider with an XZ spatial hash broad phase.
/// Built once from a model + world transform; queries resolve a sphere
/// out of penetration or cast a vertical ray for ground placement.
use std::collections::HashMap;

use glam::{Mat4, Vec3};
use log::debug;

use crate::assets::Model;

/// Result of a sphere-vs-mesh resolve. `normal` is the most upward-facing
/// push direction seen this call (points away from the surface).
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub hit: bool,
    pub normal: Vec3,
    pub penetration: f32,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            hit: false,
            normal: Vec3::Y,
            penetration: 0.0,
        }
    }
}

/// Result of a downward raycast.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub hit: bool,
    /// Ray parameter = vertical distance below `y_start`.
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl Default for RayHit {
    fn default() -> Self {
        Self {
            hit: false,
            t: 0.0,
            point: Vec3::ZERO,
            normal: Vec3::Y,
        }
    }
}

/// New sphere state returned by `resolve_sphere`: the pushed-out center,
/// the velocity with inward components removed (if one was supplied),
/// and the contact summary.
#[derive(Debug, Clone, Copy)]
pub struct SphereResolve {
    pub center: Vec3,
    pub velocity: Option<Vec3>,
    pub contact: Contact,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Grid cell side in world units. Too small duplicates triangles
    /// across many cells; too large degrades broad-phase selectivity.
    pub cell_size: f32,
    /// If true, triangles collide from both sides.
    pub two_sided: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            cell_size: 1.5,
            two_sided: false,
        }
    }
}

/// World-space triangle record: corners, unit face normal and the
/// precomputed XZ bounding box used by the cheap broad-phase reject.
struct Tri {
    a: Vec3,
    b: Vec3,
    c: Vec3,
    n: Vec3,
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
}

/// Closest point on triangle abc to point p
/// (Real-Time Collision Detection, Ericson 5.1.5: vertex, edge and face
/// regions checked in order).
fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    // Inside face region.
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Static triangle-mesh collider. Rebuilding after the source geometry
/// moves requires a full `build_from_model`; there is no incremental
/// update and no staleness signal.
#[derive(Default)]
pub struct TriangleMeshCollider {
    cell_size: f32,
    two_sided: bool,

    tris: Vec<Tri>,
    grid: HashMap<(i32, i32), Vec<u32>>,

    // Per-triangle "last visited" stamps de-duplicate candidates gathered
    // from multiple overlapping cells within one query. The monotonic
    // counter avoids re-zeroing the array every query.
    seen_stamp: Vec<u32>,
    query_stamp: u32,
    candidates: Vec<u32>,
}

impl TriangleMeshCollider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    #[inline]
    fn cell_for(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    /// Transform every mesh triangle to world space, drop degenerates,
    /// and index the rest into the XZ grid.
    pub fn build_from_model(&mut self, model: &Model, model_to_world: &Mat4, opt: &BuildOptions) {
        self.cell_size = if opt.cell_size > 1e-6 { opt.cell_size } else { 1.5 };
        self.two_sided = opt.two_sided;

        self.tris.clear();
        self.grid.clear();
        self.seen_stamp.clear();
        self.query_stamp = 0;

        let mesh = &model.mesh;
        if mesh.positions.is_empty() || mesh.indices.is_empty() {
            return;
        }

        self.tris.reserve(mesh.indices.len() / 3);

        let mut i = 0usize;
        while i + 2 < mesh.indices.len() {
            let i0 = mesh.indices[i] as usize;
            let i1 = mesh.indices[i + 1] as usize;
            let i2 = mesh.indices[i + 2] as usize;
            i += 3;

            if i0 >= mesh.positions.len()
                || i1 >= mesh.positions.len()
                || i2 >= mesh.positions.len()
            {
                continue;
            }

            let a = model_to_world.transform_point3(mesh.positions[i0]);
            let b = model_to_world.transform_point3(mesh.positions[i1]);
            let c = model_to_world.transform_point3(mesh.positions[i2]);

            let n = (b - a).cross(c - a);
            let n_len = n.length();
            if n_len <= 1e-10 {
                continue;
            }

            self.tris.push(Tri {
                a,
                b,
                c,
                n: n / n_len,
                min_x: a.x.min(b.x).min(c.x),
                max_x: a.x.max(b.x).max(c.x),
                min_z: a.z.min(b.z).min(c.z),
                max_z: a.z.max(b.z).max(c.z),
            });
        }

        self.seen_stamp.resize(self.tris.len(), 0);

        for (ti, t) in self.tris.iter().enumerate() {
            let (cx0, cz0) = self.cell_for(t.min_x, t.min_z);
            let (cx1, cz1) = self.cell_for(t.max_x, t.max_z);
            for cz in cz0..=cz1 {
                for cx in cx0..=cx1 {
                    self.grid.entry((cx, cz)).or_default().push(ti as u32);
                }
            }
        }

        debug!(
            "collider built: {} triangles in {} cells (cell size {})",
            self.tris.len(),
            self.grid.len(),
            self.cell_size
        );
    }

    /// Collect de-duplicated triangle indices from every cell overlapping
    /// the XZ square of half-extent `r` around (x, z).
    fn gather_candidates(&mut self, x: f32, z: f32, r: f32) {
        self.candidates.clear();

        self.query_stamp = self.query_stamp.wrapping_add(1);
        if self.query_stamp == 0 {
            // Counter wrapped; stale stamps could alias the new epoch.
            self.seen_stamp.fill(0);
            self.query_stamp = 1;
        }
        let stamp = self.query_stamp;

        let (cx0, cz0) = self.cell_for(x - r, z - r);
        let (cx1, cz1) = self.cell_for(x + r, z + r);
        for cz in cz0..=cz1 {
            for cx in cx0..=cx1 {
                let Some(cell) = self.grid.get(&(cx, cz)) else {
                    continue;
                };
                for &ti in cell {
                    let slot = &mut self.seen_stamp[ti as usize];
                    if *slot == stamp {
                        continue;
                    }
                    *slot = stamp;
                    self.candidates.push(ti);
                }
            }
        }
    }

    /// Push a sphere out of nearby triangles, up to `iterations` passes.
    ///
    /// Each pass resolves every penetrating candidate independently:
    /// the center moves out along the contact normal by the penetration
    /// depth, and the inward component of `velocity` (if supplied) is
    /// zeroed so the sphere slides along surfaces instead of bouncing.
    /// Resolving one triangle can re-penetrate another, hence the passes;
    /// a pass with no contact ends resolution early. Callers sub-step
    /// motion and call this after every sub-step.
    pub fn resolve_sphere(
        &mut self,
        center: Vec3,
        radius: f32,
        velocity: Option<Vec3>,
        iterations: u32,
    ) -> SphereResolve {
        let mut center = center;
        let mut velocity = velocity;
        let mut contact = Contact::default();

        if self.tris.is_empty() || radius <= 0.0 {
            return SphereResolve {
                center,
                velocity,
                contact,
            };
        }

        // Broad phase once, around the pre-resolve position.
        self.gather_candidates(center.x, center.z, radius);

        for _ in 0..iterations.max(1) {
            let mut any = false;
            let mut best_n = Vec3::Y;
            let mut best_pen = 0.0f32;

            for &ti in &self.candidates {
                let t = &self.tris[ti as usize];

                // Cheap XZ reject.
                if center.x + radius < t.min_x || center.x - radius > t.max_x {
                    continue;
                }
                if center.z + radius < t.min_z || center.z - radius > t.max_z {
                    continue;
                }

                // One-sided triangles only block approach from the
                // normal-facing side.
                if !self.two_sided {
                    let side = t.n.dot(center - t.a);
                    if side < -radius {
                        continue;
                    }
                }

                let cp = closest_point_on_triangle(center, t.a, t.b, t.c);
                let d = center - cp;
                let dist_sq = d.length_squared();
                if dist_sq >= radius * radius {
                    continue;
                }

                let dist = dist_sq.max(0.0).sqrt();
                // Near-zero distance: fall back to the face normal
                // rather than normalizing a vanishing direction.
                let n = if dist > 1e-6 { d / dist } else { t.n };
                let pen = radius - dist;

                center += n * pen;

                if let Some(v) = velocity.as_mut() {
                    let vn = v.dot(n);
                    if vn < 0.0 {
                        *v -= n * vn;
                    }
                }

                any = true;
                if pen > best_pen {
                    best_pen = pen;
                    best_n = n;
                }
            }

            if any {
                contact.hit = true;
                contact.normal = best_n;
                contact.penetration = contact.penetration.max(best_pen);
            } else {
                break;
            }
        }

        SphereResolve {
            center,
            velocity,
            contact,
        }
    }

    /// Cast a ray straight down from (x, y_start, z) and return the
    /// nearest triangle hit within `max_dist`. Pure query apart from the
    /// broad-phase scratch; mutates no geometry.
    pub fn raycast_down(&mut self, x: f32, z: f32, y_start: f32, max_dist: f32) -> RayHit {
        let mut best = RayHit::default();
        if self.tris.is_empty() || max_dist <= 0.0 {
            return best;
        }

        // Narrow the search to cells around the ray column.
        self.gather_candidates(x, z, 0.01);

        let ro = Vec3::new(x, y_start, z);
        let rd = Vec3::NEG_Y;

        for &ti in &self.candidates {
            let t = &self.tris[ti as usize];

            let denom = t.n.dot(rd);
            if denom.abs() < 1e-8 {
                continue;
            }
            // One-sided surfaces are only hit from their front side.
            if !self.two_sided && denom > 0.0 {
                continue;
            }

            let tval = t.n.dot(t.a - ro) / denom;
            if tval < 0.0 || tval > max_dist {
                continue;
            }

            let p = ro + rd * tval;

            // Inside test via the three edge half-spaces around the
            // triangle, oriented by its normal.
            if (t.b - t.a).cross(p - t.a).dot(t.n) < 0.0 {
                continue;
            }
            if (t.c - t.b).cross(p - t.b).dot(t.n) < 0.0 {
                continue;
            }
            if (t.a - t.c).cross(p - t.c).dot(t.n) < 0.0 {
                continue;
            }

            if !best.hit || tval < best.t {
                best.hit = true;
                best.t = tval;
                best.point = p;
                best.normal = t.n;
            }
        }

        best
    }
}
