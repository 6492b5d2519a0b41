/// CPU skeletal animation: clip sampling and linear blend skinning.
/// The renderer never sees skeletons; skinning overwrites
/// `model.mesh.positions` in place once per frame, before the mesh is
/// prepared for drawing.
use glam::{Mat4, Quat, Vec3};

use crate::assets::Model;

/// Translation / rotation / scale, the local pose of one joint.
#[derive(Debug, Clone, Copy)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Trs {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Componentwise interpolation (slerp for the rotation).
    pub fn lerp(a: &Trs, b: &Trs, t: f32) -> Trs {
        Trs {
            translation: a.translation.lerp(b.translation, t),
            rotation: a.rotation.slerp(b.rotation, t),
            scale: a.scale.lerp(b.scale, t),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Joint {
    pub name: String,
    /// Index into `Skeleton::joints`; -1 = root. Parents always precede
    /// their children in the joint array.
    pub parent: i32,
    pub rest_local: Trs,
    /// Inverse bind matrix in mesh-geometry space. Identity for joints
    /// that are not part of the skin.
    pub inv_bind: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

/// Up to four joint influences per vertex, weights summing to ~1.
#[derive(Debug, Clone, Copy)]
pub struct SkinInfluence {
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

impl Default for SkinInfluence {
    fn default() -> Self {
        Self {
            joints: [0; 4],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Fixed-rate sampled animation, frame-major:
/// `samples[frame * num_joints + joint]`.
#[derive(Debug, Clone, Default)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub sample_rate: f32,
    pub num_joints: u32,
    pub samples: Vec<Trs>,
}

impl AnimationClip {
    pub fn num_frames(&self) -> u32 {
        if self.num_joints == 0 {
            0
        } else {
            (self.samples.len() as u32) / self.num_joints
        }
    }

    /// Sample one joint's local pose at time `t` (seconds), looping over
    /// the clip duration and interpolating between adjacent frames.
    /// Falls back to `fallback` (normally the rest pose) when the clip
    /// has no data for this joint.
    pub fn sample_joint(&self, joint: u32, t: f32, fallback: &Trs) -> Trs {
        if self.num_joints == 0 || joint >= self.num_joints {
            return *fallback;
        }
        let frames = self.num_frames();
        if frames == 0 || self.samples.is_empty() {
            return *fallback;
        }

        if self.duration <= 0.0 || self.sample_rate <= 0.0 {
            // Static pose: first frame.
            return self.samples[joint as usize];
        }

        // Loop.
        let mut lt = t % self.duration;
        if lt < 0.0 {
            lt += self.duration;
        }

        let f = lt * self.sample_rate;
        let mut i0 = f.floor() as u32;
        let mut i1 = i0 + 1;
        let frac = f - i0 as f32;

        if i0 >= frames {
            i0 = frames - 1;
        }
        if i1 >= frames {
            i1 = frames - 1;
        }

        let a = &self.samples[(i0 * self.num_joints + joint) as usize];
        let b = &self.samples[(i1 * self.num_joints + joint) as usize];
        Trs::lerp(a, b, frac)
    }
}

/// A deformable model plus everything needed to pose it: bind-pose
/// positions (the skinning source), per-vertex influences and the joint
/// hierarchy. `model.mesh.positions` holds the current deformed pose.
#[derive(Debug, Clone, Default)]
pub struct SkinnedModel {
    pub model: Model,
    /// Bind-pose positions, parallel to `model.mesh.positions`.
    pub bind_positions: Vec<Vec3>,
    /// Parallel to `model.mesh.positions`.
    pub influences: Vec<SkinInfluence>,
    pub skeleton: Skeleton,
    /// Maps skin matrices from skeleton space back into mesh-geometry
    /// space (inverse of the mesh node's bind-pose transform).
    pub world_to_model: Mat4,
}

/// Linear blend skinning: pose the skeleton from `clip` at `time` and
/// rewrite `model.mesh.positions` in place. A model whose parallel
/// arrays do not line up is left untouched.
pub fn skin(skinned: &mut SkinnedModel, clip: &AnimationClip, time: f32) {
    let n = skinned.model.mesh.positions.len();
    if skinned.bind_positions.len() != n || skinned.influences.len() != n {
        return;
    }
    let joints = skinned.skeleton.joints.len();
    if joints == 0 {
        return;
    }

    // Local pose per joint (clip if available, else rest), accumulated
    // down the hierarchy. Parents precede children, so one pass suffices.
    let mut global = vec![Mat4::IDENTITY; joints];
    for j in 0..joints {
        let sj = &skinned.skeleton.joints[j];
        let local = clip.sample_joint(j as u32, time, &sj.rest_local).to_mat4();
        global[j] = if sj.parent >= 0 {
            global[sj.parent as usize] * local
        } else {
            local
        };
    }

    let skin_mats: Vec<Mat4> = (0..joints)
        .map(|j| skinned.world_to_model * global[j] * skinned.skeleton.joints[j].inv_bind)
        .collect();

    for i in 0..n {
        let inf = &skinned.influences[i];
        let p = skinned.bind_positions[i];

        let mut out = Vec3::ZERO;
        for k in 0..4 {
            let w = inf.weights[k];
            if w <= 0.0 {
                continue;
            }
            let j = inf.joints[k] as usize;
            if j >= joints {
                continue;
            }
            out += skin_mats[j].transform_point3(p) * w;
        }
        skinned.model.mesh.positions[i] = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Mesh;

    fn single_joint_model(positions: Vec<Vec3>) -> SkinnedModel {
        let n = positions.len();
        SkinnedModel {
            model: Model {
                mesh: Mesh {
                    positions: positions.clone(),
                    ..Default::default()
                },
                ..Default::default()
            },
            bind_positions: positions,
            influences: vec![SkinInfluence::default(); n],
            skeleton: Skeleton {
                joints: vec![Joint::default()],
            },
            world_to_model: Mat4::IDENTITY,
        }
    }

    #[test]
    fn rest_pose_preserves_positions() {
        let positions = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0)];
        let mut m = single_joint_model(positions.clone());

        // Empty clip falls back to the rest pose (identity).
        skin(&mut m, &AnimationClip::default(), 0.0);
        for (got, want) in m.model.mesh.positions.iter().zip(&positions) {
            assert!((*got - *want).length() < 1e-6);
        }
    }

    #[test]
    fn translated_joint_moves_vertices() {
        let mut m = single_joint_model(vec![Vec3::ZERO, Vec3::X]);
        let clip = AnimationClip {
            duration: 0.0,
            sample_rate: 0.0,
            num_joints: 1,
            samples: vec![Trs {
                translation: Vec3::new(0.0, 5.0, 0.0),
                ..Default::default()
            }],
            ..Default::default()
        };

        skin(&mut m, &clip, 0.0);
        assert!((m.model.mesh.positions[0] - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-6);
        assert!((m.model.mesh.positions[1] - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn clip_sampling_interpolates_and_loops() {
        let frame = |y: f32| Trs {
            translation: Vec3::new(0.0, y, 0.0),
            ..Default::default()
        };
        let clip = AnimationClip {
            duration: 2.0,
            sample_rate: 1.0, // 1 frame per second
            num_joints: 1,
            samples: vec![frame(0.0), frame(2.0)],
            ..Default::default()
        };

        let rest = Trs::default();
        // Halfway between the two frames.
        let mid = clip.sample_joint(0, 0.5, &rest);
        assert!((mid.translation.y - 1.0).abs() < 1e-6);

        // Looping: t = duration wraps back to frame 0.
        let wrapped = clip.sample_joint(0, 2.0, &rest);
        assert!(wrapped.translation.y.abs() < 1e-6);
    }

    #[test]
    fn mismatched_parallel_arrays_leave_mesh_untouched() {
        let mut m = single_joint_model(vec![Vec3::X, Vec3::Y]);
        m.influences.pop();

        let before = m.model.mesh.positions.clone();
        skin(&mut m, &AnimationClip::default(), 0.0);
        assert_eq!(m.model.mesh.positions, before);
    }
}
