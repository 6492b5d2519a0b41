/// Integration tests for the triangle-mesh collider: broad-phase
/// gathering, sphere push-out, velocity projection and downward raycasts.
use glam::{Mat4, Vec3};
use mesh_engine::*;

/// Two triangles spanning [-half, half]^2 at height `y`, facing +Y.
fn floor_model(half: f32, y: f32) -> Model {
    Model {
        mesh: Mesh {
            positions: vec![
                Vec3::new(-half, y, -half),
                Vec3::new(half, y, -half),
                Vec3::new(half, y, half),
                Vec3::new(-half, y, half),
            ],
            uvs: Vec::new(),
            indices: vec![0, 2, 1, 0, 3, 2],
        },
        ..Default::default()
    }
}

/// Unit square [0,1]^2 at height `y` (two triangles, facing +Y).
fn unit_quad_model(y: f32) -> Model {
    Model {
        mesh: Mesh {
            positions: vec![
                Vec3::new(0.0, y, 0.0),
                Vec3::new(1.0, y, 0.0),
                Vec3::new(1.0, y, 1.0),
                Vec3::new(0.0, y, 1.0),
            ],
            uvs: Vec::new(),
            indices: vec![0, 2, 1, 0, 3, 2],
        },
        ..Default::default()
    }
}

fn build(model: &Model) -> TriangleMeshCollider {
    let mut col = TriangleMeshCollider::new();
    col.build_from_model(model, &Mat4::IDENTITY, &BuildOptions::default());
    col
}

#[test]
fn sphere_push_out_converges_on_flat_floor() {
    // Sphere of radius 0.5 at (0, 0.1, 0): penetrating the floor by 0.4.
    let mut col = build(&floor_model(10.0, 0.0));
    let resolved = col.resolve_sphere(Vec3::new(0.0, 0.1, 0.0), 0.5, None, 3);

    assert!(resolved.contact.hit);
    assert!(
        (resolved.center.y - 0.5).abs() < 1e-4,
        "center.y = {}",
        resolved.center.y
    );
    assert!(
        (resolved.contact.normal - Vec3::Y).length() < 1e-4,
        "normal = {:?}",
        resolved.contact.normal
    );
    assert!((resolved.contact.penetration - 0.4).abs() < 1e-4);

    // A second call starts clean: no contact, no movement.
    let again = col.resolve_sphere(resolved.center, 0.5, None, 3);
    assert!(!again.contact.hit);
    assert_eq!(again.center, resolved.center);
    assert_eq!(again.contact.penetration, 0.0);
}

#[test]
fn sphere_resolve_reports_most_upward_normal() {
    // Floor plus a vertical wall; a sphere pressed into the corner
    // touches both, and the returned normal must be the ground's.
    let mut model = floor_model(10.0, 0.0);
    let base = model.mesh.positions.len() as u32;
    // Wall at x = 1, facing -X (toward the sphere).
    model.mesh.positions.extend_from_slice(&[
        Vec3::new(1.0, -1.0, -4.0),
        Vec3::new(1.0, -1.0, 4.0),
        Vec3::new(1.0, 3.0, 4.0),
        Vec3::new(1.0, 3.0, -4.0),
    ]);
    model
        .mesh
        .indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);

    let mut col = build(&model);
    let resolved = col.resolve_sphere(Vec3::new(0.8, 0.3, 0.0), 0.5, None, 4);

    assert!(resolved.contact.hit);
    assert!(
        resolved.contact.normal.y > 0.9,
        "expected the ground normal to win, got {:?}",
        resolved.contact.normal
    );
    // Pushed up out of the floor and away from the wall.
    assert!((resolved.center.y - 0.5).abs() < 1e-3);
    assert!(resolved.center.x < 0.5 + 1e-3);
}

#[test]
fn sliding_keeps_tangential_velocity() {
    let mut col = build(&floor_model(10.0, 0.0));
    let vel = Vec3::new(3.0, -5.0, 1.0);
    let resolved = col.resolve_sphere(Vec3::new(0.0, 0.2, 0.0), 0.5, Some(vel), 3);

    let v = resolved.velocity.unwrap();
    assert!(v.y.abs() < 1e-5, "inward (downward) component zeroed");
    assert!((v.x - 3.0).abs() < 1e-5 && (v.z - 1.0).abs() < 1e-5);
}

#[test]
fn sloped_contact_normal_matches_ramp() {
    // 45-degree ramp: y = x plane over x in [-4, 4].
    let model = Model {
        mesh: Mesh {
            positions: vec![
                Vec3::new(-4.0, -4.0, -4.0),
                Vec3::new(4.0, 4.0, -4.0),
                Vec3::new(4.0, 4.0, 4.0),
                Vec3::new(-4.0, -4.0, 4.0),
            ],
            uvs: Vec::new(),
            indices: vec![0, 2, 1, 0, 3, 2],
        },
        ..Default::default()
    };
    let mut col = build(&model);

    // Start just inside the ramp surface at the origin.
    let resolved = col.resolve_sphere(Vec3::new(0.0, 0.3, 0.0), 0.5, None, 4);
    assert!(resolved.contact.hit);

    let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();
    assert!(
        (resolved.contact.normal - expected).length() < 1e-3,
        "normal = {:?}",
        resolved.contact.normal
    );
}

#[test]
fn substepped_drop_settles_on_the_ground() {
    // Gravity integration the way the game loop drives it: small
    // position increments, resolve after each one.
    let mut col = build(&floor_model(20.0, 0.0));

    let radius = 0.5;
    let mut pos = Vec3::new(0.0, 5.0, 0.0);
    let mut vel = Vec3::ZERO;
    let dt = 1.0 / 240.0;

    for _ in 0..2400 {
        vel.y -= 18.0 * dt;
        pos += vel * dt;
        let resolved = col.resolve_sphere(pos, radius, Some(vel), 3);
        pos = resolved.center;
        vel = resolved.velocity.unwrap();
    }

    assert!(
        (pos.y - radius).abs() < 1e-3,
        "sphere should rest exactly one radius above the floor, y = {}",
        pos.y
    );
    assert!(vel.y.abs() < 1e-3);
}

#[test]
fn raycast_down_hits_unit_quad() {
    let mut col = build(&unit_quad_model(2.0));

    let hit = col.raycast_down(0.5, 0.5, 10.0, 100.0);
    assert!(hit.hit);
    assert!((hit.t - 8.0).abs() < 1e-4, "t = {}", hit.t);
    assert!((hit.point - Vec3::new(0.5, 2.0, 0.5)).length() < 1e-4);
    assert!((hit.normal - Vec3::Y).length() < 1e-4);
}

#[test]
fn raycast_down_misses_outside_quad_extent() {
    let mut col = build(&unit_quad_model(2.0));

    assert!(!col.raycast_down(1.5, 0.5, 10.0, 100.0).hit);
    assert!(!col.raycast_down(0.5, -0.5, 10.0, 100.0).hit);
    // Within extent but out of reach.
    assert!(!col.raycast_down(0.5, 0.5, 10.0, 4.0).hit);
    // Starting below the quad: a downward ray never reaches it.
    assert!(!col.raycast_down(0.5, 0.5, 1.0, 100.0).hit);
}

#[test]
fn raycast_down_returns_nearest_of_stacked_floors() {
    let mut model = unit_quad_model(1.0);
    let lower = unit_quad_model(-2.0);
    let base = model.mesh.positions.len() as u32;
    model.mesh.positions.extend_from_slice(&lower.mesh.positions);
    model
        .mesh
        .indices
        .extend(lower.mesh.indices.iter().map(|i| i + base));

    let mut col = build(&model);
    let hit = col.raycast_down(0.5, 0.5, 10.0, 100.0);
    assert!(hit.hit);
    assert!((hit.t - 9.0).abs() < 1e-4, "nearest surface wins, t = {}", hit.t);
}

#[test]
fn world_transform_is_applied_at_build_time() {
    // Same floor, but lifted 3 units by the model-to-world transform.
    let mut col = TriangleMeshCollider::new();
    col.build_from_model(
        &floor_model(5.0, 0.0),
        &Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)),
        &BuildOptions::default(),
    );

    let hit = col.raycast_down(0.0, 0.0, 10.0, 100.0);
    assert!(hit.hit);
    assert!((hit.point.y - 3.0).abs() < 1e-4);

    let resolved = col.resolve_sphere(Vec3::new(0.0, 3.1, 0.0), 0.5, None, 3);
    assert!(resolved.contact.hit);
    assert!((resolved.center.y - 3.5).abs() < 1e-4);
}

#[test]
fn coarse_and_fine_grids_agree() {
    // Broad-phase cell size must not change narrow-phase results.
    let model = floor_model(12.0, 0.0);
    let mut results = Vec::new();
    for cell_size in [0.25f32, 1.5, 8.0] {
        let mut col = TriangleMeshCollider::new();
        col.build_from_model(
            &model,
            &Mat4::IDENTITY,
            &BuildOptions {
                cell_size,
                ..Default::default()
            },
        );
        let resolved = col.resolve_sphere(Vec3::new(3.3, 0.2, -2.7), 0.5, None, 3);
        results.push(resolved.center);
    }

    for pair in results.windows(2) {
        assert!(
            (pair[0] - pair[1]).length() < 1e-5,
            "cell size changed the resolve result: {results:?}"
        );
    }
}
