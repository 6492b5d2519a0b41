/// Demo: a small third-person platformer on a procedurally generated
/// level. Everything on screen is rasterized in software; the player
/// sphere is kept out of the level mesh by the triangle collider.
use glam::{Mat4, Vec2, Vec3};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use mesh_engine::rendering::{checkerboard, rgb_to_argb, rgba_to_argb, solid};
use mesh_engine::*;
use noise::{NoiseFn, Perlin};
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

const MOVE_SPEED: f32 = 6.0;
const SPRINT_MUL: f32 = 1.6;
const JUMP_SPEED: f32 = 7.5;
const GRAVITY: f32 = 18.0;
const PLAYER_RADIUS: f32 = 0.5;
/// Contacts with normal.y above this count as ground.
const GROUND_NORMAL_Y: f32 = 0.6;
const MAX_DT: f32 = 0.1;
const MAX_SUBSTEPS: u32 = 8;
const MIN_SUBSTEP: f32 = 0.05;

struct Player {
    pos: Vec3,
    vel: Vec3,
    yaw: f32,
    pitch: f32,
    grounded: bool,
}

#[derive(Default)]
struct InputState {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    jump: bool,
    sprint: bool,
}

struct Entity {
    model_index: usize,
    transform: Mat4,
}

fn main() {
    env_logger::init();

    println!("=== Mesh Engine - Software Renderer ===");
    println!("Controls:");
    println!("  WASD - Move");
    println!("  Space - Jump");
    println!("  Shift - Sprint");
    println!("  Mouse (click to capture) - Look");
    println!("  ESC - Release mouse / Exit");
    println!();

    let event_loop = EventLoop::new().unwrap();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Mesh Engine")
            .with_inner_size(winit::dpi::LogicalSize::new(960, 540))
            .build(&event_loop)
            .unwrap(),
    );

    let context = softbuffer::Context::new(window.clone()).unwrap();
    let mut surface = softbuffer::Surface::new(&context, window.clone()).unwrap();

    let window_size = window.inner_size();
    let mut framebuffer = Framebuffer::new(window_size.width as usize, window_size.height as usize);

    // Level + player models, shared via index into this list.
    println!("Generating level...");
    let gen_start = Instant::now();
    let models = vec![build_level(), build_player_model()];
    println!("Level generation: {:.2?}", gen_start.elapsed());

    // Static world collider from the level mesh.
    let mut collider = TriangleMeshCollider::new();
    collider.build_from_model(&models[0], &Mat4::IDENTITY, &BuildOptions::default());
    println!("Collider: {} triangles", collider.triangle_count());

    let mut entities = vec![
        Entity {
            model_index: 0,
            transform: Mat4::IDENTITY,
        },
        Entity {
            model_index: 1,
            transform: Mat4::IDENTITY,
        },
    ];
    let player_entity = 1usize;

    // Snap the spawn point onto the ground.
    let spawn = collider.raycast_down(0.0, 0.0, 50.0, 100.0);
    let spawn_y = if spawn.hit { spawn.point.y } else { 0.0 };
    let mut player = Player {
        pos: Vec3::new(0.0, spawn_y + PLAYER_RADIUS, 0.0),
        vel: Vec3::ZERO,
        yaw: 0.0,
        pitch: -0.2,
        grounded: false,
    };

    let mut input = InputState::default();
    let mut mouse_captured = false;
    let mut last_mouse_pos: Option<(f64, f64)> = None;

    let mut last_frame = Instant::now();
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        elwt.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        framebuffer.resize(new_size.width as usize, new_size.height as usize);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let pressed = event.state == ElementState::Pressed;

                        if let PhysicalKey::Code(keycode) = event.physical_key {
                            match keycode {
                                KeyCode::KeyW => input.forward = pressed,
                                KeyCode::KeyS => input.backward = pressed,
                                KeyCode::KeyA => input.left = pressed,
                                KeyCode::KeyD => input.right = pressed,
                                KeyCode::Space => input.jump = pressed,
                                KeyCode::ShiftLeft | KeyCode::ShiftRight => {
                                    input.sprint = pressed
                                }
                                KeyCode::Escape if pressed => {
                                    if mouse_captured {
                                        mouse_captured = false;
                                        let _ = window.set_cursor_visible(true);
                                    } else {
                                        elwt.exit();
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left && state == ElementState::Pressed {
                            mouse_captured = true;
                            let _ = window.set_cursor_visible(false);
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_captured {
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.0) as f32;
                                let dy = (position.y - last_pos.1) as f32;
                                player.yaw += dx * 0.0025;
                                player.pitch = (player.pitch - dy * 0.0025).clamp(-1.0, 0.8);
                            }
                        }
                        last_mouse_pos = Some((position.x, position.y));
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = (now - last_frame).as_secs_f32().min(MAX_DT);
                        last_frame = now;

                        step_player(&mut player, &input, &mut collider, dt);

                        // Player physics tracks the sphere center; the
                        // render mesh sits with its base at the ground.
                        entities[player_entity].transform =
                            Mat4::from_translation(player.pos - Vec3::Y * PLAYER_RADIUS)
                                * Mat4::from_rotation_y(player.yaw);

                        let camera = third_person_camera(&player);
                        render_game(&mut framebuffer, &camera, &models, &entities);

                        surface
                            .resize(
                                NonZeroU32::new(framebuffer.width as u32).unwrap(),
                                NonZeroU32::new(framebuffer.height as u32).unwrap(),
                            )
                            .unwrap();
                        let mut buffer = surface.buffer_mut().unwrap();
                        buffer.copy_from_slice(&framebuffer.color);
                        buffer.present().unwrap();

                        frame_count += 1;
                        if fps_timer.elapsed().as_secs() >= 1 {
                            println!(
                                "FPS: {} | pos: ({:.1}, {:.1}, {:.1}) | grounded: {}",
                                frame_count, player.pos.x, player.pos.y, player.pos.z,
                                player.grounded
                            );
                            frame_count = 0;
                            fps_timer = Instant::now();
                        }

                        window.request_redraw();
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .unwrap();
}

/// Advance the player one frame: arcade-style horizontal movement,
/// gravity, jumping, and sub-stepped collision resolution so fast motion
/// cannot tunnel through thin geometry.
fn step_player(player: &mut Player, input: &InputState, collider: &mut TriangleMeshCollider, dt: f32) {
    // Ground-plane basis from yaw.
    let (sy, cy) = player.yaw.sin_cos();
    let forward = Vec3::new(sy, 0.0, cy);
    let right = Vec3::Y.cross(forward).normalize();

    let mut wish = Vec3::ZERO;
    if input.forward {
        wish += forward;
    }
    if input.backward {
        wish -= forward;
    }
    if input.right {
        wish += right;
    }
    if input.left {
        wish -= right;
    }
    let wish = wish.normalize_or_zero();

    let mut speed = MOVE_SPEED;
    if input.sprint {
        speed *= SPRINT_MUL;
    }
    player.vel.x = wish.x * speed;
    player.vel.z = wish.z * speed;
    let move_mag = (player.vel.x * player.vel.x + player.vel.z * player.vel.z).sqrt();

    let jumped = input.jump && player.grounded;
    if jumped {
        player.vel.y = JUMP_SPEED;
        player.grounded = false;
    }
    player.vel.y -= GRAVITY * dt;

    // Sub-step so each increment is bounded by the sphere radius.
    let max_step = MIN_SUBSTEP.max(PLAYER_RADIUS * 0.5);
    let travel = player.vel.length() * dt;
    let steps = ((travel / max_step).ceil() as u32).clamp(1, MAX_SUBSTEPS);
    let sdt = dt / steps as f32;

    // Most ground-like contact normal seen this frame.
    let mut best_ny = -1.0f32;
    let mut best_n = Vec3::Y;

    for _ in 0..steps {
        player.pos += player.vel * sdt;

        let resolved = collider.resolve_sphere(player.pos, PLAYER_RADIUS, Some(player.vel), 3);
        player.pos = resolved.center;
        player.vel = resolved.velocity.unwrap();

        if resolved.contact.hit && resolved.contact.normal.y > best_ny {
            best_ny = resolved.contact.normal.y;
            best_n = resolved.contact.normal;
        }
    }

    player.grounded = !jumped && best_ny > GROUND_NORMAL_Y && player.vel.y <= 0.25;

    if player.grounded {
        player.vel.y = 0.0;
        if move_mag <= 0.1 {
            player.vel.x = 0.0;
            player.vel.z = 0.0;
        } else {
            // Move along the slope plane instead of into it.
            let mut v = Vec3::new(player.vel.x, 0.0, player.vel.z);
            v -= best_n * v.dot(best_n);
            player.vel.x = v.x;
            player.vel.z = v.z;
        }
    }
}

/// Third-person follow camera: behind and above the player, aimed a
/// little past them along the view direction.
fn third_person_camera(player: &Player) -> Camera {
    let (sy, cy) = player.yaw.sin_cos();
    let (sp, cp) = player.pitch.sin_cos();

    let flat_forward = Vec3::new(sy, 0.0, cy);
    let cam_forward = Vec3::new(cp * sy, sp, cp * cy).normalize();

    Camera {
        eye: player.pos - flat_forward * 6.0 + Vec3::new(0.0, 2.0, 0.0),
        target: player.pos + Vec3::Y + cam_forward * 2.0,
        up: Vec3::Y,
        ..Default::default()
    }
}

/// Frustum-cull and draw every entity into the framebuffer.
fn render_game(fb: &mut Framebuffer, camera: &Camera, models: &[Model], entities: &[Entity]) {
    let aspect = fb.width as f32 / fb.height as f32;
    let frustum = Frustum::from_view_proj(&camera.view_projection(aspect));

    let mut renderer = Renderer::new(fb);
    renderer.clear(rgb_to_argb(24, 28, 40));

    for ent in entities {
        let model = &models[ent.model_index];

        let world_center = ent.transform.transform_point3(model.bounds_center);
        let world_radius = model.bounds_radius * max_scale_component(&ent.transform);
        if !frustum.sphere_visible(world_center, world_radius) {
            continue;
        }

        let prepared = renderer.prepare_mesh(&model.mesh, &ent.transform, camera);
        for prim in &model.primitives {
            let mat = &model.materials[prim.material_index as usize];
            let Some(tex) = mat.base_color_tex.as_deref() else {
                continue;
            };
            renderer.draw_textured_mesh_prepared(
                &prepared,
                tex,
                prim.index_offset,
                prim.index_count,
                mat.double_sided,
                mat.front_face_ccw,
                mat.alpha_mode,
                mat.alpha_cutoff,
            );
        }
    }
}

/// Largest scale factor of a transform's linear part; scales the bounds
/// radius for frustum culling.
fn max_scale_component(m: &Mat4) -> f32 {
    m.x_axis
        .truncate()
        .length()
        .max(m.y_axis.truncate().length())
        .max(m.z_axis.truncate().length())
}

/// Append an axis-aligned box to a mesh, one quad per face, wound CCW
/// seen from outside. UVs tile once per world unit.
fn push_box(mesh: &mut Mesh, min: Vec3, max: Vec3) {
    // Corner order per face: CCW from outside, starting bottom-left.
    let faces: [[Vec3; 4]; 6] = [
        // +X
        [
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(max.x, max.y, max.z),
        ],
        // -X
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(min.x, max.y, min.z),
        ],
        // +Y
        [
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
        ],
        // -Y
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, min.y, max.z),
        ],
        // +Z
        [
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ],
        // -Z
        [
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
        ],
    ];

    let size = max - min;
    let face_uv_extents: [(f32, f32); 6] = [
        (size.z, size.y),
        (size.z, size.y),
        (size.x, size.z),
        (size.x, size.z),
        (size.x, size.y),
        (size.x, size.y),
    ];

    for (face, &(uw, vh)) in faces.iter().zip(&face_uv_extents) {
        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(face);
        mesh.uvs.extend_from_slice(&[
            Vec2::new(0.0, vh),
            Vec2::new(uw, vh),
            Vec2::new(uw, 0.0),
            Vec2::new(0.0, 0.0),
        ]);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Procedural level: a rolling heightfield ground, a few box platforms,
/// a cutout hedge and a translucent banner.
fn build_level() -> Model {
    let perlin = Perlin::new(7);

    let mut mesh = Mesh::default();
    let mut primitives = Vec::new();

    // Ground heightfield: (N+1)^2 vertices over [-half, half]^2.
    const N: usize = 64;
    let half = 32.0f32;
    let step = (half * 2.0) / N as f32;

    for j in 0..=N {
        for i in 0..=N {
            let x = -half + i as f32 * step;
            let z = -half + j as f32 * step;
            let h = perlin.get([x as f64 * 0.05, z as f64 * 0.05]) as f32 * 2.5;
            mesh.positions.push(Vec3::new(x, h, z));
            mesh.uvs.push(Vec2::new(i as f32 * 0.5, j as f32 * 0.5));
        }
    }
    let vert = |i: usize, j: usize| (j * (N + 1) + i) as u32;
    for j in 0..N {
        for i in 0..N {
            // Wound so face normals point up.
            mesh.indices.extend_from_slice(&[
                vert(i, j),
                vert(i, j + 1),
                vert(i + 1, j + 1),
                vert(i, j),
                vert(i + 1, j + 1),
                vert(i + 1, j),
            ]);
        }
    }
    primitives.push(Primitive {
        index_offset: 0,
        index_count: mesh.indices.len() as u32,
        material_index: 0,
    });

    // Stepping-stone platforms.
    let platform_start = mesh.indices.len() as u32;
    let platforms = [
        (Vec3::new(3.0, 1.0, 6.0), Vec3::new(6.0, 1.8, 9.0)),
        (Vec3::new(8.0, 2.2, 10.0), Vec3::new(11.0, 3.0, 13.0)),
        (Vec3::new(12.0, 3.6, 15.0), Vec3::new(15.0, 4.4, 18.0)),
        (Vec3::new(-9.0, 0.8, -4.0), Vec3::new(-5.0, 2.4, 0.0)),
    ];
    for (min, max) in platforms {
        push_box(&mut mesh, min, max);
    }
    primitives.push(Primitive {
        index_offset: platform_start,
        index_count: mesh.indices.len() as u32 - platform_start,
        material_index: 1,
    });

    // Cutout hedge: a vertical quad with holes punched by the mask test.
    let hedge_start = mesh.indices.len() as u32;
    {
        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(&[
            Vec3::new(-6.0, -1.0, 8.0),
            Vec3::new(0.0, -1.0, 8.0),
            Vec3::new(0.0, 3.0, 8.0),
            Vec3::new(-6.0, 3.0, 8.0),
        ]);
        mesh.uvs.extend_from_slice(&[
            Vec2::new(0.0, 1.0),
            Vec2::new(3.0, 1.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, 0.0),
        ]);
        // Wound so the face normal points toward the spawn area; the
        // one-sided collider then blocks the player walking into it.
        mesh.indices
            .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }
    primitives.push(Primitive {
        index_offset: hedge_start,
        index_count: mesh.indices.len() as u32 - hedge_start,
        material_index: 2,
    });

    // Translucent banner over the spawn area.
    let banner_start = mesh.indices.len() as u32;
    {
        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(&[
            Vec3::new(-2.0, 2.0, -5.0),
            Vec3::new(2.0, 2.0, -5.0),
            Vec3::new(2.0, 4.0, -5.0),
            Vec3::new(-2.0, 4.0, -5.0),
        ]);
        mesh.uvs.extend_from_slice(&[
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ]);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    primitives.push(Primitive {
        index_offset: banner_start,
        index_count: mesh.indices.len() as u32 - banner_start,
        material_index: 3,
    });

    let grass = Arc::new(checkerboard(
        16,
        16,
        8,
        rgba_to_argb(70, 140, 60, 0xFF),
        rgba_to_argb(58, 122, 52, 0xFF),
    ));
    let stone = Arc::new(checkerboard(
        16,
        16,
        4,
        rgba_to_argb(150, 150, 155, 0xFF),
        rgba_to_argb(120, 120, 128, 0xFF),
    ));
    let hedge = Arc::new(build_hedge_texture(&perlin));
    let banner = Arc::new(solid(4, 4, rgba_to_argb(70, 110, 220, 0x90)));

    let hedge_mode = if hedge.likely_cutout() {
        AlphaMode::Mask
    } else {
        AlphaMode::Opaque
    };

    let materials = vec![
        Material {
            name: "grass".into(),
            base_color_tex: Some(grass),
            ..Default::default()
        },
        Material {
            name: "stone".into(),
            base_color_tex: Some(stone),
            ..Default::default()
        },
        Material {
            name: "hedge".into(),
            base_color_tex: Some(hedge),
            alpha_mode: hedge_mode,
            alpha_cutoff: 0.5,
            double_sided: true,
            ..Default::default()
        },
        Material {
            name: "banner".into(),
            base_color_tex: Some(banner),
            alpha_mode: AlphaMode::Blend,
            double_sided: true,
            ..Default::default()
        },
    ];

    let mut model = Model {
        mesh,
        materials,
        primitives,
        ..Default::default()
    };
    model.update_bounds();
    model
}

/// Leafy cutout texture: noise decides which texels are solid.
fn build_hedge_texture(perlin: &Perlin) -> Texture {
    const SIZE: usize = 32;
    let mut pixels = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let n = perlin.get([x as f64 * 0.35, y as f64 * 0.35]);
            if n > -0.15 {
                let g = 100 + ((n + 1.0) * 50.0) as u8;
                pixels.push(rgba_to_argb(30, g, 35, 0xFF));
            } else {
                pixels.push(0);
            }
        }
    }
    Texture::new(SIZE, SIZE, pixels)
}

/// The player character: a simple capsule-ish stack of boxes.
fn build_player_model() -> Model {
    let mut mesh = Mesh::default();
    push_box(
        &mut mesh,
        Vec3::new(-0.3, 0.0, -0.3),
        Vec3::new(0.3, 0.8, 0.3),
    );
    push_box(
        &mut mesh,
        Vec3::new(-0.2, 0.8, -0.2),
        Vec3::new(0.2, 1.2, 0.2),
    );
    let index_count = mesh.indices.len() as u32;

    let body = Arc::new(checkerboard(
        8,
        8,
        2,
        rgba_to_argb(200, 70, 60, 0xFF),
        rgba_to_argb(170, 50, 45, 0xFF),
    ));

    let mut model = Model {
        mesh,
        materials: vec![Material {
            name: "body".into(),
            base_color_tex: Some(body),
            ..Default::default()
        }],
        primitives: vec![Primitive {
            index_offset: 0,
            index_count,
            material_index: 0,
        }],
        ..Default::default()
    };
    model.update_bounds();
    model
}
