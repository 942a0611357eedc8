//! Rigid-body world
//!
//! Semi-implicit Euler with fixed substeps. Colliders are convex
//! approximations: balls, and boxes tested as the world-aligned bounds of
//! their rotated extents. Contacts share one material, frictionless
//! and slightly bouncy by default, so bodies drift apart instead of stacking.

use glam::{Mat3, Quat, Vec3};

use crate::consts::MAX_FRAME_DELTA;

/// Stable handle to a body in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(u32);

/// Collision shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

/// Half extents of a rotated box's world-aligned bounds
fn world_half_extents(half_extents: Vec3, rotation: Quat) -> Vec3 {
    let m = Mat3::from_quat(rotation);
    m.x_axis.abs() * half_extents.x + m.y_axis.abs() * half_extents.y + m.z_axis.abs() * half_extents.z
}

/// Contact between two bodies: unit normal from `a` toward `b` and
/// penetration depth
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contact {
    normal: Vec3,
    depth: f32,
}

fn ball_ball(a: Vec3, ra: f32, b: Vec3, rb: f32) -> Option<Contact> {
    let delta = b - a;
    let reach = ra + rb;
    let dist_sq = delta.length_squared();
    if dist_sq >= reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-5 { delta / dist } else { Vec3::Y };
    Some(Contact {
        normal,
        depth: reach - dist,
    })
}

/// Separating-axis test on the three world axes; resolves along the axis
/// of least overlap
fn box_box(a: Vec3, ha: Vec3, b: Vec3, hb: Vec3) -> Option<Contact> {
    let delta = b - a;
    let overlap = ha + hb - delta.abs();
    if overlap.min_element() <= 0.0 {
        return None;
    }
    let (axis, depth) = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        (Vec3::X * sign(delta.x), overlap.x)
    } else if overlap.y <= overlap.z {
        (Vec3::Y * sign(delta.y), overlap.y)
    } else {
        (Vec3::Z * sign(delta.z), overlap.z)
    };
    Some(Contact {
        normal: axis,
        depth,
    })
}

/// Ball at `center` against a box at `b`; normal points from ball to box
fn ball_box(center: Vec3, radius: f32, b: Vec3, hb: Vec3) -> Option<Contact> {
    let local = center - b;
    let closest = local.clamp(-hb, hb);
    let offset = local - closest;
    let dist_sq = offset.length_squared();

    if dist_sq > 1e-10 {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        return Some(Contact {
            normal: -offset / dist,
            depth: radius - dist,
        });
    }

    // Center inside the box: leave through the nearest face
    let exit = hb - local.abs();
    let (axis, depth) = if exit.x <= exit.y && exit.x <= exit.z {
        (Vec3::X * sign(local.x), exit.x)
    } else if exit.y <= exit.z {
        (Vec3::Y * sign(local.y), exit.y)
    } else {
        (Vec3::Z * sign(local.z), exit.z)
    };
    Some(Contact {
        normal: -axis,
        depth: depth + radius,
    })
}

#[inline]
fn sign(v: f32) -> f32 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

fn contact(a: &RigidBody, b: &RigidBody) -> Option<Contact> {
    match (a.collider, b.collider) {
        (Collider::Ball { radius: ra }, Collider::Ball { radius: rb }) => {
            ball_ball(a.position, ra, b.position, rb)
        }
        (Collider::Cuboid { half_extents: ha }, Collider::Cuboid { half_extents: hb }) => box_box(
            a.position,
            world_half_extents(ha, a.rotation),
            b.position,
            world_half_extents(hb, b.rotation),
        ),
        (Collider::Ball { radius }, Collider::Cuboid { half_extents }) => ball_box(
            a.position,
            radius,
            b.position,
            world_half_extents(half_extents, b.rotation),
        ),
        (Collider::Cuboid { half_extents }, Collider::Ball { radius }) => ball_box(
            b.position,
            radius,
            a.position,
            world_half_extents(half_extents, a.rotation),
        )
        .map(|c| Contact {
            normal: -c.normal,
            ..c
        }),
    }
}

/// Global contact response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            friction: 0.0,
            restitution: 0.3,
        }
    }
}

/// Default linear/angular damping
pub const DEFAULT_DAMPING: f32 = 0.01;

/// A simulated body
#[derive(Debug, Clone)]
pub struct RigidBody {
    handle: BodyHandle,
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
    pub mass: f32,
    pub collider: Collider,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl RigidBody {
    pub fn new(collider: Collider, mass: f32) -> Self {
        Self {
            handle: BodyHandle(0),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linvel: Vec3::ZERO,
            angvel: Vec3::ZERO,
            mass: mass.max(0.001),
            collider,
            linear_damping: DEFAULT_DAMPING,
            angular_damping: DEFAULT_DAMPING,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_linvel(mut self, linvel: Vec3) -> Self {
        self.linvel = linvel;
        self
    }

    pub fn with_angvel(mut self, angvel: Vec3) -> Self {
        self.angvel = angvel;
        self
    }

    #[inline]
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    #[inline]
    fn inv_mass(&self) -> f32 {
        1.0 / self.mass
    }

    fn integrate(&mut self, gravity: Vec3, dt: f32) {
        self.linvel += gravity * dt;
        // Damping as a fraction of velocity lost per second
        self.linvel *= (1.0 - self.linear_damping).powf(dt);
        self.angvel *= (1.0 - self.angular_damping).powf(dt);

        self.position += self.linvel * dt;
        let spin = Quat::from_scaled_axis(self.angvel * dt);
        self.rotation = (spin * self.rotation).normalize();
    }
}

/// Clamp a raw frame delta to what the simulation may consume
#[inline]
pub fn clamp_frame_delta(dt: f32) -> f32 {
    if dt.is_nan() {
        return 0.0;
    }
    dt.clamp(0.0, MAX_FRAME_DELTA)
}

/// The simulation world
#[derive(Debug)]
pub struct PhysicsWorld {
    gravity: Vec3,
    contact: ContactMaterial,
    /// Sorted by handle for stable iteration
    bodies: Vec<RigidBody>,
    accumulator: f32,
    next_handle: u32,
}

impl PhysicsWorld {
    pub fn new(gravity_y: f32) -> Self {
        Self {
            gravity: Vec3::new(0.0, gravity_y, 0.0),
            contact: ContactMaterial::default(),
            bodies: Vec::new(),
            accumulator: 0.0,
            next_handle: 1,
        }
    }

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Takes effect for every body on the next substep
    pub fn set_gravity(&mut self, gravity_y: f32) {
        self.gravity = Vec3::new(0.0, gravity_y, 0.0);
    }

    pub(crate) fn add_body(&mut self, mut body: RigidBody) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        body.handle = handle;
        self.bodies.push(body);
        handle
    }

    pub(crate) fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let idx = self.index_of(handle)?;
        Some(self.bodies.remove(idx))
    }

    fn index_of(&self, handle: BodyHandle) -> Option<usize> {
        self.bodies.binary_search_by_key(&handle, |b| b.handle).ok()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.index_of(handle).map(|i| &self.bodies[i])
    }

    pub(crate) fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.index_of(handle).map(move |i| &mut self.bodies[i])
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.index_of(handle).is_some()
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.bodies.clear();
        self.accumulator = 0.0;
    }

    /// Advance by `frame_delta` in fixed substeps of `fixed_dt`, running at
    /// most `max_substeps`. Leftover time carries to the next call, except
    /// when the substep budget runs out, in which case it's dropped.
    /// Returns the number of substeps taken.
    pub fn step(&mut self, fixed_dt: f32, frame_delta: f32, max_substeps: u32) -> u32 {
        self.accumulator += clamp_frame_delta(frame_delta);
        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < max_substeps {
            self.internal_step(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        if substeps == max_substeps && self.accumulator >= fixed_dt {
            self.accumulator = 0.0;
        }
        substeps
    }

    fn internal_step(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in &mut self.bodies {
            body.integrate(gravity, dt);
        }
        self.resolve_contacts();
    }

    fn resolve_contacts(&mut self) {
        let ContactMaterial {
            friction,
            restitution,
        } = self.contact;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (left, right) = self.bodies.split_at_mut(j);
                let a = &mut left[i];
                let b = &mut right[0];

                let Some(Contact { normal, depth }) = contact(a, b) else {
                    continue;
                };

                let inv_a = a.inv_mass();
                let inv_b = b.inv_mass();
                let inv_sum = inv_a + inv_b;

                // Push apart by inverse mass
                let correction = normal * (depth * 0.8 / inv_sum);
                a.position -= correction * inv_a;
                b.position += correction * inv_b;

                let relative = b.linvel - a.linvel;
                let closing = relative.dot(normal);
                if closing >= 0.0 {
                    continue;
                }
                let impulse = -(1.0 + restitution) * closing / inv_sum;
                a.linvel -= normal * impulse * inv_a;
                b.linvel += normal * impulse * inv_b;

                // Coulomb friction, capped at stopping the sliding motion
                let tangent = relative - normal * closing;
                let slide = tangent.length();
                if friction > 0.0 && slide > 1e-6 {
                    let jt = (friction * impulse).min(slide / inv_sum);
                    let dir = tangent / slide;
                    a.linvel += dir * jt * inv_a;
                    b.linvel -= dir * jt * inv_b;
                }
            }
        }
    }
}
