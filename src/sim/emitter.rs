// Short-lived localized force and density sources

use tracing::debug;

use crate::sim::ActiveField;

/// Default number of emitters alive at once
pub const DEFAULT_MAX_EMITTERS: usize = 200;

/// A transient source pushing fluid and depositing density around its centre.
/// Alive while `elapsed < lifespan`.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    /// Centre in grid coordinates; may sit on the halo
    pub center: (i32, i32),

    /// Force `(u, v)` applied at full strength
    pub force: (f32, f32),

    /// Ticks the emitter lives for
    pub lifespan: u32,

    /// Ticks already processed
    pub elapsed: u32,

    /// Half-width of the square footprint, in cells
    pub radius: u32,

    /// User slot the deposited density belongs to
    pub user_slot: usize,
}

impl Emitter {
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.lifespan
    }

    /// Linearly decaying influence over the lifespan, 1 on the first tick.
    pub fn temporal_falloff(&self) -> f32 {
        self.lifespan.saturating_sub(self.elapsed) as f32 / self.lifespan as f32
    }

    /// Per-axis falloff `(u, v)` of the cell `(x, y)`: 1 at the centre,
    /// dropping linearly to 0 at `radius` cells away.
    pub fn spatial_falloff(&self, x: i32, y: i32) -> (f32, f32) {
        let radius = self.radius as f32;
        let along = |offset: i32| (1. - offset.abs() as f32 / radius).max(0.);

        (along(x - self.center.0), along(y - self.center.1))
    }

    /// Inclusive corners of the footprint clamped to the interior `[1, n]`,
    /// or `None` if nothing of it lies inside.
    fn footprint(&self, n: usize) -> Option<((usize, usize), (usize, usize))> {
        let (cx, cy) = self.center;
        let r = self.radius as i32;
        let n = n as i32;

        let lower = ((cx - r).max(1), (cy - r).max(1));
        let upper = ((cx + r).min(n), (cy + r).min(n));

        if lower.0 > upper.0 || lower.1 > upper.1 {
            return None;
        }

        Some((
            (lower.0 as usize, lower.1 as usize),
            (upper.0 as usize, upper.1 as usize),
        ))
    }

    /// Add this tick's velocity and density into the field.
    fn apply(&self, field: &mut ActiveField, source: f32) {
        let n = field.solver().grid().n();
        let Some((lower, upper)) = self.footprint(n) else {
            return;
        };
        let life = self.temporal_falloff();

        for y in lower.1..=upper.1 {
            for x in lower.0..=upper.0 {
                let (u_falloff, v_falloff) = self.spatial_falloff(x as i32, y as i32);

                let solver = field.solver_mut();
                solver.add_horz_velocity_at(x, y, self.force.0 * u_falloff);
                solver.add_vert_velocity_at(x, y, self.force.1 * v_falloff);

                let density = source * u_falloff * v_falloff * life;
                field.add_density_at(self.user_slot, x, y, density);
            }
        }
    }
}

/// A bounded set of live emitters. Creation past capacity is dropped, never
/// evicting an existing emitter.
pub struct EmitterSystem {
    emitters: Vec<Emitter>,
    capacity: usize,
}

impl EmitterSystem {
    pub fn new(capacity: usize) -> Self {
        EmitterSystem {
            emitters: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Emitter> {
        self.emitters.iter()
    }

    /// Insert a fresh emitter. Returns `false` when the system is full or the
    /// emitter would never be alive (zero lifespan or radius).
    pub fn create_emitter_at(
        &mut self,
        center: (i32, i32),
        force: (f32, f32),
        lifespan: u32,
        radius: u32,
        user_slot: usize,
    ) -> bool {
        if self.emitters.len() >= self.capacity {
            debug!("Emitter capacity {} reached; dropped emitter at {:?}", self.capacity, center);
            return false;
        }
        if lifespan == 0 || radius == 0 {
            return false;
        }

        self.emitters.push(Emitter {
            center,
            force,
            lifespan,
            elapsed: 0,
            radius,
            user_slot,
        });

        true
    }

    /// Apply every live emitter to `field`, age them by one tick, then drop the
    /// ones whose lifespan is used up.
    ///
    /// Parameters
    /// - `field` - The field receiving impulses; density goes to each emitter's
    ///   user slot in the multi-user variant
    /// - `source` - Density deposited at full spatial and temporal strength
    pub fn render_emitters(&mut self, field: &mut ActiveField, source: f32) {
        self.emitters.retain(|e| !e.is_expired());

        for emitter in self.emitters.iter_mut() {
            emitter.apply(field, source);
            emitter.elapsed += 1;
        }

        self.emitters.retain(|e| !e.is_expired());
    }

    pub fn clear(&mut self) {
        self.emitters.clear();
    }
}
