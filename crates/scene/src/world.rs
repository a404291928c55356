use foundation::{EntityHandle, GeoPoint};

use crate::surface::{MarkerSpec, PolylineSpec, ScreenPos};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Marker,
    Polyline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEntity {
    Marker(MarkerSpec),
    Polyline(PolylineSpec),
}

impl SceneEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            SceneEntity::Marker(_) => EntityKind::Marker,
            SceneEntity::Polyline(_) => EntityKind::Polyline,
        }
    }

    pub fn as_marker(&self) -> Option<&MarkerSpec> {
        match self {
            SceneEntity::Marker(m) => Some(m),
            SceneEntity::Polyline(_) => None,
        }
    }

    pub fn as_polyline(&self) -> Option<&PolylineSpec> {
        match self {
            SceneEntity::Polyline(p) => Some(p),
            SceneEntity::Marker(_) => None,
        }
    }
}

/// Generational entity table.
///
/// Freed slots are reused with a bumped generation, so a handle to a
/// removed entity never resolves to whatever took its slot.
#[derive(Debug, Default)]
pub struct World {
    entities: Vec<Option<SceneEntity>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    live: usize,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, entity: SceneEntity) -> EntityHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let idx = index as usize;
            self.entities[idx] = Some(entity);
            return EntityHandle::new(index, self.generations[idx]);
        }
        let index = self.entities.len() as u32;
        self.entities.push(Some(entity));
        self.generations.push(0);
        EntityHandle::new(index, 0)
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&SceneEntity> {
        let idx = self.live_index(handle)?;
        self.entities[idx].as_ref()
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut SceneEntity> {
        let idx = self.live_index(handle)?;
        self.entities[idx].as_mut()
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn despawn(&mut self, handle: EntityHandle) -> Option<SceneEntity> {
        let idx = self.live_index(handle)?;
        let entity = self.entities[idx].take()?;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entities in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &SceneEntity)> + '_ {
        self.entities.iter().enumerate().filter_map(|(idx, e)| {
            e.as_ref()
                .map(|e| (EntityHandle::new(idx as u32, self.generations[idx]), e))
        })
    }

    pub fn markers(&self) -> Vec<(EntityHandle, &MarkerSpec)> {
        self.iter()
            .filter_map(|(h, e)| e.as_marker().map(|m| (h, m)))
            .collect()
    }

    pub fn polylines(&self) -> Vec<(EntityHandle, &PolylineSpec)> {
        self.iter()
            .filter_map(|(h, e)| e.as_polyline().map(|p| (h, p)))
            .collect()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.iter().filter(|(_, e)| e.kind() == kind).count()
    }

    /// Marker whose projected position is nearest `at`, within `radius_px`.
    ///
    /// Ordering contract: on equal distance the lower slot index wins.
    /// Markers that do not project (behind the camera) are ignored.
    pub fn pick_marker<F>(&self, at: ScreenPos, radius_px: f64, to_screen: F) -> Option<EntityHandle>
    where
        F: Fn(GeoPoint) -> Option<ScreenPos>,
    {
        let mut best: Option<(f64, EntityHandle)> = None;
        for (handle, marker) in self.markers() {
            let Some(screen) = to_screen(marker.position) else {
                continue;
            };
            let d = screen.distance(at);
            if d.is_nan() || d > radius_px {
                continue;
            }
            best = match best {
                None => Some((d, handle)),
                Some((bd, bh)) => {
                    let ord = d.total_cmp(&bd).then_with(|| handle.index().cmp(&bh.index()));
                    if ord.is_lt() {
                        Some((d, handle))
                    } else {
                        Some((bd, bh))
                    }
                }
            };
        }
        best.map(|(_, h)| h)
    }

    fn live_index(&self, handle: EntityHandle) -> Option<usize> {
        let idx = handle.index() as usize;
        (self.generations.get(idx) == Some(&handle.generation())).then_some(idx)
    }
}
