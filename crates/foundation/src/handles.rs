/// Generational handle to an entity on the rendering surface.
///
/// Opaque outside the surface that minted it: a stale handle (older
/// generation, same index) never aliases a newer entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityHandle(u32, u32); // (index, generation)

impl EntityHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        EntityHandle(index, generation)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        self.1
    }
}
