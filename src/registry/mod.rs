//! Stable handle -> slot registry shared by both culling engines

pub mod index_registry;

pub use index_registry::IndexedObjectRegistry;

use crate::config::CullingConfig;

/// Opaque identity of a tracked object, issued by the owning system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Lifetime class; picks the idle threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Entities: short idle threshold
    Transient,
    /// Block entities: long idle threshold
    Persistent,
    /// Only removed explicitly (regions)
    Pinned,
}

/// Idle ticks before eviction, per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleThresholds {
    pub transient: u32,
    pub persistent: u32,
}

impl IdleThresholds {
    pub fn from_config(config: &CullingConfig) -> Self {
        Self {
            transient: config.transient_idle_ticks,
            persistent: config.persistent_idle_ticks,
        }
    }

    pub fn for_kind(&self, kind: ObjectKind) -> Option<u32> {
        match kind {
            ObjectKind::Transient => Some(self.transient),
            ObjectKind::Persistent => Some(self.persistent),
            ObjectKind::Pinned => None,
        }
    }
}

impl Default for IdleThresholds {
    fn default() -> Self {
        Self::from_config(&CullingConfig::default())
    }
}
