//! Registry wiring: one controller per enabled space extension, grouped by tag.

use tracing::info;

use crate::extension::Extension;
use crate::space::{SpaceController, SpaceIdentity, SpaceServices, SpaceView};

/// Spaces sharing a category tag.
pub struct SpaceGroup {
    /// Category tag.
    pub tag: String,
    /// Controllers in discovery order.
    pub spaces: Vec<SpaceController>,
}

/// All wired spaces.
#[derive(Default)]
pub struct SpaceRegistry {
    groups: Vec<SpaceGroup>,
}

/// Groups enabled space extensions by tag, keeping first-seen tag order.
#[must_use]
pub fn group_by_tag(extensions: &[Extension]) -> Vec<(String, Vec<&Extension>)> {
    let mut groups: Vec<(String, Vec<&Extension>)> = Vec::new();

    for ext in extensions.iter().filter(|e| e.enabled) {
        let Some(meta) = ext.space_meta() else {
            continue;
        };

        match groups.iter_mut().find(|(tag, _)| *tag == meta.tag) {
            Some((_, members)) => members.push(ext),
            None => groups.push((meta.tag.clone(), vec![ext])),
        }
    }

    groups
}

impl SpaceRegistry {
    /// Builds a controller for every enabled space extension.
    #[must_use]
    pub fn wire(extensions: &[Extension], services: &SpaceServices) -> Self {
        let groups: Vec<SpaceGroup> = group_by_tag(extensions)
            .into_iter()
            .map(|(tag, members)| SpaceGroup {
                tag,
                spaces: members
                    .into_iter()
                    .filter_map(|ext| {
                        ext.space_meta().map(|meta| {
                            let identity = SpaceIdentity::from_meta(&ext.path, &ext.name, meta);
                            SpaceController::new(identity, services.clone())
                        })
                    })
                    .collect(),
            })
            .collect();

        let registry = Self { groups };
        info!(
            "[REGISTRY] Wired {} space(s) in {} group(s)",
            registry.len(),
            registry.groups.len()
        );
        registry
    }

    /// Returns the groups.
    #[must_use]
    pub fn groups(&self) -> &[SpaceGroup] {
        &self.groups
    }

    /// Returns the total number of spaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.spaces.len()).sum()
    }

    /// Returns true if no spaces are wired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the space at flat index `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SpaceController> {
        self.groups.iter().flat_map(|g| g.spaces.iter()).nth(index)
    }

    /// Returns the space at flat index `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SpaceController> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.spaces.iter_mut())
            .nth(index)
    }

    /// Returns the initial view of every space, in flat order.
    #[must_use]
    pub fn refresh_all(&self) -> Vec<SpaceView> {
        self.groups
            .iter()
            .flat_map(|g| g.spaces.iter())
            .map(SpaceController::refresh)
            .collect()
    }

    /// Releases workers of stopping spaces that have finished.
    ///
    /// Returns how many spaces changed state.
    pub fn reap_stopped(&mut self) -> usize {
        self.groups
            .iter_mut()
            .flat_map(|g| g.spaces.iter_mut())
            .map(SpaceController::reap)
            .filter(|changed| *changed)
            .count()
    }

    /// Terminates every running or stopping space, returning how many were
    /// stopped.
    pub fn terminate_all(&mut self) -> usize {
        let mut stopped = 0;
        for space in self.groups.iter_mut().flat_map(|g| g.spaces.iter_mut()) {
            if space.is_active() && space.terminate().is_ok() {
                stopped += 1;
            }
        }
        stopped
    }
}
