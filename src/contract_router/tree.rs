use super::ContractBearing;
use indexmap::IndexMap;
use std::sync::{Arc, Weak};

/// Mount path → contract-bearing routers mounted there, in mount order.
///
/// Mount paths are stored exactly as given; they are canonicalised only
/// when joined into a document path. A router mounted twice at the same
/// path is recorded once.
///
/// Children are held weakly. The base router's layers own the mounted
/// handlers; the tree only remembers where they were mounted, so a child
/// the base router no longer holds drops out of the tree.
#[derive(Default, Clone)]
pub struct RouterTree {
    mounts: IndexMap<String, Vec<Weak<dyn ContractBearing>>>,
}

impl RouterTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` under `mount_path`. Returns `false` if it was already
    /// recorded there.
    pub fn insert(&mut self, mount_path: &str, child: &Arc<dyn ContractBearing>) -> bool {
        let children = self.mounts.entry(mount_path.to_string()).or_default();
        if children.iter().any(|existing| same_router(existing, child)) {
            return false;
        }
        children.push(Arc::downgrade(child));
        true
    }

    /// Live children mounted at `mount_path`.
    #[must_use]
    pub fn children(&self, mount_path: &str) -> Vec<Arc<dyn ContractBearing>> {
        self.mounts
            .get(mount_path)
            .map(|children| children.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Every live `(mount path, child)` pair, in mount order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Arc<dyn ContractBearing>)> + '_ {
        self.mounts.iter().flat_map(|(path, children)| {
            children
                .iter()
                .filter_map(Weak::upgrade)
                .map(move |child| (path.as_str(), child))
        })
    }

    /// Mount paths with at least one live child.
    pub fn mount_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.mounts
            .iter()
            .filter(|(_, children)| children.iter().any(|child| child.strong_count() > 0))
            .map(|(path, _)| path.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts
            .values()
            .flatten()
            .filter(|child| child.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RouterTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.mounts.iter().map(|(path, children)| (path, children.len())))
            .finish()
    }
}

/// Identity comparison on the shared allocation, ignoring vtables.
fn same_router(recorded: &Weak<dyn ContractBearing>, candidate: &Arc<dyn ContractBearing>) -> bool {
    std::ptr::eq(
        Weak::as_ptr(recorded).cast::<()>(),
        Arc::as_ptr(candidate).cast::<()>(),
    )
}
