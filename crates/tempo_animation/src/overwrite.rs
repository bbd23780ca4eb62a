//! Overwrite management
//!
//! Every tween is indexed by the identity of its targets so a new tween can
//! find the tweens it competes with without walking the tree.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tempo_core::{Target, TargetKey};
use tracing::debug;

use crate::animation::{AnimationId, Node};
use crate::scheduler::Scheduler;

/// Tweens per target
#[derive(Debug, Default)]
pub(crate) struct OverwriteIndex {
    map: FxHashMap<TargetKey, SmallVec<[AnimationId; 4]>>,
}

impl OverwriteIndex {
    pub(crate) fn register(&mut self, id: AnimationId, targets: &[Target]) {
        for target in targets {
            let ids = self.map.entry(target.key()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    pub(crate) fn unregister(&mut self, id: AnimationId, targets: &[Target]) {
        for target in targets {
            let key = target.key();
            if let Some(ids) = self.map.get_mut(&key) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.map.remove(&key);
                }
            }
        }
    }

    pub(crate) fn tweens(&self, key: TargetKey) -> SmallVec<[AnimationId; 4]> {
        self.map.get(&key).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    fn target_count(&self) -> usize {
        self.map.len()
    }
}

impl Scheduler {
    /// Take `props` (all with `None`) of `target` away from `id`, killing it
    /// when nothing is left
    ///
    /// Returns whether anything was removed.
    fn kill_props_of(
        &mut self,
        id: AnimationId,
        target: &Target,
        props: Option<&[String]>,
    ) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let initted = node.timing.initted;
        let Some(tween) = node.tween_mut() else {
            return false;
        };
        if !tween.targets().iter().any(|t| t.key() == target.key()) {
            return false;
        }
        let remaining = tween.kill_props(target.key(), props, initted);
        if !remaining {
            debug!("{:?} has nothing left to animate", id);
            self.kill(id);
        }
        true
    }

    /// Remove `target` from every other tween that animates it
    pub(crate) fn kill_target_in_others(
        &mut self,
        target: &Target,
        props: Option<&[String]>,
        except: AnimationId,
    ) {
        for other in self.overwrite.tweens(target.key()) {
            if other != except && self.kill_props_of(other, target, props) {
                debug!("{:?} overwrote {:?}", except, other);
            }
        }
    }

    /// Whether `id` is in the tree that the root renders
    fn attached_to_root(&self, id: AnimationId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.timing(current).and_then(|tm| tm.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Resolve conflicts of a tween in `Auto` mode as it starts
    ///
    /// A competing tween is another tween on the same target, attached and
    /// unpaused, that is running at this moment. It loses the properties the
    /// starting tween animates and keeps the rest. Of two tweens starting
    /// together, the one rendered later wins.
    pub(crate) fn auto_overwrite(&mut self, id: AnimationId) {
        let Some(tween) = self.nodes.get(id).and_then(Node::tween) else {
            return;
        };
        let targets: SmallVec<[Target; 1]> = tween.targets().iter().cloned().collect();
        let props: Vec<String> = tween.logical_props().map(str::to_string).collect();

        for target in &targets {
            for other in self.overwrite.tweens(target.key()) {
                if other == id
                    || !self.attached_to_root(other)
                    || self.has_paused_ancestor(other)
                    || !self.is_active(other)
                {
                    continue;
                }
                let overlap: Vec<String> = self
                    .animated_properties(other, target)
                    .into_iter()
                    .filter(|name| props.contains(name))
                    .collect();
                if overlap.is_empty() {
                    continue;
                }
                debug!("{:?} takes {:?} from {:?}", id, overlap, other);
                self.kill_props_of(other, target, Some(&overlap));
            }
        }
    }
}

// Target queries
impl Scheduler {
    /// Stop every tween animating `target`, or only the given properties
    ///
    /// Returns how many tweens were affected.
    pub fn kill_tweens_of(&mut self, target: &Target, props: Option<&[&str]>) -> usize {
        let props: Option<Vec<String>> = props.map(|p| p.iter().map(|s| s.to_string()).collect());
        self.overwrite
            .tweens(target.key())
            .into_iter()
            .filter(|id| self.kill_props_of(*id, target, props.as_deref()))
            .count()
    }

    /// Tweens that animate `target`, optionally only the ones running now
    pub fn tweens_of(&mut self, target: &Target, only_active: bool) -> Vec<AnimationId> {
        self.overwrite
            .tweens(target.key())
            .into_iter()
            .filter(|id| !only_active || self.is_active(*id))
            .collect()
    }

    /// Whether any tween is animating `target` right now
    pub fn is_tweening(&mut self, target: &Target) -> bool {
        !self.tweens_of(target, true).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use tempo_core::PropertyBag;

    #[test]
    fn test_index_drops_empty_entries() {
        let mut ids: SlotMap<AnimationId, ()> = SlotMap::with_key();
        let a = ids.insert(());
        let b = ids.insert(());
        let target = Target::new(PropertyBag::new());

        let mut index = OverwriteIndex::default();
        index.register(a, std::slice::from_ref(&target));
        index.register(b, std::slice::from_ref(&target));
        index.register(b, std::slice::from_ref(&target));
        assert_eq!(index.tweens(target.key()).as_slice(), &[a, b]);

        index.unregister(a, std::slice::from_ref(&target));
        index.unregister(b, std::slice::from_ref(&target));
        assert_eq!(index.target_count(), 0);
    }
}
