//! Cached permission graph.
//!
//! The graph holds every permission, every group and the group/permission
//! edges. Principal memberships and direct grants are read from storage on
//! each check and are not part of it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use permissions_sdk::{
    Group, GroupId, GroupRef, IdentitySnapshot, Permission, PermissionId, PermissionRef, ScopeId,
};
use tokio::sync::Mutex;
use tracing::debug;

type PermissionKey = (String, String, Option<ScopeId>);
type GroupKey = (String, String);

/// Immutable, indexed view of an [`IdentitySnapshot`].
#[derive(Debug, Default)]
pub struct PermissionGraph {
    permissions: HashMap<PermissionId, Permission>,
    permission_index: HashMap<PermissionKey, PermissionId>,
    groups: HashMap<GroupId, Group>,
    group_index: HashMap<GroupKey, GroupId>,
    group_permissions: HashMap<GroupId, HashSet<PermissionId>>,
}

impl PermissionGraph {
    #[must_use]
    pub fn from_snapshot(snapshot: IdentitySnapshot) -> Self {
        let mut graph = Self::default();

        for permission in snapshot.permissions {
            graph.permission_index.insert(
                (
                    permission.guard.clone(),
                    permission.name.clone(),
                    permission.scope,
                ),
                permission.id,
            );
            graph.permissions.insert(permission.id, permission);
        }

        for group in snapshot.groups {
            graph
                .group_index
                .insert((group.guard.clone(), group.name.clone()), group.id);
            graph.groups.insert(group.id, group);
        }

        for (group_id, permission_id) in snapshot.group_permissions {
            if graph.groups.contains_key(&group_id) && graph.permissions.contains_key(&permission_id)
            {
                graph
                    .group_permissions
                    .entry(group_id)
                    .or_default()
                    .insert(permission_id);
            }
        }

        graph
    }

    #[must_use]
    pub fn permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(&id)
    }

    /// Exact `(name, guard, scope)` lookup.
    #[must_use]
    pub fn permission_by_name(
        &self,
        name: &str,
        guard: &str,
        scope: Option<ScopeId>,
    ) -> Option<&Permission> {
        self.permission_index
            .get(&(guard.to_owned(), name.to_owned(), scope))
            .and_then(|id| self.permissions.get(id))
    }

    /// Resolve a reference. Names are looked up in `guard`: with a scope the
    /// scoped permission is preferred and the unscoped one is the fallback.
    /// Ids are looked up in any guard.
    #[must_use]
    pub fn find_permission(
        &self,
        reference: &PermissionRef,
        guard: &str,
        scope: Option<ScopeId>,
    ) -> Option<&Permission> {
        match reference {
            PermissionRef::ByName(name) => scope
                .and_then(|s| self.permission_by_name(name, guard, Some(s)))
                .or_else(|| self.permission_by_name(name, guard, None)),
            PermissionRef::ById(id) => self.permission(*id),
            PermissionRef::Resolved(permission) => self.permission(permission.id),
        }
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    #[must_use]
    pub fn group_by_name(&self, name: &str, guard: &str) -> Option<&Group> {
        self.group_index
            .get(&(guard.to_owned(), name.to_owned()))
            .and_then(|id| self.groups.get(id))
    }

    /// Resolve a reference. Names are looked up in `guard`, ids in any guard.
    #[must_use]
    pub fn find_group(&self, reference: &GroupRef, guard: &str) -> Option<&Group> {
        match reference {
            GroupRef::ByName(name) => self.group_by_name(name, guard),
            GroupRef::ById(id) => self.group(*id),
            GroupRef::Resolved(group) => self.group(group.id),
        }
    }

    #[must_use]
    pub fn group_has_permission(&self, group_id: GroupId, permission_id: PermissionId) -> bool {
        self.group_permissions
            .get(&group_id)
            .is_some_and(|set| set.contains(&permission_id))
    }

    /// Groups carrying the permission.
    pub fn groups_with(&self, permission_id: PermissionId) -> impl Iterator<Item = GroupId> + '_ {
        self.group_permissions
            .iter()
            .filter(move |(_, set)| set.contains(&permission_id))
            .map(|(group_id, _)| *group_id)
    }

    #[must_use]
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

struct CachedGraph {
    graph: Arc<PermissionGraph>,
    generation: u64,
    expires_at: Instant,
}

/// Single-flight, invalidatable cache of the [`PermissionGraph`].
///
/// `invalidate` bumps a generation counter. A rebuild records the generation
/// before loading and only installs its result if the generation is still the
/// same, so a load racing with a mutation can never overwrite a newer state.
pub struct PermissionGraphCache {
    ttl: Duration,
    cached: RwLock<Option<CachedGraph>>,
    generation: AtomicU64,
    /// Mutex to ensure single-flight rebuilds.
    rebuild_lock: Mutex<()>,
}

impl PermissionGraphCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: RwLock::new(None),
            generation: AtomicU64::new(0),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Return the cached graph, or build it with `load`.
    ///
    /// At most one `load` runs at a time; concurrent callers wait for it and
    /// reuse its result.
    ///
    /// # Errors
    ///
    /// Returns `Err(E)` if `load` fails. Nothing is cached in that case.
    pub async fn get_or_build<F, Fut, E>(&self, load: F) -> Result<Arc<PermissionGraph>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PermissionGraph, E>>,
    {
        // Fast path: sync lock, no await
        if let Some(graph) = self.fresh() {
            return Ok(graph);
        }

        let _rebuild_guard = self.rebuild_lock.lock().await;

        // Another caller may have rebuilt while we waited
        if let Some(graph) = self.fresh() {
            debug!("Permission graph rebuilt by a concurrent caller");
            return Ok(graph);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let started = Instant::now();
        let graph = Arc::new(load().await?);

        {
            let mut slot = self.cached.write();
            if self.generation.load(Ordering::Acquire) == generation {
                *slot = Some(CachedGraph {
                    graph: Arc::clone(&graph),
                    generation,
                    expires_at: Instant::now() + self.ttl,
                });
                debug!(
                    generation,
                    permissions = graph.permission_count(),
                    groups = graph.group_count(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Permission graph rebuilt"
                );
            } else {
                debug!(generation, "Discarding permission graph invalidated during rebuild");
            }
        }

        Ok(graph)
    }

    /// Drop the cached graph. The next read rebuilds.
    pub fn invalidate(&self) {
        let mut slot = self.cached.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        slot.take();
    }

    /// Whether a fresh graph is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.fresh().is_some()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn fresh(&self) -> Option<Arc<PermissionGraph>> {
        let guard = self.cached.read();
        let generation = self.generation.load(Ordering::Acquire);
        guard
            .as_ref()
            .filter(|c| c.generation == generation && c.expires_at > Instant::now())
            .map(|c| Arc::clone(&c.graph))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    fn permission(name: &str, guard: &str, scope: Option<ScopeId>) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            guard: guard.to_owned(),
            scope,
            created_at: Utc::now(),
        }
    }

    fn group(name: &str, guard: &str) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            guard: guard.to_owned(),
            owner_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn graph_indexes_snapshot() {
        let edit = permission("edit-articles", "web", None);
        let editors = group("editors", "web");
        let graph = PermissionGraph::from_snapshot(IdentitySnapshot {
            permissions: vec![edit.clone()],
            groups: vec![editors.clone()],
            group_permissions: vec![(editors.id, edit.id), (editors.id, Uuid::new_v4())],
        });

        assert_eq!(graph.permission_by_name("edit-articles", "web", None), Some(&edit));
        assert!(graph.permission_by_name("edit-articles", "admin", None).is_none());
        assert_eq!(graph.group_by_name("editors", "web"), Some(&editors));
        assert!(graph.group_has_permission(editors.id, edit.id));
        assert_eq!(graph.groups_with(edit.id).collect::<Vec<_>>(), [editors.id]);
    }

    #[test]
    fn scoped_name_falls_back_to_unscoped() {
        let team = Uuid::new_v4();
        let global = permission("publish", "web", None);
        let scoped = permission("publish", "web", Some(team));
        let graph = PermissionGraph::from_snapshot(IdentitySnapshot {
            permissions: vec![global.clone(), scoped.clone()],
            ..IdentitySnapshot::default()
        });

        let by_name = PermissionRef::from("publish");
        assert_eq!(graph.find_permission(&by_name, "web", Some(team)), Some(&scoped));
        assert_eq!(graph.find_permission(&by_name, "web", None), Some(&global));
        assert_eq!(
            graph.find_permission(&by_name, "web", Some(Uuid::new_v4())),
            Some(&global)
        );
    }

    #[tokio::test]
    async fn cache_builds_once_until_invalidated() {
        let cache = PermissionGraphCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(PermissionGraph::default())
        };

        cache.get_or_build(load).await.unwrap();
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached());

        cache.invalidate();
        assert!(!cache.is_cached());
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_graph_is_rebuilt() {
        let cache = PermissionGraphCache::new(Duration::from_millis(20));
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(PermissionGraph::default())
        };

        cache.get_or_build(load).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_caches_nothing() {
        let cache = PermissionGraphCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_build(|| async { Err::<PermissionGraph, _>("down") })
            .await;

        assert_eq!(result.unwrap_err(), "down");
        assert!(!cache.is_cached());
    }

    #[tokio::test]
    async fn rebuild_invalidated_midway_is_not_installed() {
        let cache = PermissionGraphCache::new(Duration::from_secs(60));

        let cache_ref = &cache;
        let graph = cache
            .get_or_build(move || async move {
                // A mutation lands while the snapshot is being read
                cache_ref.invalidate();
                Ok::<_, Infallible>(PermissionGraph::default())
            })
            .await
            .unwrap();

        assert_eq!(graph.permission_count(), 0);
        assert!(!cache.is_cached());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_share_one_rebuild() {
        let cache = Arc::new(PermissionGraphCache::new(Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build(|| {
                        let loads = Arc::clone(&loads);
                        async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, Infallible>(PermissionGraph::default())
                        }
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
