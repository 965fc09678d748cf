//! The "currently active filesystem".
//!
//! Most callers hold a [`LayeredFs`] and pass it around explicitly. Two kinds
//! of code cannot: late-bound nodes (see [`Node::late_bound`]), which are
//! created before any particular filesystem is chosen, and embedded engines
//! that call back into us through an interface we don't control. For those,
//! one filesystem at a time can be made ambient.
//!
//! - [`scope`] makes a filesystem ambient for the duration of a future
//!   (task-local; removal is guaranteed on every exit path).
//! - [`install`] is the synchronous shim: it occupies the current thread's
//!   slot until the returned guard is dropped.
//!
//! [`current`] checks the task scope first, then the thread slot.
//!
//! [`Node::late_bound`]: crate::Node::late_bound

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::fs::LayeredFs;

tokio::task_local! {
    static TASK_FS: Arc<LayeredFs>;
}

/// An installation on the thread slot. The generation tells a guard whether
/// the slot still holds what it installed.
struct Installed {
    generation: u64,
    fs: Arc<LayeredFs>,
}

thread_local! {
    static THREAD_FS: RefCell<Option<Installed>> = const { RefCell::new(None) };
    static NEXT_GENERATION: Cell<u64> = const { Cell::new(0) };
}

/// Run `fut` with `fs` as the active filesystem.
///
/// Scopes nest; the innermost wins until it completes.
pub async fn scope<F: Future>(fs: Arc<LayeredFs>, fut: F) -> F::Output {
    TASK_FS.scope(fs, fut).await
}

/// Make `fs` the active filesystem for the current thread.
///
/// Fails with `ContextOccupied` if the thread already has one. The slot is
/// cleared when the guard drops, unless it has since been cleared and
/// refilled by someone else.
pub fn install(fs: Arc<LayeredFs>) -> VfsResult<ContextGuard> {
    THREAD_FS.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(VfsError::ContextOccupied);
        }
        let generation = NEXT_GENERATION.with(|next| {
            let generation = next.get();
            next.set(generation.wrapping_add(1));
            generation
        });
        *slot = Some(Installed { generation, fs });
        Ok(ContextGuard {
            generation,
            _not_send: PhantomData,
        })
    })
}

/// Clear the current thread's slot, returning what was installed.
pub fn remove() -> Option<Arc<LayeredFs>> {
    THREAD_FS.with(|slot| slot.borrow_mut().take().map(|installed| installed.fs))
}

/// The active filesystem, if any.
pub fn current() -> Option<Arc<LayeredFs>> {
    TASK_FS.try_with(Arc::clone).ok().or_else(|| {
        THREAD_FS.with(|slot| slot.borrow().as_ref().map(|installed| Arc::clone(&installed.fs)))
    })
}

/// Owns one installation on the thread slot. Tied to the installing thread.
#[must_use = "dropping the guard removes the filesystem immediately"]
#[derive(Debug)]
pub struct ContextGuard {
    generation: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // The slot may already be gone if the thread is exiting.
        let _ = THREAD_FS.try_with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot
                .as_ref()
                .is_some_and(|installed| installed.generation == self.generation)
            {
                *slot = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use tempfile::TempDir;

    fn fs_over(dir: &TempDir) -> Arc<LayeredFs> {
        Arc::new(LayeredFs::builder().directory("/site", dir.path()).build())
    }

    #[test]
    fn test_install_and_remove() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);

        assert!(current().is_none());
        let guard = install(Arc::clone(&fs)).unwrap();
        assert!(Arc::ptr_eq(&current().unwrap(), &fs));

        assert!(matches!(install(Arc::clone(&fs)), Err(VfsError::ContextOccupied)));

        drop(guard);
        assert!(current().is_none());
    }

    #[test]
    fn test_explicit_remove() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);

        let guard = install(Arc::clone(&fs)).unwrap();
        assert!(remove().is_some());
        assert!(current().is_none());
        // Guard drop after an explicit remove is harmless.
        drop(guard);
        assert!(remove().is_none());
    }

    #[test]
    fn test_stale_guard_leaves_later_install_alone() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let fs_a = fs_over(&a);
        let fs_b = fs_over(&b);

        let guard_a = install(fs_a).unwrap();
        assert!(remove().is_some());
        let guard_b = install(Arc::clone(&fs_b)).unwrap();

        drop(guard_a);
        assert!(Arc::ptr_eq(&current().unwrap(), &fs_b));

        drop(guard_b);
        assert!(current().is_none());
    }

    #[test]
    fn test_reinstalling_the_same_fs_gets_a_fresh_guard() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);

        let first = install(Arc::clone(&fs)).unwrap();
        remove();
        let _second = install(Arc::clone(&fs)).unwrap();
        drop(first);
        assert!(current().is_some());
    }

    #[test]
    fn test_late_bound_through_installed_filesystem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.css"), "installed").unwrap();
        let node = Node::late_bound("/site/x.css");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let guard = install(fs_over(&dir)).unwrap();
        assert!(runtime.block_on(node.exists()));
        assert_eq!(runtime.block_on(node.read_to_end()).unwrap(), b"installed");

        drop(guard);
        assert!(!runtime.block_on(node.exists()));
    }

    #[test]
    fn test_slot_is_per_thread() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);
        let _guard = install(fs).unwrap();

        let seen_elsewhere = std::thread::spawn(|| current().is_some()).join().unwrap();
        assert!(!seen_elsewhere);
        assert!(current().is_some());
    }

    #[tokio::test]
    async fn test_scope_is_removed_after_completion() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);

        let inside = scope(Arc::clone(&fs), async { current().is_some() }).await;
        assert!(inside);
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_scope_removed_on_error_path() {
        let dir = TempDir::new().unwrap();
        let fs = fs_over(&dir);

        let result: Result<(), &str> = scope(fs, async { Err("compile failed") }).await;
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_late_bound_follows_the_active_filesystem() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(a.path().join("x.css"), "from a").unwrap();
        std::fs::write(b.path().join("x.css"), "from b").unwrap();

        let node = Node::late_bound("/site/x.css");
        assert!(!node.exists().await);

        let read_a = scope(fs_over(&a), node.read_to_end()).await.unwrap();
        let read_b = scope(fs_over(&b), node.read_to_end()).await.unwrap();
        assert_eq!(read_a, b"from a");
        assert_eq!(read_b, b"from b");
    }

    #[tokio::test]
    async fn test_nested_scopes() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let fs_a = fs_over(&a);
        let fs_b = fs_over(&b);

        let (outer, inner) = scope(Arc::clone(&fs_a), async {
            let inner = scope(Arc::clone(&fs_b), async { current().unwrap() }).await;
            (current().unwrap(), inner)
        })
        .await;
        assert!(Arc::ptr_eq(&outer, &fs_a));
        assert!(Arc::ptr_eq(&inner, &fs_b));
    }
}
