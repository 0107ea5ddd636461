//! Interned member identities.
//!
//! Two descriptors that name the same member (same declaring type, name, parameter types and
//! return type) always resolve to the same [`MemberKey`] instance. The key owns the per-member
//! lock, so mutual exclusion between scopes follows directly from interning: whoever holds the
//! key's [`KeyGuard`] owns the member's dispatch slot and patch.
//!
//! # Lock Ordering
//!
//! Every key receives a process-unique ordinal when it is first interned. Keys order by that
//! ordinal, and batch application always locks in ascending order, so two batches sharing any
//! subset of members can never deadlock against each other.

use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering},
        Arc, Mutex, OnceLock,
    },
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::{
    member::{join_types, MethodDescriptor, PropertyDescriptor},
    types::TypeRef,
    Error, Result,
};

/// The structural identity of a member.
///
/// Properties use an empty parameter list and their property type as `return_type`; methods
/// use their declared parameters and return type. `declaring_type` is `None` only for members
/// synthesized outside any type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberIdentity {
    /// Member name
    pub name: String,
    /// Type that declares the member
    pub declaring_type: Option<TypeRef>,
    /// Parameter types, excluding the receiver
    pub parameters: Vec<TypeRef>,
    /// Return type, or property type
    pub return_type: Option<TypeRef>,
}

struct KeyInner {
    identity: MemberIdentity,
    ordinal: u64,
    lock: Arc<AsyncMutex<()>>,
    /// Set while a [`KeyGuard`] exists for this key.
    held: AtomicBool,
}

/// Canonical handle for one member.
///
/// Equality is identity: two keys are equal exactly when they came out of the intern table for
/// the same [`MemberIdentity`]. Cloning is cheap.
///
/// # Examples
///
/// ```rust
/// use staticplug::{member::{MemberKey, MethodDescriptor}, types::{TypeBuilder, TypeRef}};
///
/// let host = TypeBuilder::class("App", "Host").build();
/// let a = MethodDescriptor::static_method(host.clone(), "Run").returns(TypeRef::i32());
/// let b = MethodDescriptor::static_method(host, "Run").returns(TypeRef::i32());
///
/// assert_eq!(MemberKey::for_method(&a), MemberKey::for_method(&b));
/// ```
#[derive(Clone)]
pub struct MemberKey(Arc<KeyInner>);

fn intern_table() -> &'static Mutex<HashMap<MemberIdentity, MemberKey>> {
    static TABLE: OnceLock<Mutex<HashMap<MemberIdentity, MemberKey>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(1);

impl MemberKey {
    /// Returns the unique key for `identity`, creating it on first use.
    #[must_use]
    pub fn canonical(identity: MemberIdentity) -> MemberKey {
        let mut table = lock!(intern_table());
        table
            .entry(identity)
            .or_insert_with_key(|identity| {
                let key = MemberKey(Arc::new(KeyInner {
                    identity: identity.clone(),
                    ordinal: NEXT_ORDINAL.fetch_add(1, AtomicOrdering::Relaxed),
                    lock: Arc::new(AsyncMutex::new(())),
                    held: AtomicBool::new(false),
                }));
                log::trace!("interned member key {key}");
                key
            })
            .clone()
    }

    /// Returns the key of a method.
    #[must_use]
    pub fn for_method(method: &MethodDescriptor) -> MemberKey {
        Self::canonical(MemberIdentity {
            name: method.name().to_string(),
            declaring_type: Some(method.declaring_type().clone()),
            parameters: method.parameters().to_vec(),
            return_type: Some(method.return_type().clone()),
        })
    }

    /// Returns the key of a property as a whole.
    ///
    /// This key is distinct from the keys of the accessor methods.
    #[must_use]
    pub fn for_property(property: &PropertyDescriptor) -> MemberKey {
        Self::canonical(MemberIdentity {
            name: property.name().to_string(),
            declaring_type: Some(property.declaring_type().clone()),
            parameters: Vec::new(),
            return_type: Some(property.property_type().clone()),
        })
    }

    /// Returns the structural identity behind this key.
    #[must_use]
    pub fn identity(&self) -> &MemberIdentity {
        &self.0.identity
    }

    /// Returns the position of this key in the global lock order.
    #[must_use]
    pub fn ordinal(&self) -> u64 {
        self.0.ordinal
    }

    /// Returns `true` while some scope holds this member.
    ///
    /// Only observes the lock state. It never acquires the lock, so it cannot make a waiting
    /// batch queue behind it.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.0.held.load(AtomicOrdering::Acquire)
    }

    /// Acquires exclusive ownership of the member.
    ///
    /// Waits as long as necessary unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token is cancelled before the lock is obtained.
    pub(crate) async fn lock(&self, cancel: Option<&CancellationToken>) -> Result<KeyGuard> {
        let lock = Arc::clone(&self.0.lock);
        let guard = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => return Err(Error::Cancelled(self.to_string())),
                guard = lock.lock_owned() => guard,
            },
            None => lock.lock_owned().await,
        };

        Ok(KeyGuard::new(self.clone(), guard))
    }

    /// Acquires exclusive ownership of the member from synchronous code.
    ///
    /// Must not be called from within an async runtime.
    pub(crate) fn blocking_lock(&self) -> KeyGuard {
        let guard = Arc::clone(&self.0.lock).blocking_lock_owned();
        KeyGuard::new(self.clone(), guard)
    }
}

impl PartialEq for MemberKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemberKey {}

impl Hash for MemberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.ordinal.hash(state);
    }
}

impl PartialOrd for MemberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.ordinal.cmp(&other.0.ordinal)
    }
}

impl fmt::Display for MemberKey {
    /// Renders `Namespace.Type.Name(ParamType, ...)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = &self.0.identity;
        if let Some(declaring) = &identity.declaring_type {
            write!(f, "{}.", declaring.full_name())?;
        }
        write!(f, "{}({})", identity.name, join_types(&identity.parameters))
    }
}

impl fmt::Debug for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberKey(#{} {})", self.0.ordinal, self)
    }
}

/// Exclusive ownership of one member, released on drop.
pub struct KeyGuard {
    key: MemberKey,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    fn new(key: MemberKey, guard: OwnedMutexGuard<()>) -> Self {
        key.0.held.store(true, AtomicOrdering::Release);
        log::debug!("acquired member lock {key}");
        Self { key, _guard: guard }
    }

    /// Returns the member this guard owns.
    #[must_use]
    pub fn key(&self) -> &MemberKey {
        &self.key
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyGuard").field(&self.key).finish()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Cleared before `_guard` drops, so the next owner's store always lands last.
        self.key.0.held.store(false, AtomicOrdering::Release);
        log::debug!("released member lock {}", self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::TypeBuilder;

    fn host() -> TypeRef {
        TypeBuilder::class("StaticPlug.Tests.Keys", "Host").build()
    }

    #[test]
    fn test_canonical_keys_are_shared() {
        let a = MethodDescriptor::static_method(host(), "Same").param(TypeRef::i32());
        let b = MethodDescriptor::static_method(host(), "Same").param(TypeRef::i32());

        let ka = MemberKey::for_method(&a);
        let kb = MemberKey::for_method(&b);
        assert_eq!(ka, kb);
        assert_eq!(ka.ordinal(), kb.ordinal());
    }

    #[test]
    fn test_overloads_have_distinct_keys() {
        let by_int = MethodDescriptor::static_method(host(), "Overload").param(TypeRef::i32());
        let by_str = MethodDescriptor::static_method(host(), "Overload").param(TypeRef::string());

        assert_ne!(MemberKey::for_method(&by_int), MemberKey::for_method(&by_str));
    }

    #[test]
    fn test_property_key_differs_from_getter() {
        let property = PropertyDescriptor::static_property(host(), "Level", TypeRef::i32())
            .readable();
        let getter = property.getter().unwrap();

        assert_ne!(property.key(), getter.key());
    }

    #[test]
    fn test_display() {
        let method = MethodDescriptor::static_method(host(), "Render")
            .param(TypeRef::string())
            .param(TypeRef::i32());
        assert_eq!(
            MemberKey::for_method(&method).to_string(),
            "StaticPlug.Tests.Keys.Host.Render(System.String, System.Int32)"
        );
    }

    #[test]
    fn test_ordering_follows_interning() {
        let first = MemberKey::for_method(&MethodDescriptor::static_method(host(), "OrderA"));
        let second = MemberKey::for_method(&MethodDescriptor::static_method(host(), "OrderB"));
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let key = MemberKey::for_method(&MethodDescriptor::static_method(host(), "Exclusive"));

        let guard = key.lock(None).await.unwrap();
        assert!(key.is_locked());
        drop(guard);
        assert!(!key.is_locked());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_is_locked_leaves_waiters_alone() {
        let key = MemberKey::for_method(&MethodDescriptor::static_method(host(), "Observed"));
        assert!(!key.is_locked());

        let held = key.lock(None).await.unwrap();
        let waiter = {
            let key = key.clone();
            tokio::spawn(async move { key.lock(None).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        for _ in 0..100 {
            assert!(key.is_locked());
        }
        assert!(!waiter.is_finished());

        drop(held);
        let next = waiter.await.unwrap().unwrap();
        assert!(key.is_locked());
        drop(next);
        assert!(!key.is_locked());
    }

    #[test]
    fn test_blocking_lock_reports_held() {
        let key = MemberKey::for_method(&MethodDescriptor::static_method(host(), "Blocking"));

        let guard = key.blocking_lock();
        assert!(key.is_locked());
        assert_eq!(guard.key(), &key);
        drop(guard);
        assert!(!key.is_locked());
    }

    #[tokio::test]
    async fn test_cancelled_lock() {
        let key = MemberKey::for_method(&MethodDescriptor::static_method(host(), "Cancelled"));
        let _held = key.lock(None).await.unwrap();

        let token = CancellationToken::new();
        let waiter = {
            let key = key.clone();
            let token = token.clone();
            tokio::spawn(async move { key.lock(Some(&token)).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled(_))));
    }
}
