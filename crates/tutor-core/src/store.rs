//! Persistence Store
//!
//! In-memory keyed storage with the three primitives the booking and payment
//! flows rely on:
//!
//! - **Transactions** - writes are staged and become visible all at once on
//!   [`Transaction::commit`]; dropping an uncommitted transaction rolls it back.
//! - **Row locks** - [`Transaction::lock`] takes an exclusive lock on one row
//!   (the `SELECT ... FOR UPDATE` equivalent), held until the transaction ends.
//!   Waits are bounded by the store's lock timeout.
//! - **Unique constraints** - re-checked at commit against committed state
//!   merged with the staged writes, surfaced as [`StoreError::UniqueViolation`].
//!
//! ```text
//!   tx A: lock(slot) ──── read ── put ── commit ─┐
//!   tx B: lock(slot) ········ waits ··············└─ read (sees A) ── Conflict
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    AvailabilitySlot, Booking, BookingId, Conversation, ConversationId, Course, CourseId, Lesson,
    LessonId, Message, MessageId, Payment, PaymentId, PaymentTarget, Professor, ProfessorId,
    Review, ReviewId, SlotId, Student, StudentId, User, UserId,
};

/// Default bound on how long a transaction waits for a row lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type StoreResult<T> = std::result::Result<T, StoreError>;

type RowKey = (&'static str, Uuid);

/// A value that must not repeat within a table
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub constraint: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(constraint: &'static str, value: impl ToString) -> Self {
        Self {
            constraint,
            value: value.to_string(),
        }
    }
}

/// A storable row
///
/// Implemented for every model type by the `tables!` declaration below.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Into<Uuid> + std::fmt::Debug + Send + Sync + 'static;

    /// Table name, used for lock keys and logging
    const TABLE: &'static str;

    fn id(&self) -> Self::Id;

    /// Keys enforced unique at commit
    fn unique_keys(&self) -> Vec<UniqueKey>;

    #[doc(hidden)]
    fn rows(tables: &Tables) -> &HashMap<Self::Id, Self>;

    #[doc(hidden)]
    fn rows_mut(tables: &mut Tables) -> &mut HashMap<Self::Id, Self>;

    #[doc(hidden)]
    fn staged(writes: &Staged) -> &HashMap<Self::Id, Option<Self>>;

    #[doc(hidden)]
    fn staged_mut(writes: &mut Staged) -> &mut HashMap<Self::Id, Option<Self>>;
}

macro_rules! tables {
    ($($field:ident: $record:ty => $id:ty, $table:literal, $keys:expr;)+) => {
        /// Committed rows, one map per table
        #[derive(Default)]
        pub struct Tables {
            $($field: HashMap<$id, $record>,)+
        }

        /// Writes staged by an open transaction (`None` = delete)
        #[derive(Default)]
        pub struct Staged {
            $($field: HashMap<$id, Option<$record>>,)+
        }

        impl Staged {
            fn len(&self) -> usize {
                0 $(+ self.$field.len())+
            }

            fn check_unique(&self, tables: &Tables) -> StoreResult<()> {
                $(check_unique::<$record>(tables, self)?;)+
                Ok(())
            }

            fn apply(self, tables: &mut Tables) {
                $(apply::<$record>(tables, self.$field);)+
            }
        }

        $(
            impl Record for $record {
                type Id = $id;

                const TABLE: &'static str = $table;

                fn id(&self) -> $id {
                    self.id
                }

                fn unique_keys(&self) -> Vec<UniqueKey> {
                    let keys: fn(&$record) -> Vec<UniqueKey> = $keys;
                    keys(self)
                }

                fn rows(tables: &Tables) -> &HashMap<$id, Self> {
                    &tables.$field
                }

                fn rows_mut(tables: &mut Tables) -> &mut HashMap<$id, Self> {
                    &mut tables.$field
                }

                fn staged(writes: &Staged) -> &HashMap<$id, Option<Self>> {
                    &writes.$field
                }

                fn staged_mut(writes: &mut Staged) -> &mut HashMap<$id, Option<Self>> {
                    &mut writes.$field
                }
            }
        )+
    };
}

tables! {
    users: User => UserId, "users",
        |u| vec![UniqueKey::new("users.email", u.email.to_lowercase())];
    professors: Professor => ProfessorId, "professors",
        |p| vec![UniqueKey::new("professors.user_id", p.user_id)];
    students: Student => StudentId, "students",
        |s| vec![UniqueKey::new("students.user_id", s.user_id)];
    courses: Course => CourseId, "courses", |_| Vec::new();
    lessons: Lesson => LessonId, "lessons", |_| Vec::new();
    slots: AvailabilitySlot => SlotId, "availability", |_| Vec::new();
    bookings: Booking => BookingId, "bookings",
        |b| vec![UniqueKey::new("bookings.availability_id", b.availability_id)];
    payments: Payment => PaymentId, "payments", paid_payment_keys;
    reviews: Review => ReviewId, "reviews",
        |r| r
            .course_id
            .map(|course| UniqueKey::new("reviews.student_course", format!("{}:{course}", r.student_id)))
            .into_iter()
            .collect();
    conversations: Conversation => ConversationId, "conversations",
        |c| vec![UniqueKey::new(
            "conversations.student_professor",
            format!("{}:{}", c.student_id, c.professor_id),
        )];
    messages: Message => MessageId, "messages", |_| Vec::new();
}

/// At most one PAID payment per (student, booking) and per (student, course)
fn paid_payment_keys(payment: &Payment) -> Vec<UniqueKey> {
    if !payment.is_paid() {
        return Vec::new();
    }
    let key = match payment.target {
        PaymentTarget::Booking(booking) => UniqueKey::new(
            "payments.paid_student_booking",
            format!("{}:{booking}", payment.student_id),
        ),
        PaymentTarget::Course(course) => UniqueKey::new(
            "payments.paid_student_course",
            format!("{}:{course}", payment.student_id),
        ),
    };
    vec![key]
}

fn check_unique<R: Record>(tables: &Tables, staged: &Staged) -> StoreResult<()> {
    let writes = R::staged(staged);
    if writes.is_empty() {
        return Ok(());
    }

    let mut seen: HashMap<UniqueKey, R::Id> = HashMap::new();
    for (id, row) in R::rows(tables) {
        if writes.contains_key(id) {
            continue;
        }
        for key in row.unique_keys() {
            seen.insert(key, *id);
        }
    }

    for (id, row) in writes {
        let Some(row) = row else { continue };
        for key in row.unique_keys() {
            let constraint = key.constraint;
            if let Some(other) = seen.insert(key, *id) {
                if other != *id {
                    return Err(StoreError::UniqueViolation { constraint });
                }
            }
        }
    }

    Ok(())
}

fn apply<R: Record>(tables: &mut Tables, writes: HashMap<R::Id, Option<R>>) {
    let rows = R::rows_mut(tables);
    for (id, row) in writes {
        match row {
            Some(row) => {
                rows.insert(id, row);
            }
            None => {
                rows.remove(&id);
            }
        }
    }
}

/// Read access shared by the store and open transactions
pub trait Reader {
    /// Fetch one row by id
    fn get<R: Record>(&self, id: R::Id) -> StoreResult<Option<R>>;

    /// All rows matching `filter`, in no particular order
    fn find<R: Record>(&self, filter: impl Fn(&R) -> bool) -> StoreResult<Vec<R>>;

    /// First row matching `filter`
    fn find_one<R: Record>(&self, filter: impl Fn(&R) -> bool) -> StoreResult<Option<R>> {
        Ok(self.find(filter)?.into_iter().next())
    }
}

/// In-memory persistence store
pub struct MemoryStore {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            row_locks: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Start a transaction
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            id: Uuid::new_v4(),
            staged: Staged::default(),
            held: HashMap::new(),
            committed: false,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn row_lock(&self, key: RowKey) -> StoreResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.row_locks.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(locks.entry(key).or_default().clone())
    }

    /// Drop lock entries nobody holds or waits on
    fn prune_row_locks(&self) {
        if let Ok(mut locks) = self.row_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

impl Reader for MemoryStore {
    fn get<R: Record>(&self, id: R::Id) -> StoreResult<Option<R>> {
        Ok(R::rows(&*self.read()?).get(&id).cloned())
    }

    fn find<R: Record>(&self, filter: impl Fn(&R) -> bool) -> StoreResult<Vec<R>> {
        let tables = self.read()?;
        Ok(R::rows(&tables)
            .values()
            .filter(|row| filter(row))
            .cloned()
            .collect())
    }
}

/// An atomic unit of work against a [`MemoryStore`]
///
/// Reads see this transaction's own staged writes. Nothing is visible to
/// anyone else until [`commit`](Self::commit). Dropping without committing
/// discards every staged write and releases every row lock.
pub struct Transaction<'a> {
    store: &'a MemoryStore,
    id: Uuid,
    staged: Staged,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    committed: bool,
}

impl Transaction<'_> {
    /// Take the exclusive lock on a row, then read it
    ///
    /// Re-entrant within one transaction. Fails with
    /// [`StoreError::LockTimeout`] if the lock is not granted in time.
    pub async fn lock<R: Record>(&mut self, id: R::Id) -> StoreResult<Option<R>> {
        let key = (R::TABLE, id.into());

        if !self.held.contains_key(&key) {
            let row_lock = self.store.row_lock(key)?;
            let guard = tokio::time::timeout(self.store.lock_timeout, row_lock.lock_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(tx = %self.id, table = R::TABLE, id = %key.1, "Row lock wait timed out");
                    StoreError::LockTimeout {
                        table: R::TABLE,
                        id: key.1,
                    }
                })?;
            self.held.insert(key, guard);
        }

        self.get(id)
    }

    /// Stage an insert or update
    pub fn put<R: Record>(&mut self, row: R) {
        R::staged_mut(&mut self.staged).insert(row.id(), Some(row));
    }

    /// Stage a delete
    pub fn delete<R: Record>(&mut self, id: R::Id) {
        R::staged_mut(&mut self.staged).insert(id, None);
    }

    /// Apply every staged write atomically, then release row locks
    pub fn commit(mut self) -> StoreResult<()> {
        let staged = std::mem::take(&mut self.staged);
        let writes = staged.len();

        {
            let mut tables = self.store.tables.write().map_err(|_| StoreError::Poisoned)?;
            if let Err(e) = staged.check_unique(&tables) {
                tracing::debug!(tx = %self.id, error = %e, "Commit rejected, rolled back");
                return Err(e);
            }
            staged.apply(&mut tables);
        }

        self.committed = true;
        tracing::debug!(tx = %self.id, writes, "Transaction committed");
        Ok(())
    }

    /// Discard staged writes and release row locks
    pub fn rollback(self) {
        drop(self);
    }
}

impl Reader for Transaction<'_> {
    fn get<R: Record>(&self, id: R::Id) -> StoreResult<Option<R>> {
        if let Some(staged) = R::staged(&self.staged).get(&id) {
            return Ok(staged.clone());
        }
        self.store.get(id)
    }

    fn find<R: Record>(&self, filter: impl Fn(&R) -> bool) -> StoreResult<Vec<R>> {
        let writes = R::staged(&self.staged);
        let mut rows: Vec<R> = self
            .store
            .find(|row: &R| !writes.contains_key(&row.id()) && filter(row))?;
        rows.extend(writes.values().flatten().filter(|row| filter(row)).cloned());
        Ok(rows)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let writes = self.staged.len();
            if writes > 0 {
                tracing::debug!(tx = %self.id, writes, "Transaction rolled back");
            }
        }

        if !self.held.is_empty() {
            self.held.clear();
            self.store.prune_row_locks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingStatus, Role};
    use chrono::{Duration as ChronoDuration, Utc};

    fn slot() -> AvailabilitySlot {
        let start = Utc::now() + ChronoDuration::hours(1);
        AvailabilitySlot {
            id: SlotId::new(),
            professor_id: ProfessorId::new(),
            start_time: start,
            end_time: start + ChronoDuration::hours(1),
            timezone: "UTC".into(),
            is_booked: false,
            created_at: Utc::now(),
        }
    }

    fn booking_for(slot: SlotId) -> Booking {
        Booking {
            id: BookingId::new(),
            student_id: StudentId::new(),
            professor_id: ProfessorId::new(),
            availability_id: slot,
            course_id: None,
            status: BookingStatus::Pending,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let slot = slot();

        let mut tx = store.begin();
        tx.put(slot.clone());
        assert!(tx.get::<AvailabilitySlot>(slot.id).unwrap().is_some());
        assert!(store.get::<AvailabilitySlot>(slot.id).unwrap().is_none());

        tx.commit().unwrap();
        assert!(store.get::<AvailabilitySlot>(slot.id).unwrap().is_some());
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = MemoryStore::new();
        let slot = slot();

        {
            let mut tx = store.begin();
            tx.put(slot.clone());
        }

        assert!(store.get::<AvailabilitySlot>(slot.id).unwrap().is_none());
    }

    #[test]
    fn test_transaction_sees_own_deletes() {
        let store = MemoryStore::new();
        let slot = slot();
        let mut tx = store.begin();
        tx.put(slot.clone());
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.delete::<AvailabilitySlot>(slot.id);
        assert!(tx.get::<AvailabilitySlot>(slot.id).unwrap().is_none());
        assert!(tx.find::<AvailabilitySlot>(|_| true).unwrap().is_empty());
        tx.commit().unwrap();

        assert!(store.find::<AvailabilitySlot>(|_| true).unwrap().is_empty());
    }

    #[test]
    fn test_unique_violation_applies_nothing() {
        let store = MemoryStore::new();
        let slot = slot();

        let mut tx = store.begin();
        tx.put(booking_for(slot.id));
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.put(slot.clone());
        tx.put(booking_for(slot.id));
        let err = tx.commit().unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueViolation {
                constraint: "bookings.availability_id"
            }
        );

        // The slot staged alongside the rejected booking was not applied
        assert!(store.get::<AvailabilitySlot>(slot.id).unwrap().is_none());
        assert_eq!(store.find::<Booking>(|_| true).unwrap().len(), 1);
    }

    #[test]
    fn test_updating_a_row_keeps_its_own_unique_key() {
        let store = MemoryStore::new();
        let user = User {
            id: UserId::new(),
            email: "Ada@Example.com".into(),
            name: "Ada".into(),
            role: Role::Student,
            password_hash: String::new(),
            created_at: Utc::now(),
        };

        let mut tx = store.begin();
        tx.put(user.clone());
        tx.commit().unwrap();

        let mut renamed = user.clone();
        renamed.name = "Ada L.".into();
        let mut tx = store.begin();
        tx.put(renamed);
        tx.commit().unwrap();

        let mut duplicate = user;
        duplicate.id = UserId::new();
        duplicate.email = "ada@example.com".into();
        let mut tx = store.begin();
        tx.put(duplicate);
        assert!(tx.commit().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_row_lock_serializes_writers() {
        let store = Arc::new(MemoryStore::new());
        let slot = slot();
        let id = slot.id;
        {
            let mut tx = store.begin();
            tx.put(slot);
            tx.commit().unwrap();
        }

        let mut first = store.begin();
        let seen = first.lock::<AvailabilitySlot>(id).await.unwrap().unwrap();
        assert!(!seen.is_booked);

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin();
                let row = tx.lock::<AvailabilitySlot>(id).await.unwrap().unwrap();
                row.is_booked
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let mut booked = seen;
        booked.is_booked = true;
        first.put(booked);
        first.commit().unwrap();

        // The waiter only reads after the first commit
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_wait_is_bounded() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(20));
        let id = SlotId::new();

        let mut holder = store.begin();
        holder.lock::<AvailabilitySlot>(id).await.unwrap();

        let mut other = store.begin();
        let err = other.lock::<AvailabilitySlot>(id).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { table: "availability", .. }));

        drop(holder);
        assert!(other.lock::<AvailabilitySlot>(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_is_reentrant() {
        let store = MemoryStore::new();
        let id = SlotId::new();
        let mut tx = store.begin();
        tx.lock::<AvailabilitySlot>(id).await.unwrap();
        assert!(tx.lock::<AvailabilitySlot>(id).await.unwrap().is_none());
    }
}
