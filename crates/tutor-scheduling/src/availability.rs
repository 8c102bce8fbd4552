//! Availability Ledger
//!
//! Owns the availability-slot lifecycle: `free ⇄ booked`. Business rules for
//! when a slot flips live in the booking and payment flows; the flips here are
//! plain idempotent writes inside the caller's transaction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use tutor_core::{
    AvailabilitySlot, Booking, MarketError, MemoryStore, Professor, ProfessorId, Reader, Result,
    SlotId, Transaction,
};

/// Availability slot lifecycle
pub struct AvailabilityLedger {
    store: Arc<MemoryStore>,
}

impl AvailabilityLedger {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Publish a free slot
    ///
    /// Fails with `Validation` unless `start < end` and `start` is in the future.
    pub fn create(
        &self,
        professor_id: ProfessorId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: &str,
    ) -> Result<AvailabilitySlot> {
        if start >= end {
            return Err(MarketError::validation("Slot start must be before its end"));
        }
        if start <= Utc::now() {
            return Err(MarketError::validation("Slot must start in the future"));
        }
        let timezone = timezone.trim();
        if timezone.is_empty() {
            return Err(MarketError::validation("Timezone is required"));
        }

        let mut tx = self.store.begin();
        if tx.get::<Professor>(professor_id)?.is_none() {
            return Err(MarketError::not_found("Professor not found"));
        }

        let slot = AvailabilitySlot {
            id: SlotId::new(),
            professor_id,
            start_time: start,
            end_time: end,
            timezone: timezone.to_string(),
            is_booked: false,
            created_at: Utc::now(),
        };
        tx.put(slot.clone());
        tx.commit()?;

        tracing::info!(
            slot_id = %slot.id,
            professor_id = %professor_id,
            start = %slot.start_time,
            "Published availability slot"
        );
        Ok(slot)
    }

    pub fn get(&self, id: SlotId) -> Result<AvailabilitySlot> {
        self.store
            .get::<AvailabilitySlot>(id)?
            .ok_or_else(|| MarketError::not_found("Availability slot not found"))
    }

    /// Flip a slot to booked inside `tx`; no-op if already booked
    pub fn mark_booked(tx: &mut Transaction<'_>, id: SlotId) -> Result<()> {
        Self::set_booked(tx, id, true)
    }

    /// Flip a slot to free inside `tx`; no-op if already free
    pub fn mark_free(tx: &mut Transaction<'_>, id: SlotId) -> Result<()> {
        Self::set_booked(tx, id, false)
    }

    fn set_booked(tx: &mut Transaction<'_>, id: SlotId, booked: bool) -> Result<()> {
        let mut slot = tx
            .get::<AvailabilitySlot>(id)?
            .ok_or_else(|| MarketError::not_found("Availability slot not found"))?;
        if slot.is_booked != booked {
            slot.is_booked = booked;
            tx.put(slot);
        }
        Ok(())
    }

    /// A professor's slots, earliest first
    ///
    /// Without `include_booked`, only slots that can still be booked are
    /// returned: not booked and not referenced by any booking, canceled ones
    /// included. Takes no locks, so the result may lag a concurrent booking.
    pub fn list_by_professor(
        &self,
        professor_id: ProfessorId,
        include_booked: bool,
    ) -> Result<Vec<AvailabilitySlot>> {
        let taken: HashSet<SlotId> = if include_booked {
            HashSet::new()
        } else {
            self.store
                .find(|b: &Booking| b.professor_id == professor_id)?
                .into_iter()
                .map(|b| b.availability_id)
                .collect()
        };
        let mut slots = self.store.find(|slot: &AvailabilitySlot| {
            slot.professor_id == professor_id
                && (include_booked || (!slot.is_booked && !taken.contains(&slot.id)))
        })?;
        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }

    /// Remove a slot owned by `professor_id`
    ///
    /// Fails with `Conflict` while the slot is booked or referenced by any booking.
    pub async fn delete(&self, professor_id: ProfessorId, id: SlotId) -> Result<()> {
        let mut tx = self.store.begin();
        let slot = tx
            .lock::<AvailabilitySlot>(id)
            .await?
            .ok_or_else(|| MarketError::not_found("Availability slot not found"))?;

        if slot.professor_id != professor_id {
            return Err(MarketError::forbidden("Slot belongs to another professor"));
        }
        if slot.is_booked {
            return Err(MarketError::conflict("Cannot delete a booked slot"));
        }
        if tx.find_one(|b: &Booking| b.availability_id == id)?.is_some() {
            return Err(MarketError::conflict("Cannot delete a slot that has a booking"));
        }

        tx.delete::<AvailabilitySlot>(id);
        tx.commit()?;

        tracing::info!(slot_id = %id, professor_id = %professor_id, "Deleted availability slot");
        Ok(())
    }
}
