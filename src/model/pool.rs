use serde::{Deserialize, Serialize};

use crate::model::{
    check_same_identifier, non_negative_u32, require_identifier, Id, UpdateValue, Violation,
};
use crate::store::query::{OrderKey, Orderable};

/// A named slot budget. `used_slots + queued_slots` never exceeds `slots`;
/// `open_slots` is whatever remains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: Id,
    pub slots: u32,
    pub used_slots: u32,
    pub queued_slots: u32,
    pub open_slots: u32,
    pub description: Option<String>,
}

impl Pool {
    pub fn in_use(&self) -> u32 {
        self.used_slots + self.queued_slots
    }

    /// Check-and-set of the usage counters; counters left as `None` keep
    /// their current value.
    pub fn set_usage(&mut self, usage: SlotUsage) -> Result<(), Violation> {
        let used = match usage.used_slots {
            Some(used) => non_negative_u32("used_slots", used)?,
            None => self.used_slots,
        };
        let queued = match usage.queued_slots {
            Some(queued) => non_negative_u32("queued_slots", queued)?,
            None => self.queued_slots,
        };
        if u64::from(used) + u64::from(queued) > u64::from(self.slots) {
            return Err(Violation::SlotOvercommit {
                used,
                queued,
                total: self.slots,
            });
        }

        self.used_slots = used;
        self.queued_slots = queued;
        self.open_slots = self.slots - used - queued;
        Ok(())
    }

    pub fn apply_update(&mut self, update: PoolUpdate) -> Result<(), Violation> {
        check_same_identifier("name", &self.name, update.name.as_deref())?;
        if let Some(slots) = update.slots {
            let slots = non_negative_u32("slots", slots)?;
            if slots < self.in_use() {
                return Err(Violation::SlotsBelowUsage {
                    slots,
                    in_use: self.in_use(),
                });
            }
            self.slots = slots;
            self.open_slots = slots - self.in_use();
        }
        self.description = update.description.apply_to(self.description.take());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPool {
    pub name: Option<Id>,
    pub slots: Option<i64>,
    pub description: Option<String>,
}

impl NewPool {
    pub fn new(name: impl Into<Id>, slots: i64) -> Self {
        Self {
            name: Some(name.into()),
            slots: Some(slots),
            description: None,
        }
    }

    pub fn into_pool(self) -> Result<Pool, Violation> {
        let name = require_identifier("name", self.name)?;
        let slots = self.slots.ok_or(Violation::Missing { field: "slots" })?;
        let slots = non_negative_u32("slots", slots)?;

        Ok(Pool {
            name,
            slots,
            used_slots: 0,
            queued_slots: 0,
            open_slots: slots,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolUpdate {
    pub name: Option<Id>,
    pub slots: Option<i64>,
    #[serde(default)]
    pub description: UpdateValue<String>,
}

/// Body of the slot-usage update.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SlotUsage {
    pub used_slots: Option<i64>,
    pub queued_slots: Option<i64>,
}

impl SlotUsage {
    pub fn new(used_slots: i64, queued_slots: i64) -> Self {
        Self {
            used_slots: Some(used_slots),
            queued_slots: Some(queued_slots),
        }
    }
}

impl Orderable for Pool {
    const ORDER_FIELDS: &'static [&'static str] =
        &["name", "slots", "used_slots", "queued_slots", "open_slots"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "name" => Some(OrderKey::text(&self.name)),
            "slots" => Some(OrderKey::Number(i64::from(self.slots))),
            "used_slots" => Some(OrderKey::Number(i64::from(self.used_slots))),
            "queued_slots" => Some(OrderKey::Number(i64::from(self.queued_slots))),
            "open_slots" => Some(OrderKey::Number(i64::from(self.open_slots))),
            _ => None,
        }
    }
}
