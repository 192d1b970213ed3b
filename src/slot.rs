//! Storage slot values and the "not yet loaded" marker

use serde_json::Value;

/// Value held by a storage slot.
///
/// `Unloaded` is the single process-wide marker for "no successful load
/// has committed this slot yet". It is distinct by construction from
/// every real payload: `null`, `0`, `""`, and `[]` are all `Loaded`
/// values. A slot moves from `Unloaded` to `Loaded` exactly once; there
/// is no invalidation or expiry.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// Never fetched (or every fetch so far has failed)
    Unloaded,
    /// Payload committed by the last successful load
    Loaded(Value),
}

impl SlotValue {
    /// The sole "has this been fetched yet" test.
    ///
    /// Emptiness or falsiness of a payload carries no meaning here;
    /// an empty collection is a perfectly good loaded value.
    pub fn is_unloaded(&self) -> bool {
        matches!(self, SlotValue::Unloaded)
    }

    /// Inverse of [`SlotValue::is_unloaded`]
    pub fn is_loaded(&self) -> bool {
        !self.is_unloaded()
    }

    /// Payload reference, or `None` when unloaded
    pub fn as_loaded(&self) -> Option<&Value> {
        match self {
            SlotValue::Unloaded => None,
            SlotValue::Loaded(value) => Some(value),
        }
    }

    /// Consume into the payload, or `None` when unloaded
    pub fn into_loaded(self) -> Option<Value> {
        match self {
            SlotValue::Unloaded => None,
            SlotValue::Loaded(value) => Some(value),
        }
    }
}

impl From<Value> for SlotValue {
    fn from(value: Value) -> Self {
        SlotValue::Loaded(value)
    }
}
