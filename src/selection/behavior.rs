//! Index normalization policy.

use serde::{Deserialize, Serialize};

use crate::error::SwitcherError;

/// How an out-of-range index request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBehavior {
    /// Pin to the last entry.
    #[default]
    Clamp,
    /// Keep the current selection.
    Ignore,
    /// Wrap around modulo the entry count.
    Wrap,
    /// Reject the request.
    Throw,
}

impl IndexBehavior {
    /// Normalize `requested` against `total` entries.
    ///
    /// Negative requests always mean "no selection". `current` is returned
    /// unchanged under [`IndexBehavior::Ignore`].
    pub fn normalize(
        self,
        requested: i64,
        total: usize,
        current: Option<usize>,
    ) -> Result<Option<usize>, SwitcherError> {
        if requested < 0 {
            return Ok(None);
        }

        if total == 0 {
            return match self {
                IndexBehavior::Throw => Err(SwitcherError::NoItems { requested }),
                IndexBehavior::Ignore => Ok(current),
                IndexBehavior::Clamp | IndexBehavior::Wrap => Ok(None),
            };
        }

        let total_i = total as i64;
        if requested < total_i {
            return Ok(Some(requested as usize));
        }

        match self {
            IndexBehavior::Throw => Err(SwitcherError::IndexOutOfRange { requested, total }),
            IndexBehavior::Ignore => Ok(current),
            IndexBehavior::Wrap => Ok(Some((((requested % total_i) + total_i) % total_i) as usize)),
            IndexBehavior::Clamp => Ok(Some(total - 1)),
        }
    }

    /// Whether "next" is available from `current` over `total` entries.
    pub fn can_go_next(self, current: Option<usize>, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        if self == IndexBehavior::Wrap {
            return true;
        }
        match current {
            Some(index) => index + 1 < total,
            None => true,
        }
    }

    /// Whether "previous" is available from `current` over `total` entries.
    pub fn can_go_previous(self, current: Option<usize>, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        if self == IndexBehavior::Wrap {
            return true;
        }
        matches!(current, Some(index) if index > 0)
    }
}
