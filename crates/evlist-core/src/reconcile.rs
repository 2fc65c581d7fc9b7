//! Positional reconciliation of a list against a replacement snapshot.
//!
//! Elements are compared index by index; nothing is searched for. A target
//! that differs from the current contents by an insertion in the middle
//! therefore shows up as a run of updates followed by a trailing insert.
//! In exchange, refreshing a list with mostly unchanged data at mostly
//! unchanged positions records only the positions that actually differ.

use std::sync::Arc;

use crate::change::ListChange;

/// Identity comparison for shared elements: two `Arc`s are the same
/// element only if they point at the same allocation.
///
/// Pass this to `update_all_by` when equal-but-distinct instances must
/// still be reported as updates.
pub fn same_arc<U: ?Sized>(a: &Arc<U>, b: &Arc<U>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Rewrites `data` in place so it equals `target`, appending one operation
/// per change to `changes`.
///
/// - `target[i]` beyond the current length is appended as an `Insert`.
/// - `target[i]` that is not `same` as `data[i]` replaces it as an `Update`.
/// - Surplus trailing elements are removed as `Delete`s, each at the
///   collapsing position `target.len()`.
///
/// Returns `true` if any operation was recorded.
pub fn reconcile<T, F>(
    data: &mut Vec<T>,
    target: &[T],
    same: F,
    changes: &mut Vec<ListChange<T>>,
) -> bool
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let before = changes.len();

    for (i, new) in target.iter().enumerate() {
        if i >= data.len() {
            data.push(new.clone());
            changes.push(ListChange::Insert {
                index: i,
                value: new.clone(),
            });
        } else if !same(&data[i], new) {
            let old = std::mem::replace(&mut data[i], new.clone());
            changes.push(ListChange::Update {
                index: i,
                old,
                new: new.clone(),
            });
        }
    }

    let keep = target.len();
    while data.len() > keep {
        let old = data.remove(keep);
        changes.push(ListChange::Delete { index: keep, old });
    }

    changes.len() != before
}
