//! Index arithmetic shared by the list operations.

/// Resolve an inclusive `[start, stop]` window over `len` elements.
///
/// Negative indices count from the tail (-1 is the last element); bounds past
/// either end are clamped. Returns `None` when the window is empty.
pub(crate) fn resolve_window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Resolve a single (possibly negative) index; `None` outside `[0, len)`.
pub(crate) fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}
