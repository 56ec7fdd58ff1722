//! Line-number table lookup.
//!
//! The table is a sequence of `(address increment, line increment)` pairs
//! applied starting from the function's first line. It is only consulted for
//! diagnostics.

/// Returns the source line of the instruction at `offset`.
///
/// Walks the increments until the accumulated address passes `offset`. The
/// line saturates at `u32::MAX`.
#[must_use]
pub fn find_lineno(first_line: u32, lnotab: &[(u8, u8)], offset: usize) -> u32 {
    let mut address = 0usize;
    let mut line = first_line;
    for &(address_incr, line_incr) in lnotab {
        address = address.saturating_add(usize::from(address_incr));
        if address > offset {
            break;
        }
        line = line.saturating_add(u32::from(line_incr));
    }
    line
}
