//! Property-Based Tests: Line Store
//!
//! These tests use `proptest` to check the store and the line accumulator
//! against simple reference models over a wide range of geometries and inputs.
//!
//! # Coverage
//!
//! - **Slot truncation:** any text stored in any slot size reads back either
//!   verbatim or cut to `len - 2` bytes plus a newline, never overflowing.
//! - **Eviction order:** after any number of appends, the store's contents
//!   match a `Vec` model of half-rotation or FIFO eviction.
//! - **Continuation:** a line fed in unterminated pieces comes out once,
//!   equal to the concatenation.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sdrlog::logging::{decode_slot, encode_slot, Continuation, Emit, Eviction, LineStore};
    use sdrlog::PrintfFlags;

    fn model(capacity: usize, appends: usize, eviction: Eviction) -> Vec<String> {
        let frozen = eviction.frozen_positions(capacity);
        let mut lines: Vec<String> = Vec::new();
        for i in 0..appends {
            if lines.len() == capacity {
                lines.remove(frozen);
            }
            lines.push(format!("{}\n", i));
        }
        lines
    }

    proptest! {
        /// **Property:** a slot never overflows and keeps as much text as fits.
        #[test]
        fn test_slot_truncation(text in "\\PC{0,300}", cap in 3usize..300) {
            let mut slot = vec![0xffu8; cap];
            let len = encode_slot(&mut slot, &text);
            let stored = decode_slot(&slot);

            prop_assert!(len < cap);
            prop_assert_eq!(slot[len], 0);
            prop_assert_eq!(stored.len(), len);
            if text.len() < cap {
                prop_assert_eq!(stored, text);
            } else {
                prop_assert!(stored.ends_with('\n'));
                let kept = &stored[..stored.len() - 1];
                prop_assert!(text.starts_with(kept));
                prop_assert!(kept.len() <= cap - 2);
                prop_assert!(kept.len() + 4 > cap - 2); // at most one char dropped at the cut
            }
        }

        /// **Property:** the store matches the eviction model after any number of appends.
        #[test]
        fn test_eviction_matches_model(
            capacity in 2usize..24,
            appends in 0usize..80,
            fifo in any::<bool>(),
        ) {
            let eviction = if fifo { Eviction::Fifo } else { Eviction::HalfRotation };
            let store = LineStore::create_anonymous(capacity, 16, eviction).unwrap();
            for i in 0..appends {
                store.append(&format!("{}\n", i)).unwrap();
            }

            let snap = store.read_all().unwrap();
            prop_assert_eq!(snap.lines, model(capacity, appends, eviction));
            prop_assert_eq!(snap.not_shown, appends.saturating_sub(capacity) as u64);
            prop_assert_eq!(store.write_index(), appends.min(capacity));
        }

        /// **Property:** unterminated pieces produce exactly one finished line.
        #[test]
        fn test_continuation_concatenates(pieces in prop::collection::vec("[a-z ]{0,20}", 1..10)) {
            let mut cont = Continuation::new(1024);
            for piece in &pieces {
                prop_assert_eq!(
                    cont.emit(PrintfFlags::REGULAR, format_args!("{}", piece)).unwrap(),
                    Emit::Pending
                );
            }
            let line = cont.emit(PrintfFlags::REGULAR, format_args!("\n")).unwrap();
            prop_assert_eq!(line, Emit::Finished(format!("{}\n", pieces.concat())));
            prop_assert!(!cont.is_pending());
        }
    }
}
