/// Marker some exporters write in place of a flag column's name.
pub const FLAG_MARKER: &str = "*";
pub const FLAG_SUFFIX: &str = " Flag";

/// Names anonymous `*` columns after the column to their left.
///
/// Each `*` becomes `"<previous> Flag"`, where `<previous>` is the already
/// normalized name of the preceding column. A leading `*` has nothing to borrow
/// from and is kept.
pub fn normalize_header(header: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(header.len());
    for name in header {
        let current = match normalized.last() {
            Some(previous) if name == FLAG_MARKER => format!("{previous}{FLAG_SUFFIX}"),
            _ => name.clone(),
        };
        normalized.push(current);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn markers_take_the_previous_column_name() {
        assert_eq!(
            normalize_header(&strings(&["Temp", "*", "Status", "*"])),
            strings(&["Temp", "Temp Flag", "Status", "Status Flag"])
        );
    }

    #[test]
    fn leading_marker_is_left_alone() {
        assert_eq!(
            normalize_header(&strings(&["*", "Temp"])),
            strings(&["*", "Temp"])
        );
    }

    #[test]
    fn consecutive_markers_chain_off_normalized_names() {
        assert_eq!(
            normalize_header(&strings(&["Temp", "*", "*"])),
            strings(&["Temp", "Temp Flag", "Temp Flag Flag"])
        );
    }

    #[test]
    fn only_exact_marker_is_rewritten() {
        assert_eq!(
            normalize_header(&strings(&["Temp", " *", "**"])),
            strings(&["Temp", " *", "**"])
        );
    }

    proptest! {
        #[test]
        fn normalization_preserves_length_and_plain_names(
            header in proptest::collection::vec("[A-Za-z*]{1,4}", 0..8)
        ) {
            let normalized = normalize_header(&header);
            prop_assert_eq!(normalized.len(), header.len());
            for (idx, (before, after)) in header.iter().zip(&normalized).enumerate() {
                if before != FLAG_MARKER || idx == 0 {
                    prop_assert_eq!(before, after);
                } else {
                    prop_assert!(after.ends_with(FLAG_SUFFIX));
                }
            }
        }
    }
}
