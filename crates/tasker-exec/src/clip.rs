//! Bounding captured output before it is stored in execution history.

/// Clip `text` to at most `budget` characters by dropping the middle.
///
/// The first and last `budget / 2` characters are kept around a marker that
/// records how many were dropped. Splits happen on `char` boundaries.
pub fn clip_middle(text: &str, budget: usize) -> String {
    // Byte length bounds char count, so this skips counting in the common case.
    if text.len() <= budget {
        return text.to_owned();
    }
    let total = text.chars().count();
    if total <= budget {
        return text.to_owned();
    }

    let keep = budget / 2;
    let head: String = text.chars().take(keep).collect();
    let tail: String = text.chars().skip(total - keep).collect();
    let omitted = total - keep * 2;

    format!("{head}\n\n... [{omitted} chars omitted] ...\n\n{tail}")
}
