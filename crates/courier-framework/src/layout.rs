//! Keyboard layout translation.
//!
//! Users often type a command while the keyboard is still switched to the
//! Cyrillic ЙЦУКЕН layout, so `.ping` arrives as `юзштп`. The dispatcher
//! tolerates this by translating the prefix once and, when the text starts
//! with the translated prefix, translating the whole text back.
//!
//! The table swaps each key of one layout for the key at the same position in
//! the other. A few punctuation keys exist in both layouts; for those the
//! Latin → Cyrillic direction wins, so the table is not a pure involution.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Cyrillic keys, in physical key order.
const RU_KEYS: &str = "ёйцукенгшщзхъфывапролджэячсмитьбю.Ё\"№;%:?ЙЦУКЕНГШЩЗХЪФЫВАПРОЛДЖЭ/ЯЧСМИТЬБЮ,";

/// Latin keys at the same positions.
const EN_KEYS: &str = "`qwertyuiop[]asdfghjkl;'zxcvbnm,./~@#$%^&QWERTYUIOP{}ASDFGHJKL:\"|ZXCVBNM<>?";

static TABLE: LazyLock<HashMap<char, char>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    let from = RU_KEYS.chars().chain(EN_KEYS.chars());
    let to = EN_KEYS.chars().chain(RU_KEYS.chars());
    for (src, dst) in from.zip(to) {
        table.insert(src, dst);
    }
    table
});

/// Swaps every character of `text` to the other layout.
///
/// Characters outside both layouts are kept as-is.
pub fn translate(text: &str) -> String {
    text.chars()
        .map(|c| TABLE.get(&c).copied().unwrap_or(c))
        .collect()
}

/// Translates `text` if it was typed with `prefix` in the other layout.
///
/// Returns `None` when the translated prefix is identical to the prefix (it
/// has no layout counterpart) or when `text` does not start with it.
pub fn translate_layout(text: &str, prefix: &str) -> Option<String> {
    let swapped = translate(prefix);
    (swapped != prefix && text.starts_with(&swapped)).then(|| translate(text))
}
