const SEPARATORS: &[char] = &['_', '-', ' '];

// マッチ区間を取り除く。両側から区切りが消えた場合のみ単一の `_` で繋ぐ。
pub fn strip_matched_span(stem: &str, start: usize, end: usize) -> String {
    let left_raw = &stem[..start];
    let right_raw = &stem[end..];
    let left = left_raw.trim_end_matches(SEPARATORS);
    let right = right_raw.trim_start_matches(SEPARATORS);
    let left_had_sep = left.len() < left_raw.len();
    let right_had_sep = right.len() < right_raw.len();

    let joined = if !left.is_empty() && !right.is_empty() && left_had_sep && right_had_sep {
        format!("{left}_{right}")
    } else {
        format!("{left}{right}")
    };
    collapse_separators(&joined)
}

pub fn collapse_separators(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending = false;
    for ch in value.chars() {
        if SEPARATORS.contains(&ch) {
            pending = !out.is_empty();
        } else {
            if pending {
                out.push('_');
                pending = false;
            }
            out.push(ch);
        }
    }
    out
}
