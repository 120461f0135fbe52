/// Case-fold and collapse whitespace so free-text vehicle fields compare reliably.
pub(crate) fn normalize_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}', '\u{a0}'], " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Parse an amount written with Danish conventions ("2.699", "2.699,50 kr", "102.163").
///
/// A dot followed only by three-digit groups is a thousands separator; a comma is the decimal
/// mark. Plain machine numbers ("2699", "0.85") pass through unchanged.
pub(crate) fn parse_danish_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let kept: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let kept = kept.trim_end_matches(['.', ',']).to_string();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let canonical = if kept.contains(',') {
        kept.replace('.', "").replace(',', ".")
    } else if is_thousands_grouped(&kept) {
        kept.replace('.', "")
    } else {
        kept
    };

    canonical.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn is_thousands_grouped(value: &str) -> bool {
    let mut parts = value.split('.');
    let Some(head) = parts.next() else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    !tail.is_empty()
        && !head.trim_start_matches('-').is_empty()
        && tail
            .iter()
            .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()))
}
