use std::cmp::Ordering;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population variance given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn variance(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Orders slot identifiers so numeric ids sort as numbers ("2" before "10")
/// and everything else sorts as text.
pub fn compare_slot_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 0.0, 0.5]), 0.5);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[], 0.0), 0.0);
        assert_eq!(variance(&[1.0, 3.0], 2.0), 1.0);
    }

    #[test]
    fn test_compare_slot_ids_numeric() {
        let mut ids = vec!["10", "2", "B", "1", "A"];
        ids.sort_by(|a, b| compare_slot_ids(a, b));
        assert_eq!(ids, vec!["1", "2", "10", "A", "B"]);
    }

    #[test]
    fn test_compare_slot_ids_leading_zero_is_stable() {
        assert_eq!(compare_slot_ids("01", "1"), Ordering::Less);
        assert_eq!(compare_slot_ids("1", "1"), Ordering::Equal);
    }
}
