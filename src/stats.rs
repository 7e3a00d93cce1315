use std::time::Duration;

pub fn median(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort();

    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2)
    } else {
        Some(sorted[mid])
    }
}

pub fn minimum(samples: &[Duration]) -> Option<Duration> {
    samples.iter().min().copied()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean absolute difference between consecutive samples.
pub fn jitter(samples: &[Duration]) -> Option<Duration> {
    if samples.len() < 2 {
        return None;
    }

    let total: Duration =
        samples.windows(2).map(|pair| pair[0].abs_diff(pair[1])).sum();

    Some(total / (samples.len() as u32 - 1))
}
