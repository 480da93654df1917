/// Clamped piecewise-linear lookup over an (x, y) table sorted by x.
pub fn interpolate_clamped(table: &[(f32, f32)], x: f32) -> f32 {
    let first = table[0];
    if x <= first.0 {
        return first.1;
    }

    let last = table[table.len() - 1];
    if x >= last.0 {
        return last.1;
    }

    for window in table.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];

        if x <= x1 {
            let frac = (x - x0) / (x1 - x0);
            return y0 + frac * (y1 - y0);
        }
    }

    last.1
}

/// Same lookup over separate bin/value axes, as stored in the configuration
/// record's aux output curves.
pub fn interpolate_axes(bins: &[f32], values: &[f32], x: f32) -> f32 {
    if x <= bins[0] {
        return values[0];
    }

    let last = bins.len() - 1;
    if x >= bins[last] {
        return values[last];
    }

    for i in 1..bins.len() {
        if x <= bins[i] {
            let frac = (x - bins[i - 1]) / (bins[i] - bins[i - 1]);
            return values[i - 1] + frac * (values[i] - values[i - 1]);
        }
    }

    values[last]
}
