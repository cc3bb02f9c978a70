use float_ord::FloatOrd;

/// Horizontal position normalized by `width`. Zero-width frames map everything to 0.
pub(crate) fn x_ratio(x_center: f32, width: f32) -> f32 {
    if width > 0.0 {
        x_center / width
    } else {
        0.0
    }
}

/// The item whose vertical distance to `y` is smallest, if that distance is within
/// `tolerance`. Ties go to the earliest item.
pub(crate) fn nearest_within<T>(
    items: impl IntoIterator<Item = T>,
    y: f32,
    tolerance: f32,
    y_of: impl Fn(&T) -> f32,
) -> Option<(T, f32)> {
    items
        .into_iter()
        .map(|item| {
            let distance = (y_of(&item) - y).abs();
            (item, distance)
        })
        .filter(|(_, distance)| *distance <= tolerance)
        .min_by_key(|(_, distance)| FloatOrd(*distance))
}

/// Upper median, matching a `sorted[len / 2]` lookup.
pub(crate) fn upper_median(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut values = values.into_iter().map(FloatOrd).collect::<Vec<_>>();
    if values.is_empty() {
        return None;
    }
    values.sort();
    Some(values[values.len() / 2].0)
}

pub(crate) fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
