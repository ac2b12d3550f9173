#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("label {label} is out of range for {classes} classes")]
    OutOfRange { label: usize, classes: usize },
}

/// One-hot encodes `label` into a fresh vector of length `classes`.
pub fn one_hot(label: usize, classes: usize) -> Result<Vec<f32>, LabelError> {
    if label >= classes {
        return Err(LabelError::OutOfRange { label, classes });
    }

    let mut v = vec![0.0; classes];
    v[label] = 1.0;
    Ok(v)
}

/// Index of the largest entry. Recovers the class id from a one-hot vector.
pub fn argmax(v: &[f32]) -> Option<usize> {
    v.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, x)| match best {
            Some((_, b)) if b >= *x => best,
            _ => Some((i, *x)),
        })
        .map(|(i, _)| i)
}
