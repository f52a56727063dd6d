use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use statrs::statistics::Statistics;

/// info! that keeps ANSI colors only when colorful display is enabled
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        if $colorful {
            log::info!("{}", message);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&message));
        }
    }};
}

/// Remove `ESC[...m` color sequences
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for code in chars.by_ref() {
                if code.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// a function used essentially in CV that split randomly a Vec<T> into p Vec<T> of approximatively the same size
pub fn split_into_balanced_random_chunks<T: std::clone::Clone>(vec: Vec<T>, p: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<T>> {
    let mut shuffled = vec;
    shuffled.shuffle(rng);

    let n = shuffled.len();
    let base_size = n / p;
    let extra_elements = n % p;

    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 0..p {
        let chunk_size = base_size + if i < extra_elements { 1 } else { 0 };
        let end = start + chunk_size;
        chunks.push(shuffled[start..end].to_vec());
        start = end;
    }

    chunks
}

/// Population (numpy-like) mean and standard deviation, NaN for an empty slice
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    (values.iter().mean(), values.iter().population_std_dev())
}

/// Index of the first maximum
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b || v.is_nan() => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
