use itertools::Itertools;

/// Recommended convergence and significance threshold for `n` genotypes, `1/(2n)`.
pub fn recommended_epsilon(n: usize) -> Option<f64> {
    match n {
        0 => None,
        n => Some(1.0 / (2.0 * n as f64)),
    }
}

// "A", "A and B", "A, B, and C"
pub fn join_with_and<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => format!(
            "{}, and {}",
            init.iter().map(AsRef::as_ref).join(", "),
            last.as_ref()
        ),
    }
}

/// Shortest representation that parses back to the same value. Values outside
/// `[1e-3, 1e7)` use exponent notation such as `1e-5`.
pub fn format_float(x: f64) -> String {
    let abs = x.abs();
    if x != 0.0 && x.is_finite() && !(1e-3..1e7).contains(&abs) {
        format!("{x:e}")
    } else {
        format!("{x}")
    }
}

/// Scientific notation with a fixed number of decimals and a signed two digit exponent,
/// e.g. `1.250e-02`.
pub fn format_scientific(x: f64, decimals: usize) -> String {
    let s = format!("{x:.decimals$e}");
    match s.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_loci_with_and() {
        assert_eq!("", join_with_and::<&str>(&[]));
        assert_eq!("A", join_with_and(&["A"]));
        assert_eq!("A and B", join_with_and(&["A", "B"]));
        assert_eq!("A, B, and C", join_with_and(&["A", "B", "C"]));
    }

    #[test]
    fn recommended_epsilon_for_forty_genotypes() {
        assert_eq!(Some(0.0125), recommended_epsilon(40));
        assert_eq!(None, recommended_epsilon(0));
    }

    #[test]
    fn floats_use_shortest_form() {
        assert_eq!("1e-5", format_float(1e-5));
        assert_eq!("1e-6", format_float(0.000001));
        assert_eq!("0.0125", format_float(0.0125));
        assert_eq!("0.995", format_float(0.995));
        assert_eq!("1.5e-4", format_float(0.00015));
        assert_eq!("0", format_float(0.0));
    }

    #[test]
    fn scientific_has_two_digit_exponent() {
        assert_eq!("1.250e-02", format_scientific(0.0125, 3));
        assert_eq!("3.000e+00", format_scientific(3.0, 3));
    }
}
