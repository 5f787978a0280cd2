//! General functions related to finance.

/// Calculates the capital recovery factor (CRF) for a given lifetime and interest rate.
///
/// The CRF is used to annualise capital costs over the economic lifetime of an investment.
pub fn capital_recovery_factor(lifetime: f64, interest_rate: f64) -> f64 {
    if lifetime <= 0.0 {
        return 0.0;
    }
    if interest_rate == 0.0 {
        return 1.0 / lifetime;
    }
    let factor = (1.0 + interest_rate).powf(lifetime);
    (interest_rate * factor) / (factor - 1.0)
}

/// The factor by which a cost incurred `years_elapsed` years after the start of the horizon is
/// multiplied to give its present value
pub fn discount_factor(discount_rate: f64, years_elapsed: f64) -> f64 {
    (1.0 + discount_rate).powf(-years_elapsed)
}

/// The number of annual payments made for an investment with the given economic lifetime
pub fn n_payments(economic_lifetime: f64) -> u32 {
    economic_lifetime.ceil().max(0.0) as u32
}

/// The present value of one unit of investment made `years_elapsed` years after the start of the
/// horizon, paid off as an annuity.
///
/// One payment of `crf` is made in each year of the economic lifetime, starting in the year of
/// the investment. Payments continue beyond the end of the modelled horizon. The CRF uses the
/// fractional lifetime but the number of payments is rounded up, so a partial final year is paid
/// in full. Every payment is discounted at `discount_rate`, even those falling in later years.
pub fn annuity_present_value(
    economic_lifetime: f64,
    interest_rate: f64,
    discount_rate: f64,
    years_elapsed: f64,
) -> f64 {
    let crf = capital_recovery_factor(economic_lifetime, interest_rate);
    (0..n_payments(economic_lifetime))
        .map(|k| discount_factor(discount_rate, years_elapsed + k as f64))
        .sum::<f64>()
        * crf
}

/// The fraction of an investment's value which remains after it has been in use for
/// `years_used` years of a technical lifetime of `lifetime` years.
///
/// With a non-zero interest rate, the value is depreciated with a sinking fund. Otherwise it is
/// depreciated linearly.
pub fn salvage_fraction(lifetime: f64, interest_rate: f64, years_used: f64) -> f64 {
    if years_used >= lifetime {
        return 0.0;
    }

    if interest_rate == 0.0 {
        1.0 - years_used / lifetime
    } else {
        let growth = 1.0 + interest_rate;
        1.0 - (growth.powf(years_used) - 1.0) / (growth.powf(lifetime) - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10.0, 0.0, 0.1)] // Other edge case: interest_rate==0
    #[case(10.0, 0.05, 0.1295045749654567)]
    #[case(5.0, 0.03, 0.2183545714005762)]
    fn test_capital_recovery_factor(
        #[case] lifetime: f64,
        #[case] interest_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, interest_rate);
        assert_approx_eq!(f64, result, expected, epsilon = 1e-10);
    }

    #[rstest]
    #[case(0.05, 0.0, 1.0)]
    #[case(0.0, 10.0, 1.0)]
    #[case(0.05, 10.0, 0.6139132535407591)]
    fn test_discount_factor(#[case] rate: f64, #[case] years: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, discount_factor(rate, years), expected, epsilon = 1e-12);
    }

    #[rstest]
    #[case(10.0, 0.0, 0.0, 0.0, 1.0)] // Undiscounted: payments sum to the investment
    #[case(10.0, 0.05, 0.05, 0.0, 1.05)]
    #[case(10.0, 0.05, 0.05, 5.0, 0.8227024747918816)]
    #[case(2.5, 0.0, 0.0, 0.0, 1.2)] // Partial final year is paid in full
    fn test_annuity_present_value(
        #[case] lifetime: f64,
        #[case] interest_rate: f64,
        #[case] discount_rate: f64,
        #[case] years_elapsed: f64,
        #[case] expected: f64,
    ) {
        let result = annuity_present_value(lifetime, interest_rate, discount_rate, years_elapsed);
        assert_approx_eq!(f64, result, expected, epsilon = 1e-9);
    }

    #[rstest]
    #[case(10.0, 0.0, 5.0, 0.5)]
    #[case(10.0, 0.05, 5.0, 0.5606870360529046)]
    #[case(10.0, 0.05, 10.0, 0.0)] // Fully used
    #[case(10.0, 0.05, 15.0, 0.0)]
    #[case(10.0, 0.05, 0.0, 1.0)]
    fn test_salvage_fraction(
        #[case] lifetime: f64,
        #[case] interest_rate: f64,
        #[case] years_used: f64,
        #[case] expected: f64,
    ) {
        let result = salvage_fraction(lifetime, interest_rate, years_used);
        assert_approx_eq!(f64, result, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_n_payments() {
        assert_eq!(n_payments(10.0), 10);
        assert_eq!(n_payments(2.5), 3);
        assert_eq!(n_payments(0.0), 0);
    }
}
