pub mod attendance;
pub mod document;
pub mod month;
pub mod results;
pub mod session;
pub mod timetable;

pub use attendance::*;
pub use document::*;
pub use results::*;
pub use session::*;
pub use timetable::*;

/// Round a percentage to two decimals, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(93.877_551), 93.88);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(66.666_666), 66.67);
    }
}
