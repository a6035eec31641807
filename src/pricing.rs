use serde::Serialize;

/// Per-component fare breakdown returned to the rider, rounded to cents.
#[derive(Debug, Clone, Serialize)]
pub struct FareBreakdown {
    pub distance_km: f64,
    pub duration_mins: f64,
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub total_fare: f64,
    pub surge_multiple: f64,
}

/// Computes `(base + distance * per_km + duration * per_minute) * surge`,
/// floored at the minimum fare.
#[derive(Debug, Clone)]
pub struct FareCalculator {
    base_fare: f64,
    per_km_rate: f64,
    per_minute_rate: f64,
    minimum_fare: f64,
}

impl FareCalculator {
    pub fn new(base_fare: f64, per_km_rate: f64, per_minute_rate: f64, minimum_fare: f64) -> Self {
        Self {
            base_fare,
            per_km_rate,
            per_minute_rate,
            minimum_fare,
        }
    }

    pub fn calculate(&self, distance_km: f64, duration_mins: f64, surge_multiple: f64) -> FareBreakdown {
        let distance_fare = distance_km * self.per_km_rate;
        let time_fare = duration_mins * self.per_minute_rate;

        let subtotal = self.base_fare + distance_fare + time_fare;
        let total = (subtotal * surge_multiple).max(self.minimum_fare);

        FareBreakdown {
            distance_km: round2(distance_km),
            duration_mins: round2(duration_mins),
            base_fare: self.base_fare,
            distance_fare: round2(distance_fare),
            time_fare: round2(time_fare),
            total_fare: round2(total),
            surge_multiple,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> FareCalculator {
        FareCalculator::new(2.50, 1.50, 0.25, 5.00)
    }

    #[test]
    fn fare_adds_base_distance_and_time() {
        let fare = calculator().calculate(10.0, 20.0, 1.0);

        assert_eq!(fare.base_fare, 2.50);
        assert_eq!(fare.distance_fare, 15.00);
        assert_eq!(fare.time_fare, 5.00);
        assert_eq!(fare.total_fare, 22.50);
    }

    #[test]
    fn short_trips_pay_the_minimum_fare() {
        let fare = calculator().calculate(0.5, 1.0, 1.0);
        assert_eq!(fare.total_fare, 5.00);
    }

    #[test]
    fn surge_multiplies_before_the_floor() {
        let fare = calculator().calculate(10.0, 20.0, 2.0);
        assert_eq!(fare.total_fare, 45.00);
    }

    #[test]
    fn components_are_rounded_to_cents() {
        let fare = calculator().calculate(3.333, 6.666, 1.0);
        assert_eq!(fare.distance_km, 3.33);
        assert_eq!(fare.distance_fare, 5.0);
        assert_eq!(fare.time_fare, 1.67);
    }
}
