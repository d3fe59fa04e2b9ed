use imhere_config::EtaSettings;
use std::time::Duration;

/// Heuristic travel-time model: an average speed picked by distance bracket.
///
/// This is not routing. Short trips assume slow local roads, long trips
/// assume highway speed, everything else an urban average.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaModel {
    pub local_speed_kmh: f64,
    pub urban_speed_kmh: f64,
    pub highway_speed_kmh: f64,
    pub local_below_km: f64,
    pub highway_above_km: f64,
}

impl Default for EtaModel {
    fn default() -> Self {
        Self {
            local_speed_kmh: 15.0,
            urban_speed_kmh: 25.0,
            highway_speed_kmh: 40.0,
            local_below_km: 5.0,
            highway_above_km: 50.0,
        }
    }
}

impl EtaModel {
    pub fn from_settings(settings: &EtaSettings) -> Self {
        Self {
            local_speed_kmh: settings.local_speed_kmh,
            urban_speed_kmh: settings.urban_speed_kmh,
            highway_speed_kmh: settings.highway_speed_kmh,
            local_below_km: settings.local_below_km,
            highway_above_km: settings.highway_above_km,
        }
    }

    /// One speed for every distance.
    pub fn flat(speed_kmh: f64) -> Self {
        Self {
            local_speed_kmh: speed_kmh,
            urban_speed_kmh: speed_kmh,
            highway_speed_kmh: speed_kmh,
            ..Self::default()
        }
    }

    pub fn speed_kmh(&self, distance_m: f64) -> f64 {
        let km = distance_m / 1000.0;
        if km > self.highway_above_km {
            self.highway_speed_kmh
        } else if km < self.local_below_km {
            self.local_speed_kmh
        } else {
            self.urban_speed_kmh
        }
    }

    pub fn estimate(&self, distance_m: f64) -> Duration {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return Duration::ZERO;
        }
        let speed = self.speed_kmh(distance_m);
        if !speed.is_finite() || speed <= 0.0 {
            return Duration::MAX;
        }
        let hours = (distance_m / 1000.0) / speed;
        Duration::try_from_secs_f64(hours * 3600.0).unwrap_or(Duration::MAX)
    }

    pub fn describe(&self, distance_m: f64) -> String {
        format_eta(self.estimate(distance_m))
    }
}

/// Human-readable duration: `"< 1 menit"`, `"25 menit"`, `"1j"`, `"2j 5m"`.
pub fn format_eta(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return "< 1 menit".to_string();
    }

    let minutes = (secs / 60.0).round() as u64;
    if minutes < 60 {
        return format!("{} menit", minutes);
    }

    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest > 0 {
        format!("{}j {}m", hours, rest)
    } else {
        format!("{}j", hours)
    }
}
