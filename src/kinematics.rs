use crate::forecast::ForecastSchedule;
use crate::wind_provider::{LayerRequest, WindFieldProvider, WindLayer};
use dispersal_common::{bearing_from_components, reverse_bearing, speed_from_components, DispersalResult, Grid};
use log::{debug, info};

/// Wind speed (m/s) and bearing (degrees the wind blows toward) for one hour.
#[derive(Clone, Debug)]
pub struct WindField {
    pub speed: Grid,
    pub bearing: Grid,
}

impl WindField {
    /// Derives speed and bearing from the u/v components.
    ///
    /// Walking the timeline backwards turns every bearing around, since the
    /// particle must have come from where the wind was blowing to.
    pub fn from_layer(layer: &WindLayer, backwards: bool) -> DispersalResult<Self> {
        let speed = layer.u.zip_map(&layer.v, speed_from_components)?;
        let bearing = if backwards {
            layer.u.zip_map(&layer.v, |u, v| reverse_bearing(bearing_from_components(u, v)))?
        } else {
            layer.u.zip_map(&layer.v, bearing_from_components)?
        };
        Ok(Self { speed, bearing })
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.speed.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.speed.height
    }
}

/// Wind for one hour of the horizon.
#[derive(Clone, Debug)]
pub struct HourlyWind {
    pub hour_index: u32,
    pub field: WindField,
}

/// Every hour of a run's horizon, resolved up front and shared read-only by all repetitions.
#[derive(Clone, Debug)]
pub struct WindTimeline {
    /// Geometry every hour shares; also used to place origins and georeference output.
    reference: Grid,
    hours: Vec<HourlyWind>,
}

impl WindTimeline {
    /// Fetches the layer for each scheduled hour, in processing order.
    ///
    /// An empty schedule still reads the window's analysis hour so the
    /// output grid has a geometry.
    pub fn load(
        provider: &dyn WindFieldProvider,
        schedule: &ForecastSchedule,
        level: &str,
    ) -> DispersalResult<Self> {
        info!(
            "Loading {} hours of wind from the {} provider (level {})...",
            schedule.entries().len(),
            provider.name(),
            level
        );

        let mut reference: Option<Grid> = None;
        let mut hours = Vec::with_capacity(schedule.entries().len());
        for entry in schedule.entries() {
            let layer = provider.wind_layer(&LayerRequest::for_entry(entry, level))?;
            match &reference {
                Some(r) => r.ensure_same_geometry(&layer.u)?,
                None => reference = Some(Self::geometry_of(&layer.u)),
            }
            debug!(
                "hour {} <- cycle {} {}z f{:03}",
                entry.hour_index,
                entry.cycle.date,
                entry.cycle.label(),
                entry.offset
            );
            hours.push(HourlyWind {
                hour_index: entry.hour_index,
                field: WindField::from_layer(&layer, schedule.backwards)?,
            });
        }

        let reference = match reference {
            Some(r) => r,
            None => {
                let layer = provider.wind_layer(&LayerRequest::for_entry(&schedule.reference_entry(), level))?;
                layer.u.ensure_same_geometry(&layer.v)?;
                Self::geometry_of(&layer.u)
            }
        };

        Ok(Self { reference, hours })
    }

    fn geometry_of(grid: &Grid) -> Grid {
        Grid::filled(grid.width, grid.height, grid.transform, 0.0)
    }

    /// A zero-filled grid with the timeline's geometry.
    pub fn reference(&self) -> &Grid {
        &self.reference
    }

    pub fn hours(&self) -> &[HourlyWind] {
        &self.hours
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    #[cfg(test)]
    pub fn from_fields(reference: Grid, hours: Vec<HourlyWind>) -> Self {
        Self { reference, hours }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastSchedule;
    use crate::wind_provider::UniformWind;
    use chrono::NaiveDate;
    use dispersal_common::{DispersalError, GeoTransform};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transform() -> GeoTransform {
        GeoTransform::new(0.0, 3.0, 1.0, -1.0)
    }

    fn layer(u: &[f64], v: &[f64]) -> WindLayer {
        WindLayer::new(
            Grid::from_vec(u.len(), 1, transform(), u.to_vec()).unwrap(),
            Grid::from_vec(v.len(), 1, transform(), v.to_vec()).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn speed_and_bearing_per_cell() {
        let field = WindField::from_layer(&layer(&[5.0, 0.0, -3.0], &[0.0, 2.0, -4.0]), false).unwrap();
        assert_eq!(field.speed.data, vec![5.0, 2.0, 5.0]);
        assert!((field.bearing.data[0] - 90.0).abs() < 1e-12);
        assert_eq!(field.bearing.data[1], 0.0);
        let expected = 180.0 + (3.0f64).atan2(4.0).to_degrees();
        assert!((field.bearing.data[2] - expected).abs() < 1e-9);
    }

    #[test]
    fn backwards_bearings_are_turned_around() {
        let l = layer(&[5.0, 1.0, -2.0, 0.3], &[0.0, 1.0, 7.0, -0.1]);
        let fwd = WindField::from_layer(&l, false).unwrap();
        let back = WindField::from_layer(&l, true).unwrap();
        assert_eq!(fwd.speed, back.speed);
        for (f, b) in fwd.bearing.data.iter().zip(&back.bearing.data) {
            assert!(((f + 180.0) % 360.0 - b).abs() < 1e-9, "{f} vs {b}");
        }
    }

    #[test]
    fn mismatched_components_fail() {
        let u = Grid::filled(3, 1, transform(), 1.0);
        let v = Grid::filled(2, 1, transform(), 1.0);
        let bad = WindLayer { u, v };
        assert!(matches!(WindField::from_layer(&bad, false), Err(DispersalError::ShapeMismatch { .. })));
    }

    struct Shifting {
        calls: AtomicU32,
    }

    impl WindFieldProvider for Shifting {
        fn name(&self) -> &str {
            "shifting"
        }

        fn wind_layer(&self, _request: &LayerRequest<'_>) -> DispersalResult<WindLayer> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            let width = if n == 0 { 4 } else { 5 };
            Ok(WindLayer::uniform(1.0, 0.0, width, 4, transform()))
        }
    }

    fn start() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn hours_must_share_one_geometry() {
        let provider = Shifting { calls: AtomicU32::new(0) };
        let schedule = ForecastSchedule::resolve(start(), 2, false);
        assert!(matches!(
            WindTimeline::load(&provider, &schedule, "10m"),
            Err(DispersalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_schedule_still_has_geometry() {
        let provider = UniformWind::new(1.0, 1.0, 6, 7, transform());
        let schedule = ForecastSchedule::resolve(start(), 0, false);
        let timeline = WindTimeline::load(&provider, &schedule, "10m").unwrap();
        assert_eq!(timeline.len(), 0);
        assert_eq!(timeline.reference().shape(), (6, 7));
    }

    #[test]
    fn timeline_follows_processing_order() {
        let provider = UniformWind::new(1.0, 1.0, 3, 3, transform());
        let schedule = ForecastSchedule::resolve(start() + chrono::Duration::hours(5), 3, true);
        let timeline = WindTimeline::load(&provider, &schedule, "10m").unwrap();
        let order: Vec<_> = timeline.hours().iter().map(|h| h.hour_index).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert!((timeline.hours()[0].field.bearing.get(0, 0) - 225.0).abs() < 1e-9);
    }
}
