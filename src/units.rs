//! Unit conversions for derived air quality values.

/// An AQI can't be computed for a negative (or NaN) concentration.
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
#[error("PM2.5 concentration must be non-negative (got {0})")]
pub struct AqiError(pub f32);

/// US EPA PM2.5 breakpoints, in tenths of a µg/m³: `(C_lo, C_hi, I_lo, I_hi)`.
const PM25_BREAKPOINTS: [(u32, u32, u16, u16); 7] = [
    (0, 120, 0, 50),
    (121, 354, 51, 100),
    (355, 554, 101, 150),
    (555, 1504, 151, 200),
    (1505, 2504, 201, 300),
    (2505, 3504, 301, 400),
    (3505, 5004, 401, 500),
];

/// Returns the US EPA Air Quality Index for a PM2.5 concentration in µg/m³.
///
/// The EPA specifies that the concentration is truncated to one decimal place
/// before the index is computed; concentrations above the top breakpoint
/// saturate at 500.
pub fn aqi_us_from_pm25(pm25: f32) -> Result<u16, AqiError> {
    // `!(pm25 >= 0.0)` so that NaN is rejected too.
    if !(pm25 >= 0.0) {
        return Err(AqiError(pm25));
    }

    // doing the truncation in integer tenths means the breakpoint table has no
    // gaps between, say, 12.0 and 12.1.
    let tenths = truncate_to_tenths(pm25);
    let (_, c_max, _, i_max) = PM25_BREAKPOINTS[PM25_BREAKPOINTS.len() - 1];
    if tenths > f64::from(c_max) {
        return Ok(i_max);
    }
    let tenths = tenths as u32;

    let &(c_lo, c_hi, i_lo, i_hi) = PM25_BREAKPOINTS
        .iter()
        .find(|&&(c_lo, c_hi, _, _)| (c_lo..=c_hi).contains(&tenths))
        // the table covers every tenth from 0 up to the cap.
        .unwrap_or(&PM25_BREAKPOINTS[PM25_BREAKPOINTS.len() - 1]);

    let slope = f64::from(i_hi - i_lo) / f64::from(c_hi - c_lo);
    let aqi = slope * f64::from(tenths - c_lo) + f64::from(i_lo);
    Ok(aqi.round() as u16)
}

/// Truncates a concentration to whole tenths of a µg/m³.
///
/// `2.3f32` is really 2.2999999..., so the value is first rounded to the
/// nearest 0.0001 µg/m³ (well below the sensor's resolution, and above f32's
/// error over the AQI range) to recover the decimal it was meant to be.
fn truncate_to_tenths(pm25: f32) -> f64 {
    ((f64::from(pm25) * 1e4).round() / 1e3).trunc()
}

/// Converts a Sensirion VOC index into an ethanol-equivalent TVOC
/// concentration in ppb.
///
/// This is Sensirion's lab approximation, only really valid with the default
/// VOC algorithm tuning and an ethanol calibration. The index is clamped to
/// `[1, 500]` so the logarithm stays finite.
pub fn voc_index_to_tvoc_ppb(voc_index: f32) -> f32 {
    let vi = voc_index.clamp(1.0, 500.0);
    ((501.0 - vi).ln() - 6.24) * -381.97
}

/// Same as [`voc_index_to_tvoc_ppb`], in ppm.
pub fn voc_index_to_tvoc_ppm(voc_index: f32) -> f32 {
    voc_index_to_tvoc_ppb(voc_index) / 1000.0
}
