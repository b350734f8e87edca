//! GRIB2 fields decoded into a [`WaveGrid`] clipped to a bounding box.
//!
//! Message headers (reference time, parameter, lat/lon grid) are read from
//! the section layout; packed values are unpacked by the `grib` crate.

use std::io::Cursor;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use ocean_common::{BoundingBox, WaveGrid};
use tracing::debug;

use crate::error::SourceError;

const MAGIC: &[u8; 4] = b"GRIB";
const END_MARKER: &[u8; 4] = b"7777";
const INDICATOR_LEN: usize = 16;
/// Type of fixed surface for "ordered sequence of data" (swell partitions).
const ORDERED_SEQUENCE_SURFACE: u8 = 241;

/// Regular lat/lon grid (template 3.0), angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LatLonGrid {
    ni: usize,
    nj: usize,
    la1: f64,
    lo1: f64,
    di: f64,
    dj: f64,
    scanning_mode: u8,
}

impl LatLonGrid {
    fn len(&self) -> usize {
        self.ni * self.nj
    }

    /// Latitude and longitude of the `k`th value in scan order.
    /// Longitudes are wrapped to [-180, 180).
    fn point(&self, k: usize) -> (f64, f64) {
        let (i, j) = if self.scanning_mode & 0x20 == 0 {
            (k % self.ni, k / self.ni)
        } else {
            (k / self.nj, k % self.nj)
        };
        let lon = if self.scanning_mode & 0x80 == 0 {
            self.lo1 + i as f64 * self.di
        } else {
            self.lo1 - i as f64 * self.di
        };
        let lat = if self.scanning_mode & 0x40 == 0 {
            self.la1 - j as f64 * self.dj
        } else {
            self.la1 + j as f64 * self.dj
        };
        (round_micro(lat), round_micro((lon + 180.0).rem_euclid(360.0) - 180.0))
    }
}

fn round_micro(degrees: f64) -> f64 {
    (degrees * 1e6).round() / 1e6
}

#[derive(Debug, Clone)]
struct FieldHeader {
    variable: String,
    time: DateTime<Utc>,
    grid: LatLonGrid,
}

struct Product {
    category: u8,
    number: u8,
    offset: Duration,
    surface: Option<(u8, u32)>,
}

fn decode_error(message: impl Into<String>) -> SourceError {
    SourceError::Decode(message.into())
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// GRIB2 stores signed integers as sign and magnitude.
fn be_signed(b: &[u8]) -> i64 {
    let raw = be_u32(b);
    let magnitude = (raw & 0x7fff_ffff) as i64;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn reference_time(section: &[u8]) -> Result<DateTime<Utc>, SourceError> {
    if section.len() < 19 {
        return Err(decode_error("identification section too short"));
    }
    NaiveDate::from_ymd_opt(
        be_u16(&section[12..14]) as i32,
        section[14] as u32,
        section[15] as u32,
    )
    .and_then(|date| {
        date.and_hms_opt(section[16] as u32, section[17] as u32, section[18] as u32)
    })
    .map(|t| t.and_utc())
    .ok_or_else(|| decode_error("invalid reference time"))
}

fn lat_lon_grid(section: &[u8]) -> Result<LatLonGrid, SourceError> {
    if section.len() < 72 {
        return Err(decode_error("grid definition section too short"));
    }
    let template = be_u16(&section[12..14]);
    if template != 0 {
        return Err(decode_error(format!(
            "grid template 3.{} is not a regular lat/lon grid",
            template
        )));
    }
    let basic_angle = be_u32(&section[38..42]);
    if basic_angle != 0 && basic_angle != u32::MAX {
        return Err(decode_error("grids with a basic angle are not supported"));
    }

    let degrees = |b: &[u8]| be_signed(b) as f64 / 1e6;
    Ok(LatLonGrid {
        ni: be_u32(&section[30..34]) as usize,
        nj: be_u32(&section[34..38]) as usize,
        la1: degrees(&section[46..50]),
        lo1: degrees(&section[50..54]),
        di: degrees(&section[63..67]),
        dj: degrees(&section[67..71]),
        scanning_mode: section[71],
    })
}

fn product(section: &[u8]) -> Result<Product, SourceError> {
    let template = section
        .get(7..9)
        .map(be_u16)
        .ok_or_else(|| decode_error("short product section"))?;
    // Templates 4.0 to 4.15 share the leading parameter and time fields.
    if template > 15 || section.len() < 22 {
        return Err(decode_error(format!(
            "product template 4.{} is not supported",
            template
        )));
    }

    let value = be_u32(&section[18..22]) as i64;
    let offset = match section[17] {
        0 => Duration::minutes(value),
        1 => Duration::hours(value),
        2 => Duration::days(value),
        10 => Duration::hours(3 * value),
        11 => Duration::hours(6 * value),
        12 => Duration::hours(12 * value),
        13 => Duration::seconds(value),
        unit => return Err(decode_error(format!("forecast time unit {} not supported", unit))),
    };
    let surface = (section.len() >= 28).then(|| (section[22], be_u32(&section[24..28])));

    Ok(Product {
        category: section[9],
        number: section[10],
        offset,
        surface,
    })
}

/// Short name for a parameter, following NCEP conventions.
fn variable_name(discipline: u8, product: &Product) -> String {
    let known = match (discipline, product.category, product.number) {
        (0, 2, 0) => Some("WDIR"),
        (0, 2, 1) => Some("WIND"),
        (0, 2, 2) => Some("UGRD"),
        (0, 2, 3) => Some("VGRD"),
        (10, 0, 3) => Some("HTSGW"),
        (10, 0, 4) => Some("WVDIR"),
        (10, 0, 5) => Some("WVHGT"),
        (10, 0, 6) => Some("WVPER"),
        (10, 0, 7) => Some("SWDIR"),
        (10, 0, 8) => Some("SWELL"),
        (10, 0, 9) => Some("SWPER"),
        (10, 0, 10) => Some("DIRPW"),
        (10, 0, 11) => Some("PERPW"),
        _ => None,
    };
    let name = known.map(str::to_string).unwrap_or_else(|| {
        format!("var{}_{}_{}", discipline, product.category, product.number)
    });

    match product.surface {
        Some((ORDERED_SEQUENCE_SURFACE, n)) => format!("{}_{}", name, n),
        _ => name,
    }
}

/// Walk every message and emit one header per data section.
fn scan_fields(bytes: &[u8]) -> Result<Vec<FieldHeader>, SourceError> {
    let mut fields = Vec::new();
    let mut offset = 0;

    while let Some(found) = bytes[offset..].windows(4).position(|w| w == MAGIC) {
        let start = offset + found;
        let indicator = bytes
            .get(start..start + INDICATOR_LEN)
            .ok_or_else(|| decode_error(format!("truncated message at byte {}", start)))?;
        if indicator[7] != 2 {
            return Err(decode_error(format!("GRIB edition {} is not supported", indicator[7])));
        }
        let discipline = indicator[6];
        let total = u64::from_be_bytes(
            indicator[8..16]
                .try_into()
                .map_err(|_| decode_error("bad message length"))?,
        ) as usize;
        let end = start
            .checked_add(total)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| decode_error(format!("truncated message at byte {}", start)))?;

        let mut reference = None;
        let mut grid = None;
        let mut current = None;
        let mut pos = start + INDICATOR_LEN;

        while pos + 4 <= end && &bytes[pos..pos + 4] != END_MARKER {
            let len = be_u32(&bytes[pos..pos + 4]) as usize;
            let section = bytes
                .get(pos..pos + len)
                .filter(|s| s.len() >= 5 && pos + len <= end)
                .ok_or_else(|| decode_error(format!("truncated section at byte {}", pos)))?;

            match section[4] {
                1 => reference = Some(reference_time(section)?),
                3 => grid = Some(lat_lon_grid(section)?),
                4 => current = Some(product(section)?),
                7 => {
                    let (Some(reference), Some(grid), Some(product)) = (reference, grid, &current)
                    else {
                        return Err(decode_error("data section before its definitions"));
                    };
                    fields.push(FieldHeader {
                        variable: variable_name(discipline, product),
                        time: reference + product.offset,
                        grid,
                    });
                }
                _ => {}
            }
            pos += len;
        }
        offset = end;
    }

    Ok(fields)
}

/// Decode every field of a GRIB2 file and keep the points inside `bbox`.
///
/// Fields become variables of the grid; missing cells are NaN.
pub fn decode_grib(bytes: &[u8], bbox: &BoundingBox) -> Result<WaveGrid, SourceError> {
    let headers = scan_fields(bytes)?;
    let grib = grib::from_reader(Cursor::new(bytes))
        .map_err(|e| decode_error(format!("failed to read GRIB2: {}", e)))?;

    let mut variables: Vec<String> = Vec::new();
    // (time, lat, lon, variable index, value)
    let mut points: Vec<(DateTime<Utc>, f64, f64, usize, f32)> = Vec::new();
    let mut decoded = 0;

    for (header, (_, submessage)) in headers.iter().zip(grib.iter()) {
        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| decode_error(format!("{}: {}", header.variable, e)))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| decode_error(format!("{}: {}", header.variable, e)))?
            .collect();
        if values.len() != header.grid.len() {
            return Err(decode_error(format!(
                "{} has {} values for {} grid points",
                header.variable,
                values.len(),
                header.grid.len()
            )));
        }

        let var = match variables.iter().position(|v| *v == header.variable) {
            Some(i) => i,
            None => {
                variables.push(header.variable.clone());
                variables.len() - 1
            }
        };
        for (k, value) in values.into_iter().enumerate() {
            let (lat, lon) = header.grid.point(k);
            if bbox.contains_lat(lat) && bbox.contains_lon(lon) {
                points.push((header.time, lat, lon, var, value));
            }
        }
        decoded += 1;
    }

    if decoded != headers.len() {
        return Err(decode_error(format!(
            "decoded {} of {} GRIB2 fields",
            decoded,
            headers.len()
        )));
    }
    if points.is_empty() {
        return Err(decode_error(format!("no grid points inside {}", bbox)));
    }

    let mut times: Vec<DateTime<Utc>> = points.iter().map(|p| p.0).collect();
    times.sort();
    times.dedup();
    let latitudes = sorted_axis(points.iter().map(|p| p.1));
    let longitudes = sorted_axis(points.iter().map(|p| p.2));

    let mut grid = WaveGrid::new(times, latitudes, longitudes);
    let mut data = vec![vec![f32::NAN; grid.len()]; variables.len()];
    for (time, lat, lon, var, value) in points {
        let t = grid.times.binary_search(&time).unwrap_or_default();
        let y = grid
            .latitudes
            .binary_search_by(|p| p.total_cmp(&lat))
            .unwrap_or_default();
        let x = grid
            .longitudes
            .binary_search_by(|p| p.total_cmp(&lon))
            .unwrap_or_default();
        let idx = grid.index(t, y, x);
        data[var][idx] = value;
    }
    for (name, values) in variables.into_iter().zip(data) {
        grid.insert_variable(name, values)
            .map_err(|e| decode_error(e.to_string()))?;
    }

    let (steps, lats, lons) = grid.shape();
    debug!(fields = decoded, steps, lats, lons, "Decoded GRIB2 subset");
    Ok(grid)
}

fn sorted_axis(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut axis: Vec<f64> = values.collect();
    axis.sort_by(|a, b| a.total_cmp(b));
    axis.dedup_by(|a, b| a.total_cmp(b).is_eq());
    axis
}
