// Absolute time handling: file-name start times and per-frame timestamps.

use crate::error::{MergeError, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use std::path::Path;

/// File-name template written by the camera.
pub const CAMERA_TEMPLATE: &str = "camera_%Y_%m_%d-%H_%M_%S.mp4";

/// The camera stamps file names in local time, UTC+09:00.
pub const CAMERA_UTC_OFFSET_SECS: i32 = 9 * 3600;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MS: f64 = 1_000_000.0;

/// A point in time as nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self(
            dt.timestamp()
                .saturating_mul(NANOS_PER_SEC)
                .saturating_add(dt.timestamp_subsec_nanos() as i64),
        )
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Whole seconds, as carried in a ROS `builtin_interfaces/Time`.
    /// `None` past 2038-01-19, where the 32-bit field runs out.
    pub fn sec(self) -> Option<i32> {
        i32::try_from(self.0.div_euclid(NANOS_PER_SEC)).ok()
    }

    pub fn nanosec(self) -> u32 {
        self.0.rem_euclid(NANOS_PER_SEC) as u32
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            &self
                .to_datetime()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }
}

/// Absolute timestamp of a frame `offset_ms` milliseconds into a file that
/// started at `start`. `None` if the offset is not finite or the result does
/// not fit in a `Timestamp`.
pub fn frame_time(start: Timestamp, offset_ms: f64) -> Option<Timestamp> {
    let offset_ns = (offset_ms * NANOS_PER_MS).round();
    if !offset_ns.is_finite() || offset_ns < i64::MIN as f64 || offset_ns >= i64::MAX as f64 {
        return None;
    }
    start.0.checked_add(offset_ns as i64).map(Timestamp)
}

/// Derives the absolute start time of a recording from its path.
pub trait StartTimeParser {
    fn parse_start(&self, path: &Path) -> Result<Timestamp>;
}

/// Parses base names of the form `camera_2020_01_01-00_00_00.mp4` in a fixed
/// time zone. No other layout is accepted.
#[derive(Debug, Clone)]
pub struct CameraFilenameParser {
    template: String,
    utc_offset_secs: i32,
}

impl CameraFilenameParser {
    pub fn new(template: impl Into<String>, utc_offset_secs: i32) -> Self {
        Self {
            template: template.into(),
            utc_offset_secs,
        }
    }
}

impl Default for CameraFilenameParser {
    fn default() -> Self {
        Self::new(CAMERA_TEMPLATE, CAMERA_UTC_OFFSET_SECS)
    }
}

impl StartTimeParser for CameraFilenameParser {
    fn parse_start(&self, path: &Path) -> Result<Timestamp> {
        let bad_name = || MergeError::FilenameFormat {
            path: path.to_path_buf(),
            template: self.template.clone(),
        };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(bad_name)?;
        let naive = NaiveDateTime::parse_from_str(name, &self.template).map_err(|e| {
            tracing::debug!("{}: {}", name, e);
            bad_name()
        })?;
        let zone = FixedOffset::east_opt(self.utc_offset_secs).ok_or_else(bad_name)?;
        let start = zone
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(bad_name)?;

        Ok(Timestamp::from_datetime(&start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(unix)]
    #[test]
    fn rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let parser = CameraFilenameParser::default();
        let path = Path::new(OsStr::from_bytes(b"/data/camera_\xff.mp4"));
        match parser.parse_start(path) {
            Err(MergeError::FilenameFormat { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected FilenameFormat, got {other:?}"),
        }
    }

    // 2020-01-01T00:00:00+09:00
    const NEW_YEAR_2020_JST: i64 = 1_577_804_400;

    fn secs(s: i64) -> Timestamp {
        Timestamp::from_nanos(s * NANOS_PER_SEC)
    }

    #[test]
    fn parses_camera_name_in_jst() {
        let parser = CameraFilenameParser::default();
        let start = parser
            .parse_start(Path::new("camera_2020_01_01-00_00_00.mp4"))
            .unwrap();
        assert_eq!(start, secs(NEW_YEAR_2020_JST));
        assert_eq!(start.to_string(), "2019-12-31T15:00:00Z");
    }

    #[test]
    fn only_the_base_name_is_parsed() {
        let parser = CameraFilenameParser::default();
        let start = parser
            .parse_start(Path::new("/data/2021_05/camera_2020_01_01-00_00_01.mp4"))
            .unwrap();
        assert_eq!(start, secs(NEW_YEAR_2020_JST + 1));
    }

    #[test]
    fn parsing_is_idempotent() {
        let parser = CameraFilenameParser::default();
        for name in [
            "camera_2020_01_01-00_00_00.mp4",
            "camera_2021_12_31-23_59_59.mp4",
            "camera_2024_02_29-12_30_45.mp4",
        ] {
            let first = parser.parse_start(Path::new(name)).unwrap();
            for _ in 0..3 {
                assert_eq!(parser.parse_start(Path::new(name)).unwrap(), first);
            }
        }
    }

    #[test]
    fn rejects_names_off_template() {
        let parser = CameraFilenameParser::default();
        for name in [
            "notacamera.mp4",
            "camera_2020-01-01-00_00_00.mp4",
            "camera_2020_01_01-00_00_00.avi",
            "camera_2020_01_01-00_00_00.mp4.bak",
            "camera_2020_aa_01-00_00_00.mp4",
            "camera_2020_02_30-00_00_00.mp4",
            "camera_2020_01_01-00_00_00",
        ] {
            let path = PathBuf::from(name);
            match parser.parse_start(&path) {
                Err(MergeError::FilenameFormat { path: p, template }) => {
                    assert_eq!(p, path);
                    assert_eq!(template, CAMERA_TEMPLATE);
                }
                other => panic!("{name}: expected FilenameFormat, got {other:?}"),
            }
        }
    }

    #[test]
    fn other_conventions_plug_in() {
        let parser = CameraFilenameParser::new("cam%Y%m%dT%H%M%S.mkv", 0);
        let start = parser
            .parse_start(Path::new("cam20200101T000000.mkv"))
            .unwrap();
        assert_eq!(start, secs(NEW_YEAR_2020_JST + CAMERA_UTC_OFFSET_SECS as i64));
    }

    #[test]
    fn frame_time_adds_offset_in_ms() {
        let start = secs(NEW_YEAR_2020_JST);
        for offset_ms in [0.0, 0.5, 33.0, 33.366_666, 67.0, 1000.0, 59_999.9] {
            let t = frame_time(start, offset_ms).unwrap();
            let expected = start.as_secs_f64() + offset_ms / 1000.0;
            assert!(
                (t.as_secs_f64() - expected).abs() < 1e-6,
                "{offset_ms}: {} vs {}",
                t.as_secs_f64(),
                expected
            );
            assert_eq!(frame_time(start, offset_ms), Some(t));
        }
        assert_eq!(
            frame_time(start, 33.0).unwrap().as_nanos(),
            start.as_nanos() + 33_000_000
        );
    }

    #[test]
    fn frame_times_follow_offsets() {
        let start = secs(NEW_YEAR_2020_JST);
        let stamps: Vec<_> = [0.0, 33.0, 67.0, 100.0]
            .into_iter()
            .map(|o| frame_time(start, o).unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(stamps[0], start);
    }

    #[test]
    fn unrepresentable_offsets_have_no_frame_time() {
        let start = secs(NEW_YEAR_2020_JST);
        assert_eq!(frame_time(start, f64::NAN), None);
        assert_eq!(frame_time(start, f64::INFINITY), None);
        assert_eq!(frame_time(start, f64::NEG_INFINITY), None);
        assert_eq!(frame_time(start, 1e300), None);
        // Fits as an offset, but not once added to the start.
        assert_eq!(frame_time(start, 9.2e12), None);
        assert_eq!(frame_time(Timestamp::from_nanos(i64::MIN), -1.0), None);
    }

    #[test]
    fn ros_time_split() {
        let t = Timestamp::from_nanos(NEW_YEAR_2020_JST * NANOS_PER_SEC + 50_000_000);
        assert_eq!(t.sec(), Some(NEW_YEAR_2020_JST as i32));
        assert_eq!(t.nanosec(), 50_000_000);

        let before_epoch = Timestamp::from_nanos(-1);
        assert_eq!(before_epoch.sec(), Some(-1));
        assert_eq!(before_epoch.nanosec(), 999_999_999);
    }

    #[test]
    fn ros_seconds_stop_at_2038() {
        let last = secs(i32::MAX as i64);
        assert_eq!(last.sec(), Some(i32::MAX));
        assert_eq!(secs(i32::MAX as i64 + 1).sec(), None);
        assert_eq!(secs(2_200_000_000).sec(), None);
    }

    #[test]
    fn from_secs_f64_rounds_to_nanos() {
        assert_eq!(
            Timestamp::from_secs_f64(1.5),
            Timestamp::from_nanos(1_500_000_000)
        );
        assert_eq!(Timestamp::from_secs_f64(0.0), Timestamp::from_nanos(0));
    }
}
