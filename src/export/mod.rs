//! Export of calibrations to the Theia XML calibration schema.
//!
//! The produced document looks like
//!
//! ```xml
//! <calibration third_party="false">
//!     <results/>
//!     <cameras>
//!         <camera active="1" serial="cam0.mp4">
//!             <intrinsic focallength="..." sensorDimU="..." .../>
//!             <transform r11="..." ... x="..." y="..." z="..."/>
//!         </camera>
//!     </cameras>
//! </calibration>
//! ```
//!
//! Attribute names are fixed by the consuming tool and must not change. Two
//! quirks of the schema are kept on purpose:
//! * `sensorDimU`/`sensorDimV` carry the image size in *pixels*, not the
//!   physical sensor size.
//! * The tangential coefficients are spelled `tangentalDistortion1/2`.
//!
//! The rotation block of `L` is written with 1-indexed names `r11`..`r33`
//! and the translation column as `x`, `y`, `z`.

use crate::camera::{CalibrationError, CameraCalibration};
use crate::codec;
use log::info;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Suffix stripped from calibration file names to obtain the camera serial.
pub const CALIB_SUFFIX: &str = ".calib";

/// Derives a camera serial from a calibration file path.
///
/// Calibration files are named after the video they belong to, e.g.
/// `cam0.mp4.calib`, so the serial is the file name cut at the first
/// `.calib`. A name without that suffix is used whole.
///
/// # Examples
///
/// ```rust
/// use pinhole_calib::export::serial_from_path;
///
/// assert_eq!(serial_from_path("data/cam0.mp4.calib"), "cam0.mp4");
/// assert_eq!(serial_from_path("cam1"), "cam1");
/// ```
pub fn serial_from_path<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.find(CALIB_SUFFIX) {
        Some(end) => name[..end].to_string(),
        None => name,
    }
}

/// A calibration paired with the serial it is exported under.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialCalibration {
    pub serial: String,
    pub calibration: CameraCalibration,
}

/// Loads calibration files for export, sorted by their full path string.
///
/// # Errors
///
/// The first file that cannot be read or parsed fails the whole batch.
pub fn load_cameras<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SerialCalibration>, CalibrationError> {
    let mut sorted: Vec<&Path> = paths.iter().map(|p| p.as_ref()).collect();
    sorted.sort_by_cached_key(|p| p.to_string_lossy().into_owned());

    sorted
        .iter()
        .map(|path| -> Result<SerialCalibration, CalibrationError> {
            let serial = serial_from_path(path);
            info!("Loading {} as serial {}", path.display(), serial);
            Ok(SerialCalibration {
                serial,
                calibration: codec::read_calibration(path)?,
            })
        })
        .collect()
}

/// Settings for a Theia export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TheiaExporter {
    /// Physical width of the sensor in millimetres.
    pub sensor_width_mm: f64,
    /// Value of the root `third_party` attribute.
    pub third_party: bool,
}

impl TheiaExporter {
    pub fn new(sensor_width_mm: f64) -> Self {
        TheiaExporter {
            sensor_width_mm,
            third_party: false,
        }
    }

    /// Focal length in millimetres: `sensor_width_mm / width * fx`.
    pub fn focal_length_mm(&self, calib: &CameraCalibration) -> f64 {
        self.sensor_width_mm / f64::from(calib.width) * calib.intrinsic[(0, 0)]
    }

    /// Renders the XML document for `cameras`, in the order given.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::InvalidParams`] if the sensor width is not a
    ///   positive number or a calibration has zero width, since no focal
    ///   length in millimetres can be derived then.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pinhole_calib::camera::CameraCalibration;
    /// use pinhole_calib::export::{SerialCalibration, TheiaExporter};
    ///
    /// let mut calib = CameraCalibration::default();
    /// calib.width = 1920;
    /// calib.height = 1080;
    /// calib.intrinsic[(0, 0)] = 1000.0;
    ///
    /// let cameras = [SerialCalibration { serial: "cam0".to_string(), calibration: calib }];
    /// let xml = TheiaExporter::new(36.0).export(&cameras).unwrap();
    /// assert!(xml.contains("focallength=\"18.750000\""));
    /// ```
    pub fn export(&self, cameras: &[SerialCalibration]) -> Result<String, CalibrationError> {
        if !self.sensor_width_mm.is_finite() || self.sensor_width_mm <= 0.0 {
            return Err(CalibrationError::InvalidParams(format!(
                "sensor width must be positive, got {} mm",
                self.sensor_width_mm
            )));
        }

        let mut root = BytesStart::new("calibration");
        root.push_attribute(("third_party", if self.third_party { "true" } else { "false" }));

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Start(root))?;
        writer.write_event(Event::Empty(BytesStart::new("results")))?;
        writer.write_event(Event::Start(BytesStart::new("cameras")))?;
        for camera in cameras {
            self.write_camera(&mut writer, camera)?;
        }
        writer.write_event(Event::End(BytesEnd::new("cameras")))?;
        writer.write_event(Event::End(BytesEnd::new("calibration")))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| CalibrationError::Xml(e.to_string()))?;
        xml.push('\n');

        info!("Exported {} cameras", cameras.len());
        Ok(xml)
    }

    fn write_camera<W: Write>(
        &self,
        writer: &mut Writer<W>,
        camera: &SerialCalibration,
    ) -> Result<(), CalibrationError> {
        let calib = &camera.calibration;
        if calib.width == 0 {
            return Err(CalibrationError::InvalidParams(format!(
                "camera {} has zero image width",
                camera.serial
            )));
        }
        let k = &calib.intrinsic;
        let d = &calib.distortion;

        let mut element = BytesStart::new("camera");
        element.push_attribute(("active", "1"));
        element.push_attribute(("serial", camera.serial.as_str()));
        writer.write_event(Event::Start(element))?;

        let mut intrinsic = BytesStart::new("intrinsic");
        let intrinsic_attributes = [
            ("focallength", self.focal_length_mm(calib)),
            ("sensorDimU", f64::from(calib.width)),
            ("sensorDimV", f64::from(calib.height)),
            ("focalLengthU", k[(0, 0)]),
            ("focalLengthV", k[(1, 1)]),
            ("centerPointU", k[(0, 2)]),
            ("centerPointV", k[(1, 2)]),
            ("skew", k[(0, 1)]),
            ("radialDistortion1", d.k1),
            ("radialDistortion2", d.k2),
            ("tangentalDistortion1", d.p1),
            ("tangentalDistortion2", d.p2),
            ("radialDistortion3", d.k3),
        ];
        for (name, value) in intrinsic_attributes {
            intrinsic.push_attribute((name, format!("{value:.6}").as_str()));
        }
        writer.write_event(Event::Empty(intrinsic))?;

        let mut transform = BytesStart::new("transform");
        for r in 0..3 {
            for c in 0..3 {
                let name = format!("r{}{}", r + 1, c + 1);
                let value = format!("{:.6}", calib.extrinsic[(r, c)]);
                transform.push_attribute((name.as_str(), value.as_str()));
            }
        }
        for (r, name) in ["x", "y", "z"].into_iter().enumerate() {
            transform.push_attribute((name, format!("{:.6}", calib.extrinsic[(r, 3)]).as_str()));
        }
        writer.write_event(Event::Empty(transform))?;

        writer.write_event(Event::End(BytesEnd::new("camera")))?;
        Ok(())
    }

    /// Renders `cameras` and writes the document to `path`.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        cameras: &[SerialCalibration],
    ) -> Result<(), CalibrationError> {
        let xml = self.export(cameras)?;
        let mut file = fs::File::create(path.as_ref())?;
        file.write_all(xml.as_bytes())?;
        info!("Wrote Theia calibration to {}", path.as_ref().display());
        Ok(())
    }
}
