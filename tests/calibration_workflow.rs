use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Vector3, Vector4};
use pinhole_calib::export::load_cameras;
use pinhole_calib::{
    decode, encode, generate, look_at, read_calibration, rotate90, CalibrationError,
    SyntheticRigConfig, TheiaExporter,
};

#[test]
fn test_sample_matches_first_synthetic_camera() {
    let loaded = read_calibration("samples/cam0.mp4.calib").unwrap();
    let synthetic = &generate(&SyntheticRigConfig::default()).unwrap()[0];

    assert_eq!(loaded.width, synthetic.width);
    assert_eq!(loaded.height, synthetic.height);
    assert_abs_diff_eq!(loaded.intrinsic, synthetic.intrinsic, epsilon = 1e-6);
    assert_abs_diff_eq!(loaded.extrinsic, synthetic.extrinsic, epsilon = 1e-6);
}

#[test]
fn test_synthetic_ring_survives_encode_decode() {
    for calib in generate(&SyntheticRigConfig::default()).unwrap() {
        let decoded = decode(&encode(&calib)).unwrap();
        assert_eq!(decoded.width, calib.width);
        assert_eq!(decoded.height, calib.height);
        assert_abs_diff_eq!(decoded.intrinsic, calib.intrinsic, epsilon = 1e-6);
        assert_abs_diff_eq!(decoded.extrinsic, calib.extrinsic, epsilon = 1e-6);
        assert_eq!(decoded.distortion, calib.distortion);
    }
}

#[test]
fn test_exactly_32_tokens() {
    let tokens: Vec<String> = (0..32).map(|i| i.to_string()).collect();
    let calib = decode(&tokens.join(" ")).unwrap();

    assert_eq!(calib.width, 0);
    assert_eq!(calib.height, 1);
    assert_eq!(calib.intrinsic[(0, 0)], 2.0);
    assert_eq!(calib.intrinsic[(0, 1)], 3.0);
    assert_eq!(calib.intrinsic[(2, 2)], 10.0);
    assert_eq!(calib.extrinsic[(0, 0)], 11.0);
    assert_eq!(calib.extrinsic[(1, 0)], 15.0);
    assert_eq!(calib.extrinsic[(3, 3)], 26.0);
    assert_eq!(calib.distortion.to_array(), [27.0, 28.0, 29.0, 30.0, 31.0]);

    let short = tokens[..10].join(" ");
    assert!(matches!(decode(&short), Err(CalibrationError::Format(_))));
    let almost = tokens[..31].join(" ");
    assert!(matches!(decode(&almost), Err(CalibrationError::Format(_))));
}

#[test]
fn test_rotating_a_sample_four_times() {
    let calib = read_calibration("samples/cam1.mp4.calib").unwrap();
    let mut rotated = calib.clone();
    for turn in 1..=4 {
        rotated = rotate90(&rotated);
        if turn % 2 == 1 {
            assert_eq!((rotated.width, rotated.height), (720, 1280));
        }
    }
    assert_eq!((rotated.width, rotated.height), (1280, 720));
    assert_relative_eq!(rotated.intrinsic, calib.intrinsic, epsilon = 1e-9);
    assert_relative_eq!(rotated.extrinsic, calib.extrinsic, epsilon = 1e-9);
    assert_eq!(rotated.distortion, calib.distortion);
}

#[test]
fn test_look_at_recovers_eye_for_many_poses() {
    let up = Vector3::new(0.0, 0.0, 1.0);
    for i in 0..24 {
        let t = i as f64 * 0.37;
        let eye = Vector3::new(10.0 * t.cos(), 7.0 * t.sin(), 3.0 + t);
        let target = Vector3::new(t.sin(), -t.cos(), 0.5 * t);
        let l = look_at(&eye, &up, &target).unwrap();

        let rotation = l.fixed_view::<3, 3>(0, 0);
        let gram = rotation * rotation.transpose();
        assert_abs_diff_eq!(gram, nalgebra::Matrix3::identity(), epsilon = 1e-9);

        let origin = l.try_inverse().unwrap() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.xyz(), eye, epsilon = 1e-9);
    }
}

#[test]
fn test_export_samples() {
    let cameras = load_cameras(&["samples/cam1.mp4.calib", "samples/cam0.mp4.calib"]).unwrap();
    assert_eq!(cameras[0].serial, "cam0.mp4");
    assert_eq!(cameras[1].serial, "cam1.mp4");

    let xml = TheiaExporter::new(36.0).export(&cameras).unwrap();
    assert!(xml.starts_with("<calibration third_party=\"false\">\n    <results/>\n    <cameras>\n"));
    // 36 / 1920 * 1000 and 36 / 1280 * 912.5
    assert!(xml.contains("focallength=\"18.750000\""));
    assert!(xml.contains("focallength=\"25.664062\"") || xml.contains("focallength=\"25.664063\""));
    assert!(xml.contains("sensorDimU=\"1280.000000\""));
    assert!(xml.contains("z=\"2500.000000\""));
    assert!(xml.trim_end().ends_with("</calibration>"));
}
