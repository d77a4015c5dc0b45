//! Position cache and resume on stage bundles against the soft IOC.

use beamline_devices::channel::{ChannelAccess, ChannelValue, SoftIoc};
use beamline_devices::hardware::stages::{SimStageAero, StageAero, TomoCamStage};
use beamline_devices::hardware::Positioner;
use beamline_devices::status::Status;
use beamline_devices::DeviceError;
use std::sync::Arc;
use std::time::{Duration, Instant};

const AXES: [(&str, f64); 3] = [
    ("6idhedm:m48", 1.5),
    ("6idhedm:m45", -0.25),
    ("6idhedm:m46", 3.0),
];

fn tomostage(velocity: f64) -> (SoftIoc, TomoCamStage) {
    let ioc = SoftIoc::new();
    for (pv, position) in AXES {
        ioc.add_motor(pv, position);
        ioc.set(&format!("{}.VELO", pv), velocity);
    }
    let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
    (ioc, TomoCamStage::new(client, "", "tomostage"))
}

#[tokio::test]
async fn test_resume_without_cache_errors() {
    let (ioc, stage) = tomostage(1000.0);

    let err = stage.bundle().resume_position().await.unwrap_err();

    assert!(matches!(err, DeviceError::PositionNotCached(_)));
    assert_eq!(
        err.to_string(),
        "Cannot resume 'tomostage'. Must first call 'cache_position()'"
    );
    assert!(ioc.journal().is_empty());
}

#[tokio::test]
async fn test_resume_returns_axes_to_cached_positions() {
    let (ioc, stage) = tomostage(1000.0);
    let bundle = stage.bundle();

    bundle.cache_position().await.unwrap();
    Status::all([
        stage.tomoy.move_to(10.0),
        stage.tomox.move_to(-4.0),
        stage.tomoz.move_to(0.0),
    ])
    .wait()
    .await
    .unwrap();
    assert_eq!(stage.tomoy.position().await.unwrap(), 10.0);

    bundle.resume_position().await.unwrap();

    for (pv, position) in AXES {
        assert_eq!(
            ioc.value(&format!("{}.RBV", pv)),
            Some(ChannelValue::Double(position)),
            "{} not restored",
            pv
        );
    }
}

#[tokio::test]
async fn test_cache_then_resume_without_motion_targets_current_positions() {
    let (ioc, stage) = tomostage(1000.0);

    stage.bundle().cache_position().await.unwrap();
    stage.bundle().resume_position().await.unwrap();

    for (pv, position) in AXES {
        assert_eq!(
            ioc.puts_to(&format!("{}.VAL", pv)),
            vec![ChannelValue::Double(position)]
        );
    }
}

#[tokio::test]
async fn test_resume_moves_axes_concurrently() {
    // Each axis needs 0.2 s to travel 1 mm at 5 mm/s
    let (_ioc, stage) = tomostage(5.0);
    let bundle = stage.bundle();
    bundle.cache_position().await.unwrap();
    Status::all([
        stage.tomoy.move_to(2.5),
        stage.tomox.move_to(0.75),
        stage.tomoz.move_to(4.0),
    ])
    .wait()
    .await
    .unwrap();

    let started = Instant::now();
    bundle.resume_position().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(190), "resume took {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(500), "resume took {:?}", elapsed);
}

#[tokio::test]
async fn test_failed_cache_keeps_previous_cache() {
    let (ioc, stage) = tomostage(1000.0);
    let bundle = stage.bundle();
    bundle.cache_position().await.unwrap();

    ioc.set_connected("6idhedm:m45.RBV", false);
    let err = bundle.cache_position().await.unwrap_err();

    assert!(matches!(err, DeviceError::Channel { ref pv, .. } if pv == "6idhedm:m45.RBV"));
    assert_eq!(
        bundle.cached_positions(),
        Some(vec![
            ("tomoy".to_string(), 1.5),
            ("tomox".to_string(), -0.25),
            ("tomoz".to_string(), 3.0),
        ])
    );
}

#[tokio::test]
async fn test_resume_reports_move_failure_after_all_moves_finish() {
    let (ioc, stage) = tomostage(1000.0);
    let bundle = stage.bundle();
    bundle.cache_position().await.unwrap();
    ioc.set_connected("6idhedm:m48.VAL", false);

    let err = bundle.resume_position().await.unwrap_err();

    assert!(err.to_string().contains("6idhedm:m48.VAL"));
    assert_eq!(
        ioc.puts_to("6idhedm:m46.VAL"),
        vec![ChannelValue::Double(3.0)]
    );
}

#[tokio::test]
async fn test_wh_rows_use_attribute_names() {
    let (_ioc, stage) = tomostage(1000.0);

    let table = stage.bundle().wh().await.unwrap();

    let names: Vec<&str> = table.rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["tomoy", "tomox", "tomoz"]);
    assert_eq!(table.rows[0].pv, "6idhedm:m48");
    assert!(table.to_string().lines().nth(3).unwrap().starts_with("tomoy 6idhedm:m48 1.5"));
}

#[tokio::test]
async fn test_stage_aero_resume_includes_air_bearing_rotation() {
    let ioc = SoftIoc::new();
    let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
    let stage = StageAero::new(client, "", "hedm");
    ioc.host(stage.bundle().as_ref());
    for base in ["6idhedm:m40", "6idhedm:m41", "6idhedms1:m1"] {
        ioc.set(&format!("{}.VELO", base), 1000.0);
    }
    ioc.set("6idhedm:m41.RBV", 1.0);
    ioc.set("6idhedms1:m1.RBV", 90.0);

    let bundle = stage.bundle();
    bundle.cache_position().await.unwrap();
    assert_eq!(bundle.cached_positions().unwrap().len(), 9);

    Status::all([stage.kx.move_to(5.0), stage.rot.move_to(10.0)])
        .wait()
        .await
        .unwrap();
    assert_eq!(stage.rot.position().await.unwrap(), 10.0);

    bundle.resume_position().await.unwrap();

    assert_eq!(stage.rot.position().await.unwrap(), 90.0);
    assert_eq!(stage.rot.dial_position().await.unwrap(), 90.0);
    assert_eq!(stage.kx.position().await.unwrap(), 1.0);
    assert_eq!(
        ioc.puts_to("6idhedms1:m1.VAL"),
        vec![ChannelValue::Double(10.0), ChannelValue::Double(90.0)]
    );
}

#[tokio::test]
async fn test_sim_stage_resume_with_shared_axis_record() {
    let ioc = SoftIoc::new();
    let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
    let stage = SimStageAero::new(client, "", "simstage");
    ioc.host(stage.bundle().as_ref());
    for base in ["6iddSIM:m1", "6iddSIM:m2", "6iddSIM:m3", "6iddSIM:m4", "6iddSIM:m16"] {
        ioc.set(&format!("{}.VELO", base), 1000.0);
    }
    ioc.set("6iddSIM:m16.RBV", 2.0);
    ioc.set("6iddSIM:m4.RBV", -30.0);

    let bundle = stage.bundle();
    bundle.cache_position().await.unwrap();
    Status::all([stage.x_base.move_to(7.0), stage.rot.move_to(45.0)])
        .wait()
        .await
        .unwrap();

    bundle.resume_position().await.unwrap();

    // kx_tilt, kz_tilt, x_base, tiltx_base and tiltz_base all drive m16
    let mut expected = vec![ChannelValue::Double(7.0)];
    expected.extend(std::iter::repeat(ChannelValue::Double(2.0)).take(5));
    assert_eq!(ioc.puts_to("6iddSIM:m16.VAL"), expected);
    assert_eq!(ioc.value("6iddSIM:m16.RBV"), Some(ChannelValue::Double(2.0)));
    assert_eq!(ioc.value("6iddSIM:m16.DMOV"), Some(ChannelValue::Long(1)));
    assert_eq!(stage.rot.position().await.unwrap(), -30.0);
}
