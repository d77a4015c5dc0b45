//! Continuous and triggered acquisition on area detectors against the soft IOC.

use beamline_devices::channel::{ChannelAccess, ChannelValue, SoftIoc};
use beamline_devices::hardware::areadetector::{PointGreyDetector, Varex4343ct};
use beamline_devices::hardware::{Stageable, Triggerable};
use std::sync::Arc;
use std::time::Duration;

fn pointgrey(ioc: &SoftIoc) -> PointGreyDetector {
    let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
    let det = PointGreyDetector::new(client, "1idPG4:", "det").with_settle_delay(Duration::ZERO);
    ioc.host(&det);
    det
}

/// Wait until the camera reports acquisition finished.
async fn wait_idle(ioc: &SoftIoc, cam: &str) {
    let acquire = format!("{}Acquire", cam);
    tokio::time::timeout(Duration::from_secs(2), async {
        while ioc.value(&acquire) != Some(ChannelValue::Long(0)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_counted_acquisition_takes_exact_frame_count() {
    let ioc = SoftIoc::new();
    let det = pointgrey(&ioc);

    det.cont_acq(0.002, 0.002, 4).await.unwrap();
    wait_idle(&ioc, "1idPG4:cam1:").await;

    assert_eq!(
        ioc.value("1idPG4:cam1:ArrayCounter_RBV"),
        Some(ChannelValue::Long(4))
    );
    assert_eq!(
        ioc.value("1idPG4:cam1:ImageMode_RBV"),
        Some(ChannelValue::from("Multiple"))
    );
    assert_eq!(
        ioc.value("1idPG4:cam1:NumImages_RBV"),
        Some(ChannelValue::Long(4))
    );
}

#[tokio::test]
async fn test_free_running_acquisition_until_stopped() {
    let ioc = SoftIoc::new();
    let det = pointgrey(&ioc);

    det.cont_acq(0.01, 0.01, -1).await.unwrap();
    assert_eq!(
        ioc.value("1idPG4:cam1:ImageMode"),
        Some(ChannelValue::from("Continuous"))
    );
    assert_eq!(ioc.value("1idPG4:cam1:Acquire"), Some(ChannelValue::Long(1)));

    // Stop, as the operator would at the IOC
    det.cam1.base.acquire.put(0_i64).await.unwrap();
    assert_eq!(ioc.value("1idPG4:cam1:Acquire_RBV"), Some(ChannelValue::Long(0)));
}

#[tokio::test]
async fn test_write_order_ends_with_acquire() {
    let ioc = SoftIoc::new();
    let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
    let det = Varex4343ct::new(client, "6IDFF:", "ff_det").with_settle_delay(Duration::ZERO);
    ioc.host(&det);

    det.cont_acq(0.1, 10).await.unwrap();

    let pvs: Vec<String> = ioc.journal().into_iter().map(|(pv, _)| pv).collect();
    assert_eq!(
        pvs,
        vec![
            "6IDFF:cam1:AcquireTime",
            "6IDFF:cam1:ImageMode",
            "6IDFF:cam1:NumImages",
            "6IDFF:cam1:Acquire",
        ]
    );
}

#[tokio::test]
async fn test_cont_acq_propagates_channel_errors() {
    let ioc = SoftIoc::new();
    let det = pointgrey(&ioc);
    ioc.set_connected("1idPG4:cam1:AcquirePeriod", false);

    assert!(det.cont_acq(0.1, 0.5, 3).await.is_err());
    assert!(ioc.puts_to("1idPG4:cam1:Acquire").is_empty());
}

#[tokio::test]
async fn test_single_trigger_cycle() {
    let ioc = SoftIoc::new();
    let det = pointgrey(&ioc);
    det.cont_acq(0.001, 0.001, 2).await.unwrap();
    wait_idle(&ioc, "1idPG4:cam1:").await;

    det.stage().await.unwrap();
    for _ in 0..3 {
        det.trigger().wait().await.unwrap();
    }
    det.unstage().await.unwrap();

    assert_eq!(
        ioc.value("1idPG4:cam1:ArrayCounter_RBV"),
        Some(ChannelValue::Long(5))
    );
    assert_eq!(
        ioc.value("1idPG4:cam1:ImageMode"),
        Some(ChannelValue::from("Multiple"))
    );
}
