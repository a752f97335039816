use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::*;
use stz_order_engine::{
    traits::{LogSink, NoMeasurements, NotificationSink},
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

/// Starts the auto-confirmation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Each tick confirms every `DELIVERED` order whose confirmation window has lapsed, releasing
/// its escrow to the designer. Each order is its own transaction, so a partially failed sweep
/// is completed by the next tick.
pub fn start_auto_confirm_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
        let api = OrderFlowApi::new(db, NoMeasurements, sink);
        info!("🕰️ Auto-confirmation worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running auto-confirmation sweep");
            match api.auto_confirm_due(Utc::now()).await {
                Ok((0, 0)) => trace!("🕰️ No orders were due for auto-confirmation"),
                Ok((confirmed, failed)) => {
                    info!("🕰️ {confirmed} orders auto-confirmed, {failed} could not be confirmed");
                },
                Err(e) => {
                    error!("🕰️ Error running auto-confirmation sweep: {e}");
                },
            }
        }
    })
}
