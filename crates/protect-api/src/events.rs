// Event log endpoint
//
// Motion events over a time window. The window end is padded slightly
// into the future so an event landing between "now" and the request
// hitting the NVR is not missed.

use chrono::{Duration, Utc};
use tracing::debug;

use crate::client::ProtectClient;
use crate::error::Error;
use crate::models::MotionEventRecord;

/// Forward padding applied to the event window end.
const WINDOW_END_PAD_SECS: i64 = 10;

impl ProtectClient {
    /// Fetch motion events from the last `lookback_secs` seconds.
    ///
    /// `GET /{prefix}/events?type=motion&start={ms}&end={ms}`
    pub async fn motion_events(
        &self,
        lookback_secs: u64,
    ) -> Result<Vec<MotionEventRecord>, Error> {
        self.ensure_authenticated().await?;

        let now = Utc::now();
        let start = now - Duration::seconds(i64::try_from(lookback_secs).unwrap_or(i64::MAX));
        let end = now + Duration::seconds(WINDOW_END_PAD_SECS);

        let mut url = self.api_url("events")?;
        url.query_pairs_mut()
            .append_pair("type", "motion")
            .append_pair("start", &start.timestamp_millis().to_string())
            .append_pair("end", &end.timestamp_millis().to_string());

        debug!(lookback_secs, "fetching motion events");
        self.get_json(url).await
    }
}
