// Bootstrap endpoint
//
// The bootstrap call is the NVR's full-state snapshot: every camera,
// sensor, light, and viewer it knows about, plus its own identity block.

use tracing::debug;

use crate::client::ProtectClient;
use crate::error::Error;
use crate::models::{Bootstrap, NvrRecord};

impl ProtectClient {
    /// Fetch the full device snapshot.
    ///
    /// `GET /{prefix}/bootstrap`
    pub async fn bootstrap(&self) -> Result<Bootstrap, Error> {
        self.ensure_authenticated().await?;

        let url = self.api_url("bootstrap")?;
        debug!("fetching bootstrap");
        self.get_json(url).await
    }

    /// Fetch the NVR's identity block (id, model, firmware version).
    ///
    /// Hosts use this to gate on a minimum firmware version before
    /// wiring up the rest of the integration.
    pub async fn server_information(&self) -> Result<NvrRecord, Error> {
        let bootstrap = self.bootstrap().await?;
        bootstrap.nvr.ok_or_else(|| Error::Deserialization {
            message: "bootstrap payload missing nvr block".into(),
            body: String::new(),
        })
    }
}
