// Installer image endpoints
//
// Uploads are multipart and handled by the web UI; the console only lists
// images, to name them in group listings.

use tracing::debug;

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::ImageRecord;

impl ViaClient {
    /// `GET /v1/images`
    pub async fn list_images(&self) -> Result<Vec<ImageRecord>, Error> {
        let url = self.api_url("images")?;
        debug!("listing images");
        self.get(url).await
    }
}
